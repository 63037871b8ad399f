use assert_cmd::Command;
use assert_cmd::cargo;
use flate2::Compression;
use flate2::write::GzEncoder;
use predicates::prelude::*;
use std::io::prelude::*;
use std::path::Path;
use tar::Builder;
use tempfile::tempdir;

fn create_tar_gz_with_modes(files: &[(&str, &str, u32)]) -> Vec<u8> {
    let mut tar_builder = Builder::new(Vec::new());
    for (name, content, mode) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_path(name).unwrap();
        header.set_mode(*mode);
        header.set_cksum();
        tar_builder.append(&header, content.as_bytes()).unwrap();
    }
    let tar = tar_builder.into_inner().unwrap();

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&tar).unwrap();
    encoder.finish().unwrap()
}

/// arpack-ng style source tree whose configure script exits with `status`.
fn arpack_sources(configure_status: i32) -> Vec<u8> {
    let configure = format!("#!/bin/sh\necho configuring \"$@\"\nexit {}\n", configure_status);
    create_tar_gz_with_modes(&[
        ("arpack-ng-3.3.0/bootstrap", "echo bootstrapped\n", 0o644),
        ("arpack-ng-3.3.0/configure", &configure, 0o755),
    ])
}

fn eigpkg(arch_dir: &Path) -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("eigpkg"));
    cmd.env_remove("EIGPKG_ARCH_DIR")
        .env_remove("EIGPKG_FC")
        .env_remove("EIGPKG_FFLAGS")
        .env_remove("EIGPKG_MAKE")
        .arg("--arch-dir")
        .arg(arch_dir);
    cmd
}

#[test]
fn test_list_shows_arpack() {
    let arch = tempdir().unwrap();
    eigpkg(arch.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("arpack"))
        .stdout(predicate::str::contains("installable"));
}

#[test]
fn test_check_unknown_package() {
    let arch = tempdir().unwrap();
    eigpkg(arch.path())
        .args(["check", "primme"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown package: primme"));
}

#[test]
fn test_no_subcommand_fails() {
    let arch = tempdir().unwrap();
    eigpkg(arch.path()).assert().failure();
}

#[cfg(unix)]
#[test]
fn test_check_default_path_writes_outputs() {
    let arch = tempdir().unwrap();
    eigpkg(arch.path())
        .args(["check", "arpack", "--fc", "true"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ARPACK: -lparpack -larpack"));

    let conf = arch.path().join("conf");
    let vars = std::fs::read_to_string(conf.join("eigpkgvariables")).unwrap();
    assert_eq!(vars, "ARPACK_LIB = -lparpack -larpack\n");

    let header = std::fs::read_to_string(conf.join("eigpkgconf.h")).unwrap();
    assert!(header.contains("#define SLEPC_HAVE_ARPACK 1"));

    let cmake = std::fs::read_to_string(conf.join("eigpkg.cmake")).unwrap();
    assert!(cmake.contains("set (SLEPC_HAVE_ARPACK YES)"));
    assert!(cmake.contains("find_library (ARPACK_LIB_PARPACK parpack)"));

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(conf.join("packages.json")).unwrap())
            .unwrap();
    assert_eq!(report["arpack"]["have_package"], true);
    assert_eq!(report["arpack"]["settings"]["functions"][0], "pdnaupd");

    let log = std::fs::read_to_string(arch.path().join("configure.log")).unwrap();
    assert!(log.contains("Checking ARPACK library..."));
    assert!(log.contains("true conftest.f -o conftest -lparpack -larpack"));
}

#[cfg(unix)]
#[test]
fn test_check_with_dir_and_libs_override() {
    let arch = tempdir().unwrap();
    let lib_dir = arch.path().join("custom/lib");
    std::fs::create_dir_all(&lib_dir).unwrap();

    eigpkg(arch.path())
        .args(["check", "arpack", "--fc", "true", "--libs", "-larpack_custom"])
        .arg("--dir")
        .arg(&lib_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "ARPACK: -L{} -larpack_custom",
            lib_dir.display()
        )));
}

#[cfg(unix)]
#[test]
fn test_check_nothing_links() {
    let arch = tempdir().unwrap();
    eigpkg(arch.path())
        .args(["check", "arpack", "--fc", "false", "--dir", "/nonexistent"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unable to link with ARPACK library"));

    let conf = arch.path().join("conf");
    let vars = std::fs::read_to_string(conf.join("eigpkgvariables")).unwrap();
    assert!(vars.is_empty());

    // One attempt per library set in the parallel chain
    let log = std::fs::read_to_string(arch.path().join("configure.log")).unwrap();
    assert_eq!(log.matches("Checking arpack with: false").count(), 4);
}

#[cfg(unix)]
#[test]
fn test_check_mpiuni_before_subcommand() {
    let arch = tempdir().unwrap();
    eigpkg(arch.path())
        .args(["--mpiuni", "check", "arpack", "--fc", "true"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ARPACK: -larpack"));
}

#[cfg(unix)]
#[test]
fn test_check_reads_petsc_variables() {
    let arch = tempdir().unwrap();
    let variables = arch.path().join("petscvariables");
    std::fs::write(
        &variables,
        "PETSC_SCALAR = complex\nPETSC_PRECISION = single\nMPI_IS_MPIUNI = 1\nFC = true\n",
    )
    .unwrap();

    eigpkg(arch.path())
        .arg("--petsc-variables")
        .arg(&variables)
        .args(["check", "arpack"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ARPACK: -larpack"));

    let report: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(arch.path().join("conf/packages.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(report["arpack"]["config"]["scalar"], "complex");
    assert_eq!(
        report["arpack"]["settings"]["functions"],
        serde_json::json!(["cnaupd", "cneupd"])
    );
}

#[cfg(unix)]
#[test]
fn test_end_to_end_install() {
    let mut server = mockito::Server::new();
    let _mock_download = server
        .mock("GET", "/arpack-ng-3.3.0.tar.gz")
        .with_status(200)
        .with_body(arpack_sources(0))
        .create();

    let arch = tempdir().unwrap();
    eigpkg(arch.path())
        .args(["install", "arpack", "--fc", "true", "--make", "true"])
        .arg("--fflags=-O2 -Wall")
        .arg("--url")
        .arg(format!("{}/arpack-ng-3.3.0.tar.gz", server.url()))
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "ARPACK: -L{} -lparpack -larpack",
            arch.path().join("lib").display()
        )));

    let build_dir = arch.path().join("externalpackages/arpack-ng-3.3.0");
    assert!(build_dir.join("configure").exists());
    assert!(!arch.path().join("externalpackages/arpack-ng-3.3.0.tar.gz").exists());

    let log = std::fs::read_to_string(arch.path().join("configure.log")).unwrap();
    assert!(log.contains("Installing ARPACK library..."));
    assert!(log.contains("bootstrapped"));
    assert!(log.contains("--enable-mpi"));
    assert!(log.contains("FFLAGS=\"-O2\""));

    let vars = std::fs::read_to_string(arch.path().join("conf/eigpkgvariables")).unwrap();
    assert!(vars.starts_with("ARPACK_LIB = -L"));
}

#[cfg(unix)]
#[test]
fn test_install_build_failure_is_fatal() {
    let mut server = mockito::Server::new();
    let _mock_download = server
        .mock("GET", "/arpack-ng-3.3.0.tar.gz")
        .with_status(200)
        .with_body(arpack_sources(1))
        .create();

    let arch = tempdir().unwrap();
    eigpkg(arch.path())
        .args(["install", "arpack", "--fc", "true", "--make", "true", "--mpiuni"])
        .arg("--url")
        .arg(format!("{}/arpack-ng-3.3.0.tar.gz", server.url()))
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "ERROR: installation of ARPACK failed.",
        ))
        .stderr(predicate::str::contains("configure.log"));

    assert!(!arch.path().join("conf").exists());
    let log = std::fs::read_to_string(arch.path().join("configure.log")).unwrap();
    assert!(log.contains("configuring"));
    assert!(!log.contains("--enable-mpi"));
}

#[cfg(unix)]
#[test]
fn test_install_reuses_existing_sources() {
    let arch = tempdir().unwrap();
    let build_dir = arch.path().join("externalpackages/arpack-ng-3.3.0");
    std::fs::create_dir_all(&build_dir).unwrap();
    std::fs::write(build_dir.join("bootstrap"), "echo reused\n").unwrap();
    std::fs::write(build_dir.join("configure"), "#!/bin/sh\nexit 0\n").unwrap();
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(
            build_dir.join("configure"),
            std::fs::Permissions::from_mode(0o755),
        )
        .unwrap();
    }

    // The URL is never contacted because the sources are already unpacked
    eigpkg(arch.path())
        .args(["install", "arpack", "--fc", "true", "--make", "true"])
        .args(["--url", "http://127.0.0.1:9/unreachable.tar.gz"])
        .assert()
        .success();

    let log = std::fs::read_to_string(arch.path().join("configure.log")).unwrap();
    assert!(log.contains("reused"));
}

#[test]
fn test_install_download_failure() {
    let mut server = mockito::Server::new();
    let _mock_download = server
        .mock("GET", "/arpack-ng-3.3.0.tar.gz")
        .with_status(404)
        .create();

    let arch = tempdir().unwrap();
    eigpkg(arch.path())
        .args(["install", "arpack", "--fc", "true"])
        .arg("--url")
        .arg(format!("{}/arpack-ng-3.3.0.tar.gz", server.url()))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unable to download arpack"));
}
