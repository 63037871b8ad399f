//! Files consumed by the parent build once a package has been configured.
//!
//! Results are accumulated in `<arch>/conf/packages.json`; the makefile,
//! header and CMake fragments are regenerated from it after every run so
//! several packages can be configured one after another.

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::config::BuildConfig;
use crate::probe::LinkSettings;
use crate::runtime::Runtime;

pub const CONF_DIR: &str = "conf";
pub const REPORT_FILE: &str = "packages.json";
pub const VARIABLES_FILE: &str = "eigpkgvariables";
pub const HEADER_FILE: &str = "eigpkgconf.h";
pub const CMAKE_FILE: &str = "eigpkg.cmake";

/// Outcome of configuring one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigureReport {
    pub package: String,
    pub have_package: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<LinkSettings>,
    pub config: BuildConfig,
}

impl ConfigureReport {
    pub fn found(settings: LinkSettings, config: &BuildConfig) -> Self {
        Self {
            package: settings.package.clone(),
            have_package: true,
            settings: Some(settings),
            config: config.clone(),
        }
    }

    pub fn missing(package: &str, config: &BuildConfig) -> Self {
        Self {
            package: package.to_string(),
            have_package: false,
            settings: None,
            config: config.clone(),
        }
    }

    fn macro_name(&self) -> String {
        format!("SLEPC_HAVE_{}", self.package.to_uppercase())
    }
}

pub fn conf_dir(arch_dir: &Path) -> PathBuf {
    arch_dir.join(CONF_DIR)
}

/// Reports recorded by earlier runs, keyed by package name.
pub fn load_reports<R: Runtime + ?Sized>(
    runtime: &R,
    arch_dir: &Path,
) -> Result<BTreeMap<String, ConfigureReport>> {
    let path = conf_dir(arch_dir).join(REPORT_FILE);
    if !runtime.exists(&path) {
        return Ok(BTreeMap::new());
    }
    let content = runtime.read_to_string(&path)?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {:?}", path))
}

/// Merge `report` into the stored results and rewrite every output file.
#[tracing::instrument(skip(runtime, report))]
pub fn record<R: Runtime + ?Sized>(
    runtime: &R,
    arch_dir: &Path,
    report: ConfigureReport,
) -> Result<()> {
    let mut reports = load_reports(runtime, arch_dir)?;
    reports.insert(report.package.clone(), report);

    let dir = conf_dir(arch_dir);
    runtime.create_dir_all(&dir)?;

    let json = serde_json::to_string_pretty(&reports)?;
    runtime.write(&dir.join(REPORT_FILE), json.as_bytes())?;
    runtime.write(&dir.join(VARIABLES_FILE), render_variables(&reports).as_bytes())?;
    runtime.write(&dir.join(HEADER_FILE), render_header(&reports).as_bytes())?;
    runtime.write(&dir.join(CMAKE_FILE), render_cmake(&reports).as_bytes())?;

    debug!("Wrote configuration for {} package(s) to {:?}", reports.len(), dir);
    Ok(())
}

fn found(
    reports: &BTreeMap<String, ConfigureReport>,
) -> impl Iterator<Item = (&ConfigureReport, &LinkSettings)> {
    reports
        .values()
        .filter(|r| r.have_package)
        .filter_map(|r| r.settings.as_ref().map(|s| (r, s)))
}

pub fn render_variables(reports: &BTreeMap<String, ConfigureReport>) -> String {
    let mut out = String::new();
    for (report, settings) in found(reports) {
        let _ = writeln!(
            out,
            "{}_LIB = {}",
            report.package.to_uppercase(),
            settings.lib_line()
        );
    }
    out
}

pub fn render_header(reports: &BTreeMap<String, ConfigureReport>) -> String {
    let mut out = String::new();
    for (report, _) in found(reports) {
        let name = report.macro_name();
        let _ = writeln!(out, "#ifndef {}", name);
        let _ = writeln!(out, "#define {} 1", name);
        let _ = writeln!(out, "#endif\n");
    }
    out
}

pub fn render_cmake(reports: &BTreeMap<String, ConfigureReport>) -> String {
    let mut out = String::new();
    for (report, settings) in found(reports) {
        let _ = writeln!(out, "set ({} YES)", report.macro_name());
        let hints = settings
            .dir
            .as_ref()
            .map(|dir| format!(" HINTS {}", dir.display()))
            .unwrap_or_default();
        for lib in settings.library_names() {
            let var = format!("{}_LIB_{}", report.package.to_uppercase(), lib.to_uppercase());
            let _ = writeln!(out, "find_library ({} {}{})", var, lib, hints);
            let _ = writeln!(out, "list (APPEND SLEPC_PACKAGE_LIBS ${{{}}})", var);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MockRuntime, RealRuntime};
    use tempfile::tempdir;

    fn settings(dir: Option<&str>) -> LinkSettings {
        LinkSettings {
            package: "arpack".to_string(),
            dir: dir.map(PathBuf::from),
            flags: vec![
                "-L/opt/arpack/lib".to_string(),
                "-lparpack".to_string(),
                "-larpack".to_string(),
            ],
            functions: vec!["pdnaupd".to_string()],
        }
    }

    fn reports(report: ConfigureReport) -> BTreeMap<String, ConfigureReport> {
        BTreeMap::from([(report.package.clone(), report)])
    }

    #[test]
    fn test_render_variables() {
        let r = reports(ConfigureReport::found(settings(None), &BuildConfig::default()));
        assert_eq!(
            render_variables(&r),
            "ARPACK_LIB = -L/opt/arpack/lib -lparpack -larpack\n"
        );
    }

    #[test]
    fn test_render_header() {
        let r = reports(ConfigureReport::found(settings(None), &BuildConfig::default()));
        assert_eq!(
            render_header(&r),
            "#ifndef SLEPC_HAVE_ARPACK\n#define SLEPC_HAVE_ARPACK 1\n#endif\n\n"
        );
    }

    #[test]
    fn test_render_cmake_with_hint_dir() {
        let r = reports(ConfigureReport::found(
            settings(Some("/opt/arpack/lib")),
            &BuildConfig::default(),
        ));
        let cmake = render_cmake(&r);
        assert!(cmake.starts_with("set (SLEPC_HAVE_ARPACK YES)\n"));
        assert!(cmake.contains("find_library (ARPACK_LIB_PARPACK parpack HINTS /opt/arpack/lib)\n"));
        assert!(cmake.contains("find_library (ARPACK_LIB_ARPACK arpack HINTS /opt/arpack/lib)\n"));
        assert!(cmake.contains("list (APPEND SLEPC_PACKAGE_LIBS ${ARPACK_LIB_ARPACK})\n"));
    }

    #[test]
    fn test_missing_package_renders_nothing() {
        let r = reports(ConfigureReport::missing("arpack", &BuildConfig::default()));
        assert_eq!(render_variables(&r), "");
        assert_eq!(render_header(&r), "");
        assert_eq!(render_cmake(&r), "");
    }

    #[test]
    fn test_load_reports_without_file() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| false);
        assert!(load_reports(&runtime, Path::new("/arch")).unwrap().is_empty());
    }

    #[test]
    fn test_record_writes_all_files_and_merges() {
        let dir = tempdir().unwrap();
        let arch = dir.path();

        record(
            &RealRuntime,
            arch,
            ConfigureReport::missing("blopex", &BuildConfig::default()),
        )
        .unwrap();
        record(
            &RealRuntime,
            arch,
            ConfigureReport::found(settings(None), &BuildConfig::default()),
        )
        .unwrap();

        let conf = arch.join(CONF_DIR);
        for file in [REPORT_FILE, VARIABLES_FILE, HEADER_FILE, CMAKE_FILE] {
            assert!(conf.join(file).exists(), "{} missing", file);
        }

        let stored = load_reports(&RealRuntime, arch).unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored["arpack"].have_package);
        assert!(!stored["blopex"].have_package);

        let vars = std::fs::read_to_string(conf.join(VARIABLES_FILE)).unwrap();
        assert_eq!(vars, "ARPACK_LIB = -L/opt/arpack/lib -lparpack -larpack\n");
    }

    #[test]
    fn test_record_rejects_corrupt_report() {
        let dir = tempdir().unwrap();
        let conf = dir.path().join(CONF_DIR);
        std::fs::create_dir_all(&conf).unwrap();
        std::fs::write(conf.join(REPORT_FILE), "not json").unwrap();

        let err = record(
            &RealRuntime,
            dir.path(),
            ConfigureReport::missing("arpack", &BuildConfig::default()),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }
}
