use anyhow::Result;
use clap::Parser;
use eigpkg::commands;
use eigpkg::config::{BuildConfig, ConfigOverrides, Precision, ScalarKind, default_arch_dir};
use eigpkg::configure_log::LOG_FILE_NAME;
use eigpkg::download::DownloadSource;
use eigpkg::error::PackageError;
use eigpkg::package::PackageOptions;
use eigpkg::runtime::{RealRuntime, Runtime};
use log::debug;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// eigpkg - external eigensolver package configuration
///
/// Detects third-party eigensolver libraries for a PETSc/SLEPc style build,
/// or downloads and builds them from source into the architecture directory.
///
/// Examples:
///   eigpkg check arpack                        # Search the usual locations
///   eigpkg check arpack --dir /opt/arpack/lib  # Search one directory only
///   eigpkg install arpack                      # Download and build arpack-ng
#[derive(Parser, Debug)]
#[command(author, version = env!("EIGPKG_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Architecture directory receiving builds, logs and generated files
    #[arg(long = "arch-dir", env = "EIGPKG_ARCH_DIR", value_name = "PATH", global = true)]
    arch_dir: Option<PathBuf>,

    /// PETSc variables file to read the build configuration from
    #[arg(long = "petsc-variables", value_name = "FILE", global = true)]
    petsc_variables: Option<PathBuf>,

    /// Scalar type of the build
    #[arg(long, value_enum, global = true)]
    scalar: Option<ScalarKind>,

    /// Floating point precision of the build
    #[arg(long, value_enum, global = true)]
    precision: Option<Precision>,

    /// Build uses the uniprocessor MPI stub instead of a real MPI
    /// (`--mpiuni` or `--mpiuni=false`)
    #[arg(
        long,
        value_name = "BOOL",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        global = true
    )]
    mpiuni: Option<bool>,

    /// Fortran compiler
    #[arg(long, env = "EIGPKG_FC", value_name = "COMMAND", global = true)]
    fc: Option<String>,

    /// Fortran compiler flags
    #[arg(
        long = "fflags",
        env = "EIGPKG_FFLAGS",
        value_name = "FLAGS",
        allow_hyphen_values = true,
        global = true
    )]
    fflags: Option<String>,

    /// Make command used for source builds
    #[arg(long, env = "EIGPKG_MAKE", value_name = "COMMAND", global = true)]
    make: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Look for an installed package and record how to link it
    Check(CheckArgs),

    /// Download, build and install a package, then record how to link it
    Install(InstallArgs),

    /// List the packages this tool knows about
    List,
}

#[derive(clap::Args, Debug)]
pub struct CheckArgs {
    /// Package name, e.g. "arpack"
    #[arg(value_name = "PACKAGE")]
    pub package: String,

    /// Only search this directory
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Link with exactly these flags, e.g. "-lparpack -larpack"
    #[arg(long, value_name = "FLAGS", allow_hyphen_values = true)]
    pub libs: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct InstallArgs {
    /// Package name, e.g. "arpack"
    #[arg(value_name = "PACKAGE")]
    pub package: String,

    /// Source archive to use instead of the default download (URL or local path)
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            scalar: self.scalar,
            precision: self.precision,
            mpiuni: self.mpiuni,
            fc: self.fc.clone(),
            fc_flags: self.fflags.clone(),
            make: self.make.clone(),
        }
    }

    fn build_config<R: Runtime>(&self, runtime: &R) -> Result<BuildConfig> {
        let config = match &self.petsc_variables {
            Some(path) => BuildConfig::load(runtime, path)?,
            None => BuildConfig::default(),
        };
        Ok(config.with_overrides(&self.overrides()))
    }
}

async fn run<R: Runtime>(cli: &Cli, runtime: &R, arch_dir: &Path) -> Result<()> {
    match &cli.command {
        Commands::Check(args) => {
            let config = cli.build_config(runtime)?;
            debug!("Build configuration: {:?}", config);
            let options = PackageOptions {
                dir: args.dir.clone(),
                libs: args.libs.as_deref().and_then(PackageOptions::parse_libs),
                download: None,
            };
            let settings = commands::check(runtime, &config, arch_dir, &args.package, &options)?;
            println!("{}: {}", args.package.to_uppercase(), settings.lib_line());
        }
        Commands::Install(args) => {
            let config = cli.build_config(runtime)?;
            debug!("Build configuration: {:?}", config);
            let options = PackageOptions {
                download: args.url.as_deref().map(DownloadSource::parse),
                ..PackageOptions::default()
            };
            let settings =
                commands::install(runtime, &config, arch_dir, &args.package, &options).await?;
            println!("{}: {}", args.package.to_uppercase(), settings.lib_line());
        }
        Commands::List => commands::list()?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = RealRuntime;

    let arch_dir = match cli.arch_dir.clone() {
        Some(path) => path,
        None => match default_arch_dir(&runtime) {
            Ok(path) => path,
            Err(e) => {
                eprintln!("Error: {:#}", e);
                return ExitCode::FAILURE;
            }
        },
    };

    match run(&cli, &runtime, &arch_dir).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<PackageError>() {
                Some(err) if err.is_fatal() => {
                    eprintln!("ERROR: {}", err);
                    eprintln!("See {} for details.", arch_dir.join(LOG_FILE_NAME).display());
                }
                _ => eprintln!("Error: {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_check_parsing() {
        let cli = Cli::try_parse_from(["eigpkg", "check", "arpack"]).unwrap();
        match cli.command {
            Commands::Check(args) => {
                assert_eq!(args.package, "arpack");
                assert_eq!(args.dir, None);
                assert_eq!(args.libs, None);
            }
            _ => panic!("Expected Check command"),
        }
        assert_eq!(cli.arch_dir, None);
    }

    #[test]
    fn test_cli_check_with_dir_and_libs() {
        let cli = Cli::try_parse_from([
            "eigpkg",
            "check",
            "arpack",
            "--dir",
            "/opt/arpack/lib",
            "--libs",
            "-lparpack -larpack",
        ])
        .unwrap();
        match cli.command {
            Commands::Check(args) => {
                assert_eq!(args.dir, Some(PathBuf::from("/opt/arpack/lib")));
                assert_eq!(args.libs.as_deref(), Some("-lparpack -larpack"));
            }
            _ => panic!("Expected Check command"),
        }
    }

    #[test]
    fn test_cli_install_url_parsing() {
        let cli = Cli::try_parse_from([
            "eigpkg",
            "install",
            "arpack",
            "--url",
            "https://mirror.example/arpack.tar.gz",
        ])
        .unwrap();
        match cli.command {
            Commands::Install(args) => {
                assert_eq!(args.package, "arpack");
                assert_eq!(
                    args.url.as_deref(),
                    Some("https://mirror.example/arpack.tar.gz")
                );
            }
            _ => panic!("Expected Install command"),
        }
    }

    #[test]
    fn test_cli_global_options_before_and_after_subcommand() {
        let cli = Cli::try_parse_from([
            "eigpkg",
            "--arch-dir",
            "/tmp/arch",
            "--precision",
            "single",
            "check",
            "arpack",
            "--scalar",
            "complex",
            "--mpiuni",
        ])
        .unwrap();
        assert_eq!(cli.arch_dir, Some(PathBuf::from("/tmp/arch")));
        assert_eq!(cli.precision, Some(Precision::Single));
        assert_eq!(cli.scalar, Some(ScalarKind::Complex));
        assert_eq!(cli.mpiuni, Some(true));
    }

    #[test]
    fn test_cli_mpiuni_explicit_false() {
        let cli = Cli::try_parse_from(["eigpkg", "list", "--mpiuni=false"]).unwrap();
        assert_eq!(cli.mpiuni, Some(false));
    }

    #[test]
    fn test_cli_mpiuni_before_subcommand() {
        let cli = Cli::try_parse_from(["eigpkg", "--mpiuni", "check", "arpack"]).unwrap();
        assert_eq!(cli.mpiuni, Some(true));
        match cli.command {
            Commands::Check(args) => assert_eq!(args.package, "arpack"),
            _ => panic!("Expected Check command"),
        }

        let cli = Cli::try_parse_from(["eigpkg", "--mpiuni=false", "install", "arpack"]).unwrap();
        assert_eq!(cli.mpiuni, Some(false));
        assert!(matches!(cli.command, Commands::Install(_)));
    }

    #[test]
    fn test_cli_mpiuni_value_needs_equals() {
        assert!(Cli::try_parse_from(["eigpkg", "list", "--mpiuni", "false"]).is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::try_parse_from([
            "eigpkg",
            "check",
            "arpack",
            "--fc",
            "ifort",
            "--fflags=-O2 -Wall",
            "--make",
            "gmake",
        ])
        .unwrap();
        let overrides = cli.overrides();
        assert_eq!(overrides.fc.as_deref(), Some("ifort"));
        assert_eq!(overrides.fc_flags.as_deref(), Some("-O2 -Wall"));
        assert_eq!(overrides.make.as_deref(), Some("gmake"));
        assert_eq!(overrides.scalar, None);
    }

    #[test]
    fn test_cli_list_parsing() {
        let cli = Cli::try_parse_from(["eigpkg", "list"]).unwrap();
        assert!(matches!(cli.command, Commands::List));
    }

    #[test]
    fn test_cli_no_subcommand_fails() {
        assert!(Cli::try_parse_from(["eigpkg", "arpack"]).is_err());
    }

    #[test]
    fn test_cli_rejects_unknown_precision() {
        assert!(Cli::try_parse_from(["eigpkg", "--precision", "quad", "list"]).is_err());
    }
}
