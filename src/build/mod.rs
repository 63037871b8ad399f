//! Autotools build of a downloaded package.

use anyhow::Result;
use log::{debug, info};
use std::path::Path;

use crate::config::BuildConfig;
use crate::configure_log::LogSink;
use crate::error::PackageError;
use crate::runtime::Runtime;

/// Warning flags that break the arpack-ng build when passed through FFLAGS.
pub const REJECTED_FORTRAN_FLAGS: [&str; 2] = ["-Wall", "-Wshadow"];

/// Remove the rejected warning flags from a compiler flag string.
///
/// Whole words starting with a rejected flag are dropped (`-Wall`,
/// `-Wshadow=local`, or the glued `-Wall-Wshadow`); a rejected flag
/// occurring inside another word, such as a path, is left alone.
pub fn strip_warning_flags(flags: &str) -> String {
    flags
        .split_whitespace()
        .filter(|word| {
            !REJECTED_FORTRAN_FLAGS
                .iter()
                .any(|rejected| word.starts_with(rejected))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Arguments for `./configure`.
pub fn configure_options(config: &BuildConfig, prefix: &Path) -> String {
    let mut options = format!(
        "--prefix={} F77=\"{}\" FFLAGS=\"{}\"",
        prefix.display(),
        config.fc,
        strip_warning_flags(&config.fc_flags)
    );
    if !config.mpiuni {
        options.push_str(" --enable-mpi");
    }
    options
}

/// The whole build as a single `&&` chain, so the first failing stage stops it.
pub fn build_command(config: &BuildConfig, configure_options: &str) -> String {
    format!(
        "sh bootstrap && ./configure {} && {} && {} install",
        configure_options, config.make, config.make
    )
}

/// Run `command` in `build_dir`, always logging its output.
///
/// A non-zero exit becomes [`PackageError::BuildFailed`], which the caller is
/// expected to treat as fatal.
#[tracing::instrument(skip(runtime, log))]
pub fn run_build(
    runtime: &dyn Runtime,
    log: &dyn LogSink,
    package: &str,
    build_dir: &Path,
    command: &str,
) -> Result<()> {
    info!("Building {} in {:?}...", package, build_dir);
    debug!("Build command: {}", command);

    let result = runtime.run_shell(command, build_dir)?;
    log.write(&format!(
        "Running in {}: {}\n{}",
        build_dir.display(),
        command,
        result.output
    ))?;

    if !result.success() {
        return Err(PackageError::BuildFailed {
            package: package.to_string(),
            status: result.status,
            output: result.output,
        }
        .into());
    }

    info!("{} built and installed.", package);
    Ok(())
}
