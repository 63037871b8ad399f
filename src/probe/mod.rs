//! Link probing: does a set of linker flags provide a set of Fortran symbols?
//!
//! The probe compiles a tiny program that calls every required routine and
//! tries to link it against each candidate combination of search directory
//! and library flags, stopping at the first one that succeeds.

mod guess;

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::BuildConfig;
use crate::configure_log::LogSink;
use crate::runtime::Runtime;

pub use guess::guess_dirs;

/// Linker settings that were proven to work for a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSettings {
    pub package: String,
    /// Search directory; `None` when the default linker path sufficed.
    pub dir: Option<PathBuf>,
    pub flags: Vec<String>,
    pub functions: Vec<String>,
}

impl LinkSettings {
    /// Flags as a single line suitable for a makefile variable.
    pub fn lib_line(&self) -> String {
        self.flags.join(" ")
    }

    /// Names of the libraries passed with `-l`, in link order.
    pub fn library_names(&self) -> Vec<&str> {
        self.flags
            .iter()
            .filter_map(|flag| flag.strip_prefix("-l"))
            .collect()
    }
}

/// Capability to locate and verify a Fortran library.
#[cfg_attr(test, mockall::automock)]
pub trait Prober: Send + Sync {
    /// Candidate search directories for a package, most likely first. The
    /// empty path stands for the linker's default search path.
    fn guess_dirs(&self, name: &str) -> Vec<PathBuf>;

    /// Try every directory × library set until all `functions` resolve.
    fn fortran_lib(
        &self,
        package: &str,
        dirs: &[PathBuf],
        libs: &[Vec<String>],
        functions: &[String],
    ) -> Result<Option<LinkSettings>>;
}

/// Compiles and links a test program with the configured Fortran compiler.
pub struct FortranLinkProbe<'a, R: Runtime> {
    runtime: &'a R,
    config: &'a BuildConfig,
    log: &'a dyn LogSink,
}

impl<'a, R: Runtime> FortranLinkProbe<'a, R> {
    pub fn new(runtime: &'a R, config: &'a BuildConfig, log: &'a dyn LogSink) -> Self {
        Self {
            runtime,
            config,
            log,
        }
    }

    /// `-L<dir>` (and the runtime path flag for shared builds) followed by the
    /// library flags.
    pub fn link_flags(&self, dir: &Path, libs: &[String]) -> Vec<String> {
        let mut flags = Vec::new();
        if !dir.as_os_str().is_empty() {
            if self.config.shared_libs
                && let Some(rpath) = &self.config.rpath_flag
            {
                flags.push(format!("{}{}", rpath, dir.display()));
            }
            flags.push(format!("-L{}", dir.display()));
        }
        flags.extend(libs.iter().cloned());
        flags
    }

    fn link_command(&self, flags: &[String]) -> String {
        let mut parts = vec![self.config.fc.clone()];
        if !self.config.fc_flags.trim().is_empty() {
            parts.push(self.config.fc_flags.trim().to_string());
        }
        parts.push("conftest.f -o conftest".to_string());
        parts.extend(flags.iter().map(|f| shell_quote(f)));
        // Libraries the package itself depends on (BLAS/LAPACK, MPI) come
        // from the parent build and are not part of the recorded flags.
        if !self.config.external_libs.trim().is_empty() {
            parts.push(self.config.external_libs.trim().to_string());
        }
        parts.join(" ")
    }

    /// Every dir × library set in order; the scratch directory is left for
    /// the caller to remove.
    fn search(
        &self,
        scratch: &Path,
        package: &str,
        dirs: &[PathBuf],
        libs: &[Vec<String>],
        functions: &[String],
    ) -> Result<Option<LinkSettings>> {
        self.runtime.create_dir_all(scratch)?;
        self.runtime
            .write(&scratch.join("conftest.f"), test_program(functions).as_bytes())
            .context("Failed to write link test program")?;

        for dir in dirs {
            for lib in libs {
                let flags = self.link_flags(dir, lib);
                let command = self.link_command(&flags);
                debug!("Probing {} with `{}`", package, command);

                let result = self.runtime.run_shell(&command, scratch)?;
                self.log.write(&format!(
                    "Checking {} with: {}\n{}",
                    package, command, result.output
                ))?;

                if result.success() {
                    return Ok(Some(LinkSettings {
                        package: package.to_string(),
                        dir: (!dir.as_os_str().is_empty()).then(|| dir.clone()),
                        flags,
                        functions: functions.to_vec(),
                    }));
                }
            }
        }
        Ok(None)
    }

    fn scratch_dir(&self) -> PathBuf {
        self.runtime
            .temp_dir()
            .join(format!("eigpkg-conftest-{}", std::process::id()))
    }
}

impl<R: Runtime> Prober for FortranLinkProbe<'_, R> {
    fn guess_dirs(&self, name: &str) -> Vec<PathBuf> {
        guess_dirs(self.runtime, name)
    }

    #[tracing::instrument(skip(self, dirs, libs))]
    fn fortran_lib(
        &self,
        package: &str,
        dirs: &[PathBuf],
        libs: &[Vec<String>],
        functions: &[String],
    ) -> Result<Option<LinkSettings>> {
        let scratch = self.scratch_dir();
        let result = self.search(&scratch, package, dirs, libs, functions);

        if let Err(e) = self.runtime.remove_dir_all(&scratch) {
            debug!("Failed to remove probe directory {:?}: {}", scratch, e);
        }

        match &result {
            Ok(Some(settings)) => info!("{} found: {}", package, settings.lib_line()),
            Ok(None) => info!("{} not found in {} candidate directories", package, dirs.len()),
            Err(e) => debug!("Link check for {} aborted: {:#}", package, e),
        }
        result
    }
}

/// Fixed-form Fortran program calling each routine once. Only linking
/// matters; argument lists are left empty.
pub fn test_program(functions: &[String]) -> String {
    let mut program = String::from("      program main\n");
    for function in functions {
        program.push_str(&format!("      call {}()\n", function));
    }
    program.push_str("      end\n");
    program
}

/// Single-quote a word for `sh` when it contains anything but safe characters.
pub fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./,=+:@%".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}
