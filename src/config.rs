//! Numeric build configuration supplied by the parent PETSc build.
//!
//! A [`BuildConfig`] is assembled once per run: defaults, then the values
//! found in a PETSc `petscvariables` file, then command line overrides.

use anyhow::{Context, Result, bail};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::runtime::Runtime;

/// Scalar type of the PETSc build.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    #[default]
    Real,
    Complex,
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarKind::Real => write!(f, "real"),
            ScalarKind::Complex => write!(f, "complex"),
        }
    }
}

impl FromStr for ScalarKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "real" => Ok(ScalarKind::Real),
            "complex" => Ok(ScalarKind::Complex),
            _ => bail!("Unknown scalar type: {}. Expected real or complex.", s),
        }
    }
}

/// Floating point precision of the PETSc build.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Single,
    #[default]
    Double,
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precision::Single => write!(f, "single"),
            Precision::Double => write!(f, "double"),
        }
    }
}

impl FromStr for Precision {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "single" => Ok(Precision::Single),
            "double" => Ok(Precision::Double),
            _ => bail!("Unsupported precision: {}. Expected single or double.", s),
        }
    }
}

/// Compiler, precision and MPI settings every package check reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    pub scalar: ScalarKind,
    pub precision: Precision,
    /// True when PETSc was built against the uniprocessor MPI stub.
    pub mpiuni: bool,
    /// Fortran compiler executable.
    pub fc: String,
    pub fc_flags: String,
    /// Make invocation, e.g. `make` or `/usr/bin/gmake -j4`.
    pub make: String,
    pub shared_libs: bool,
    /// Linker flag prefix used to embed a runtime search path, e.g. `-Wl,-rpath,`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpath_flag: Option<String>,
    /// Parent build's own link line (BLAS/LAPACK, MPI, ...), appended when
    /// link-checking a package so static libraries resolve.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub external_libs: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            scalar: ScalarKind::default(),
            precision: Precision::default(),
            mpiuni: false,
            fc: "gfortran".to_string(),
            fc_flags: String::new(),
            make: "make".to_string(),
            shared_libs: false,
            rpath_flag: None,
            external_libs: String::new(),
        }
    }
}

/// Values given on the command line; `None` keeps what the file provided.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub scalar: Option<ScalarKind>,
    pub precision: Option<Precision>,
    pub mpiuni: Option<bool>,
    pub fc: Option<String>,
    pub fc_flags: Option<String>,
    pub make: Option<String>,
}

impl BuildConfig {
    /// Parse `KEY = VALUE` lines as written by PETSc into `petscvariables`.
    /// Unknown keys are ignored; missing keys keep their defaults.
    pub fn from_variables(text: &str) -> Result<Self> {
        let mut config = BuildConfig::default();
        let mut omake = None;

        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                debug!("Ignoring line {} without assignment: {}", lineno + 1, line);
                continue;
            };
            let value = value.trim();

            match key.trim() {
                "PETSC_SCALAR" => config.scalar = value.parse()?,
                "PETSC_PRECISION" => config.precision = value.parse()?,
                "MPI_IS_MPIUNI" => config.mpiuni = parse_flag(value),
                "FC" => config.fc = value.to_string(),
                "FC_FLAGS" => config.fc_flags = value.to_string(),
                "OMAKE" => omake = Some(value.to_string()),
                "MAKE" if omake.is_none() => config.make = value.to_string(),
                "BUILDSHAREDLIB" => config.shared_libs = parse_flag(value),
                "CC_LINKER_SLFLAG" if !value.is_empty() => {
                    config.rpath_flag = Some(value.to_string())
                }
                "PETSC_EXTERNAL_LIB_BASIC" => config.external_libs = value.to_string(),
                _ => {}
            }
        }

        if let Some(make) = omake {
            config.make = make;
        }
        Ok(config)
    }

    /// Load a variables file through the runtime.
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, path: &Path) -> Result<Self> {
        let text = runtime
            .read_to_string(path)
            .with_context(|| format!("Failed to read PETSc variables from {:?}", path))?;
        Self::from_variables(&text)
            .with_context(|| format!("Invalid PETSc variables file {:?}", path))
    }

    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Self {
        if let Some(scalar) = overrides.scalar {
            self.scalar = scalar;
        }
        if let Some(precision) = overrides.precision {
            self.precision = precision;
        }
        if let Some(mpiuni) = overrides.mpiuni {
            self.mpiuni = mpiuni;
        }
        if let Some(fc) = &overrides.fc {
            self.fc = fc.clone();
        }
        if let Some(fc_flags) = &overrides.fc_flags {
            self.fc_flags = fc_flags.clone();
        }
        if let Some(make) = &overrides.make {
            self.make = make.clone();
        }
        self
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.to_lowercase().as_str(),
        "1" | "yes" | "true" | "on"
    )
}

/// Default architecture directory that receives external packages, logs and
/// generated configuration.
#[tracing::instrument(skip(runtime))]
pub fn default_arch_dir<R: Runtime>(runtime: &R) -> Result<PathBuf> {
    if runtime.is_privileged() {
        Ok(system_arch_dir())
    } else {
        let home_dir = runtime
            .home_dir()
            .context("Could not find home directory")?;
        Ok(home_dir.join(".eigpkg"))
    }
}

#[cfg(target_os = "macos")]
fn system_arch_dir() -> PathBuf {
    PathBuf::from("/opt/eigpkg")
}

#[cfg(target_os = "windows")]
fn system_arch_dir() -> PathBuf {
    PathBuf::from(r"C:\ProgramData\eigpkg")
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn system_arch_dir() -> PathBuf {
    PathBuf::from("/usr/local/eigpkg")
}
