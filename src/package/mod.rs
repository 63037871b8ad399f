//! External packages that can be detected on the system or built from source.
//!
//! Each library implements [`Package`]; the configure commands only talk to
//! that trait and the collaborators bundled in [`PackageContext`].

mod arpack;
mod registry;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::{BuildConfig, Precision};
use crate::configure_log::LogSink;
use crate::download::{DownloadSource, Fetcher};
use crate::error::PackageError;
use crate::probe::{LinkSettings, Prober};
use crate::runtime::Runtime;

pub use arpack::{Arpack, Candidates, Parallelism, Variant};
pub use registry::PackageRegistry;

/// Static description of a third-party package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageDescriptor {
    pub name: String,
    pub url: String,
    /// File name the downloaded archive is stored under.
    pub archive: String,
    /// Directory the archive unpacks into.
    pub dirname: String,
    pub installable: bool,
    pub downloadable: bool,
    pub supports_single: bool,
}

impl PackageDescriptor {
    /// Fail when the package cannot be used at the requested precision.
    pub fn check_precision(&self, precision: Precision) -> Result<()> {
        if precision == Precision::Single && !self.supports_single {
            return Err(PackageError::UnsupportedPrecision {
                package: self.name.clone(),
                precision,
            }
            .into());
        }
        Ok(())
    }

    /// Fail unless the package may be downloaded and built by this tool.
    pub fn check_installable(&self) -> Result<()> {
        if !(self.installable && self.downloadable) {
            return Err(PackageError::NotDownloadable {
                package: self.name.clone(),
            }
            .into());
        }
        Ok(())
    }
}

/// User choices for one package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageOptions {
    /// Search only this directory.
    pub dir: Option<PathBuf>,
    /// Link with exactly these flags.
    pub libs: Option<Vec<String>>,
    /// Archive to use instead of the package's default URL.
    pub download: Option<DownloadSource>,
}

impl PackageOptions {
    /// Split a `--libs` value such as `"-lparpack -larpack"` into flags.
    pub fn parse_libs(value: &str) -> Option<Vec<String>> {
        let libs: Vec<String> = value.split_whitespace().map(str::to_string).collect();
        (!libs.is_empty()).then_some(libs)
    }

    pub fn download_source(&self, descriptor: &PackageDescriptor) -> DownloadSource {
        self.download
            .clone()
            .unwrap_or_else(|| DownloadSource::Url(descriptor.url.clone()))
    }
}

/// Everything a package needs from the surrounding configure run.
pub struct PackageContext<'a> {
    pub config: &'a BuildConfig,
    pub options: &'a PackageOptions,
    pub runtime: &'a dyn Runtime,
    pub prober: &'a dyn Prober,
    pub fetcher: &'a dyn Fetcher,
    pub log: &'a dyn LogSink,
}

#[async_trait]
pub trait Package: Send + Sync {
    fn descriptor(&self) -> &PackageDescriptor;

    /// Look for a usable installation. `Ok(None)` means nothing linked.
    fn detect(&self, ctx: &PackageContext<'_>) -> Result<Option<LinkSettings>>;

    /// Download, build and install into `arch_dir`, then verify the result.
    async fn install(&self, ctx: &PackageContext<'_>, arch_dir: &Path) -> Result<LinkSettings>;
}
