use crate::archive::{ArchiveExtractor, ArchiveExtractorImpl};
use crate::http::HttpClient;
use crate::package::PackageDescriptor;
use crate::runtime::Runtime;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::info;
use std::fmt;
use std::path::{Path, PathBuf};

/// Where a package's source archive comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadSource {
    Url(String),
    LocalFile(PathBuf),
}

impl DownloadSource {
    /// `http://` and `https://` are URLs; anything else is a local path.
    pub fn parse(value: &str) -> Self {
        if value.starts_with("http://") || value.starts_with("https://") {
            DownloadSource::Url(value.to_string())
        } else {
            DownloadSource::LocalFile(PathBuf::from(value))
        }
    }
}

impl fmt::Display for DownloadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadSource::Url(url) => write!(f, "{}", url),
            DownloadSource::LocalFile(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Downloads a file from a URL to a temporary path with retry support.
#[tracing::instrument(skip(runtime, temp_path, http_client))]
pub async fn download_file<R: Runtime>(
    runtime: &R,
    url: &str,
    temp_path: &Path,
    http_client: &HttpClient,
) -> Result<()> {
    info!("Downloading file from {}...", url);

    let temp_path = temp_path.to_path_buf();
    http_client
        .download_file(url, || {
            runtime
                .create_file(&temp_path)
                .with_context(|| format!("Failed to create temporary file at {:?}", temp_path))
        })
        .await?;

    info!("Download complete.");
    Ok(())
}

/// Capability to place a package's unpacked sources at `build_dir`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(
        &self,
        descriptor: &PackageDescriptor,
        source: &DownloadSource,
        extern_dir: &Path,
        build_dir: &Path,
    ) -> Result<()>;
}

/// Fetches source tarballs over HTTP (or from disk) and unpacks them.
pub struct ArchiveFetcher<'a, R: Runtime> {
    runtime: &'a R,
    http_client: HttpClient,
    extractor: ArchiveExtractorImpl,
}

impl<'a, R: Runtime> ArchiveFetcher<'a, R> {
    pub fn new(runtime: &'a R, http_client: HttpClient) -> Self {
        Self {
            runtime,
            http_client,
            extractor: ArchiveExtractorImpl::new(),
        }
    }
}

#[async_trait]
impl<R: Runtime> Fetcher for ArchiveFetcher<'_, R> {
    #[tracing::instrument(skip(self, descriptor))]
    async fn fetch(
        &self,
        descriptor: &PackageDescriptor,
        source: &DownloadSource,
        extern_dir: &Path,
        build_dir: &Path,
    ) -> Result<()> {
        if self.runtime.exists(build_dir) {
            info!(
                "Using existing {} sources in {}",
                descriptor.name,
                build_dir.display()
            );
            return Ok(());
        }

        self.runtime.create_dir_all(extern_dir)?;
        let archive_path = extern_dir.join(&descriptor.archive);

        match source {
            DownloadSource::Url(url) => {
                download_file(self.runtime, url, &archive_path, &self.http_client)
                    .await
                    .with_context(|| format!("Unable to download {}", descriptor.name))?;
            }
            DownloadSource::LocalFile(path) => {
                info!("Copying {} from {}...", descriptor.name, path.display());
                self.runtime
                    .copy(path, &archive_path)
                    .with_context(|| format!("Unable to copy archive {:?}", path))?;
            }
        }

        self.extractor
            .extract(self.runtime, &archive_path, build_dir)
            .with_context(|| format!("Unable to uncompress {}", archive_path.display()))?;
        self.runtime.remove_file(&archive_path)?;
        Ok(())
    }
}
