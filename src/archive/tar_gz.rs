use crate::runtime::Runtime;
use anyhow::{Context, Result, anyhow};
use flate2::read::GzDecoder;
use log::{debug, info};
use std::path::Path;
use tar::Archive;

use super::ArchiveExtractor;

/// Extractor for gzip-compressed tarballs (`.tar.gz`, `.tgz`)
#[derive(Default)]
pub struct TarGzExtractor;

impl ArchiveExtractor for TarGzExtractor {
    fn can_handle(&self, archive_path: &Path) -> bool {
        let name = archive_path.to_string_lossy().to_lowercase();
        name.ends_with(".tar.gz") || name.ends_with(".tgz")
    }

    fn extract<R: Runtime>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
    ) -> Result<()> {
        debug!("Extracting {:?} to {:?}...", archive_path, extract_to);
        let file = runtime
            .open(archive_path)
            .with_context(|| format!("Failed to open archive at {:?}", archive_path))?;

        let file_name = extract_to
            .file_name()
            .ok_or_else(|| anyhow!("Invalid extraction target {:?}", extract_to))?;
        let temp_extract_dir =
            extract_to.with_file_name(format!("{}_temp_extract", file_name.to_string_lossy()));
        if runtime.exists(&temp_extract_dir) {
            runtime.remove_dir_all(&temp_extract_dir)?;
        }
        runtime.create_dir_all(&temp_extract_dir)?;

        let mut archive = Archive::new(GzDecoder::new(file));
        for entry in archive
            .entries()
            .with_context(|| format!("Failed to read archive {:?}", archive_path))?
        {
            let mut entry = entry.context("Failed to read tar entry")?;
            // unpack_in refuses entries that would escape the target directory
            if !entry
                .unpack_in(&temp_extract_dir)
                .context("Failed to unpack tar entry")?
            {
                debug!("Skipping entry with unsafe path {:?}", entry.path()?);
            }
        }

        let entries = runtime
            .read_dir(&temp_extract_dir)
            .context("Failed to read temp extraction directory")?;

        let source_dir = match entries.as_slice() {
            [] => return Err(anyhow!("Archive appears to be empty.")),
            [single] if runtime.is_dir(single) => single.clone(),
            _ => temp_extract_dir.clone(),
        };

        // temp/arpack-ng-3.3.0/* -> extract_to/*
        runtime.create_dir_all(extract_to)?;
        debug!("Moving contents from {:?} to {:?}", source_dir, extract_to);
        for item in runtime.read_dir(&source_dir)? {
            let Some(name) = item.file_name() else {
                continue;
            };
            runtime.rename(&item, &extract_to.join(name))?;
        }

        runtime.remove_dir_all(&temp_extract_dir)?;

        info!("Extraction complete.");
        Ok(())
    }
}
