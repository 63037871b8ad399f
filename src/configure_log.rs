//! Persistent configure log.
//!
//! Console diagnostics go through `log`; everything a user needs to debug a
//! failed check or build (commands run and their full output) is appended
//! here instead.

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

pub const LOG_FILE_NAME: &str = "configure.log";

#[cfg_attr(test, mockall::automock)]
pub trait LogSink: Send + Sync {
    fn write(&self, text: &str) -> Result<()>;
}

/// Appends to `<arch>/configure.log`, creating the directory on first use.
pub struct FileLog<'a, R: Runtime> {
    runtime: &'a R,
    path: PathBuf,
}

impl<'a, R: Runtime> FileLog<'a, R> {
    pub fn new(runtime: &'a R, arch_dir: &Path) -> Self {
        Self {
            runtime,
            path: arch_dir.join(LOG_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<R: Runtime> LogSink for FileLog<'_, R> {
    fn write(&self, text: &str) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !self.runtime.exists(parent)
        {
            self.runtime.create_dir_all(parent)?;
        }

        let mut text = text.to_string();
        if !text.ends_with('\n') {
            text.push('\n');
        }
        self.runtime.append(&self.path, text.as_bytes())
    }
}
