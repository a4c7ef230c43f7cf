//! Read-only file store served to clients.

use crate::error::{Error, Result};
use crate::path::resolve;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tracing::warn;

/// Directory of downloadable files.
///
/// Only regular files directly under the root are visible. The store never
/// writes, so sessions share it without locking.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Names of regular files in directory-enumeration order.
    ///
    /// Re-read on every call. Symlinks count if their target is a regular file.
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            let is_file = match fs::metadata(entry.path()).await {
                Ok(meta) => meta.is_file(),
                // Dangling symlink or entry removed mid-scan
                Err(e) if e.kind() == io::ErrorKind::NotFound => false,
                Err(e) => return Err(e.into()),
            };
            if !is_file {
                continue;
            }

            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => warn!("Skipping non UTF-8 file name {:?}", raw),
            }
        }

        Ok(names)
    }

    /// Open `name` for reading.
    ///
    /// Returns `Ok(None)` if no regular file has that name, and
    /// `Err(Error::InvalidName)` if the name would leave the root.
    pub async fn open(&self, name: &str) -> Result<Option<(File, u64)>> {
        let path = resolve(&self.root, name)?;

        let meta = match fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
        };
        if !meta.is_file() {
            return Ok(None);
        }

        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
        };
        Ok(Some((file, meta.len())))
    }
}
