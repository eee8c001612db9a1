//! Directory operations

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::errors::DeployHookError;
use crate::filesys::file::File;

/// A directory wrapper with path
#[derive(Debug, Clone)]
pub struct Dir {
    path: PathBuf,
}

impl Dir {
    /// Create a new directory reference
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the directory path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the directory (and parents)
    pub async fn create(&self) -> Result<(), DeployHookError> {
        fs::create_dir_all(&self.path).await?;
        Ok(())
    }

    /// Get a file within this directory.
    ///
    /// Names containing path separators or `..` are rejected so a reference
    /// stored in configuration can never escape the directory.
    pub fn file(&self, name: &str) -> Result<File, DeployHookError> {
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(DeployHookError::ConfigError(format!(
                "invalid file name in {}: {:?}",
                self.path.display(),
                name
            )));
        }
        Ok(File::new(self.path.join(name)))
    }

    /// Remove leftover files, returning how many were deleted
    pub async fn clear_files(&self) -> Result<usize, DeployHookError> {
        let mut entries = match fs::read_dir(&self.path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
