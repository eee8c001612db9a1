//! Storage layout configuration

use std::path::PathBuf;

use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// Storage layout for deployhook
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Base directory for all storage
    pub base_dir: PathBuf,
}

impl StorageLayout {
    /// Create a new storage layout
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Get the settings file path
    pub fn settings_file(&self) -> File {
        File::new(self.base_dir.join("settings.json"))
    }

    /// Get the repository registry file
    pub fn repos_file(&self) -> File {
        File::new(self.base_dir.join("repos.json"))
    }

    /// Per-repo env blobs
    pub fn secrets_dir(&self) -> Dir {
        Dir::new(self.base_dir.join(".secrets"))
    }

    /// Env files materialized for a running deploy
    pub fn run_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("run"))
    }

    /// Setup the storage layout (create directories)
    pub async fn setup(&self) -> Result<(), crate::errors::DeployHookError> {
        self.secrets_dir().create().await?;
        self.run_dir().create().await?;
        Ok(())
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self::new("/app/data")
    }
}
