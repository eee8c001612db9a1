//! Repository registry

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::DeployHookError;
use crate::filesys::file::File;
use crate::models::repo::RepoConfig;

/// Source of repository configurations
#[async_trait]
pub trait RepoRegistry: Send + Sync {
    /// Active configs in registry order
    async fn list_active(&self) -> Result<Vec<RepoConfig>, DeployHookError>;

    /// Look a config up by id, active or not
    async fn get(&self, id: &str) -> Result<Option<RepoConfig>, DeployHookError>;

    /// Record a successful deploy
    async fn set_last_deployed(&self, id: &str, at: DateTime<Utc>) -> Result<(), DeployHookError>;
}

/// Registry stored as an ordered JSON array.
///
/// Writes go through a temp file and rename, so readers see either the old
/// or the new document.
pub struct JsonFileRegistry {
    file: File,
    write_lock: Mutex<()>,
}

impl JsonFileRegistry {
    pub fn new(file: File) -> Self {
        Self {
            file,
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Vec<RepoConfig>, DeployHookError> {
        self.file.read_json_or_default().await.map_err(|e| {
            DeployHookError::RegistryError(format!("{}: {}", self.file.path().display(), e))
        })
    }
}

#[async_trait]
impl RepoRegistry for JsonFileRegistry {
    async fn list_active(&self) -> Result<Vec<RepoConfig>, DeployHookError> {
        let repos = self.load().await?;
        Ok(repos.into_iter().filter(|repo| repo.active).collect())
    }

    async fn get(&self, id: &str) -> Result<Option<RepoConfig>, DeployHookError> {
        let repos = self.load().await?;
        Ok(repos.into_iter().find(|repo| repo.id == id))
    }

    async fn set_last_deployed(&self, id: &str, at: DateTime<Utc>) -> Result<(), DeployHookError> {
        let _guard = self.write_lock.lock().await;

        let mut repos = self.load().await?;
        let repo = repos
            .iter_mut()
            .find(|repo| repo.id == id)
            .ok_or_else(|| DeployHookError::NotFound(format!("repo {}", id)))?;
        repo.last_deployed = Some(at);

        self.file.write_json(&repos).await?;
        debug!("Recorded last deploy of {} at {}", id, at);
        Ok(())
    }
}
