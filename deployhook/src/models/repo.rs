//! Repository configuration models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One managed deployment: which workflow runs redeploy which container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoConfig {
    /// Stable identifier
    pub id: String,

    /// GitHub repository as `owner/name`
    pub github_repo: String,

    /// Only workflow runs on this branch trigger a deploy
    pub branch: String,

    /// Target container for stop/rm/run
    pub container_name: String,

    /// Full image reference; may contain a `{branch}` placeholder
    pub image: String,

    #[serde(default)]
    pub ports: Vec<String>,

    #[serde(default)]
    pub volumes: Vec<String>,

    /// Raw `docker run` flags, one flag expression per entry
    #[serde(default)]
    pub extra_flags: Vec<String>,

    /// Reference to the per-repo env blob held by the credential store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_file_ref: Option<String>,

    /// Inactive configs are never matched
    #[serde(default = "default_true")]
    pub active: bool,

    #[serde(default)]
    pub last_deployed: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

impl RepoConfig {
    /// Image reference with the branch placeholder resolved
    pub fn resolved_image(&self, branch: &str) -> String {
        crate::utils::expand_image(&self.image, branch)
    }
}
