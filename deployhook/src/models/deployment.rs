//! Deployment job models

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::deploy::fsm::Stage;

/// What caused a deploy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// A successful workflow run on the configured branch
    Webhook { head_branch: String },

    /// An operator asked for a redeploy through the API
    Manual,
}

/// One deploy attempt for one repository
#[derive(Debug, Clone)]
pub struct DeployJob {
    /// Monotonic per-process attempt number
    pub attempt_id: u64,

    pub repo_id: String,
    pub github_repo: String,
    pub container_name: String,

    /// Image with the branch placeholder already resolved
    pub image: String,

    pub trigger: Trigger,
    pub started_at: DateTime<Utc>,
}

/// Operator action on a container outside the deploy pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerAction {
    /// `docker restart`; the image is not pulled again
    Restart,

    /// Stop and remove the container
    Stop,
}

impl fmt::Display for ContainerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerAction::Restart => write!(f, "restart"),
            ContainerAction::Stop => write!(f, "stop"),
        }
    }
}

/// Terminal result of a deploy job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeployOutcome {
    Succeeded,
    Failed { stage: Stage, reason: String },
    Skipped { reason: String },
}

impl DeployOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DeployOutcome::Succeeded)
    }

    /// A failure at `Starting` means the old container is already gone
    pub fn leaves_container_absent(&self) -> bool {
        matches!(
            self,
            DeployOutcome::Failed {
                stage: Stage::Starting,
                ..
            }
        )
    }
}

impl fmt::Display for DeployOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployOutcome::Succeeded => write!(f, "succeeded"),
            DeployOutcome::Failed { stage, reason } => write!(f, "failed at {}: {}", stage, reason),
            DeployOutcome::Skipped { reason } => write!(f, "skipped: {}", reason),
        }
    }
}

/// Notification kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyKind {
    Start,
    Success,
    Failure,
}

/// Message handed to a notifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyEvent {
    pub kind: NotifyKind,
    pub repo_id: String,
    pub github_repo: String,
    pub container_name: String,
    pub image: String,

    /// Failure stage, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,

    /// Human readable detail; the failure reason for `Failure`
    pub detail: String,

    /// The old container was removed and its replacement never started
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub container_down: bool,
}

impl NotifyEvent {
    pub fn for_job(kind: NotifyKind, job: &DeployJob, stage: Option<Stage>, detail: String) -> Self {
        Self {
            kind,
            repo_id: job.repo_id.clone(),
            github_repo: job.github_repo.clone(),
            container_name: job.container_name.clone(),
            image: job.image.clone(),
            stage,
            detail,
            container_down: false,
        }
    }
}
