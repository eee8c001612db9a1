//! Event filtering and repository matching

use crate::models::repo::RepoConfig;
use crate::webhook::payload::WebhookEvent;

/// Why an event did not lead to a deploy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Not a `workflow_run` delivery (ping, push, ...)
    OtherEvent(String),

    /// Run not completed, or completed without success
    NotSuccessful {
        action: String,
        conclusion: Option<String>,
    },
}

impl std::fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IgnoreReason::OtherEvent(event) => write!(f, "event {} is not handled", event),
            IgnoreReason::NotSuccessful { action, conclusion } => write!(
                f,
                "workflow run {} with conclusion {}",
                action,
                conclusion.as_deref().unwrap_or("none")
            ),
        }
    }
}

/// Only completed, successful runs are deploy-worthy
pub fn filter(event: &WebhookEvent) -> Result<(), IgnoreReason> {
    if event.action == "completed" && event.conclusion.as_deref() == Some("success") {
        Ok(())
    } else {
        Err(IgnoreReason::NotSuccessful {
            action: event.action.clone(),
            conclusion: event.conclusion.clone(),
        })
    }
}

/// Resolve a deploy-worthy event to a configured repository.
///
/// Repository and branch must both match exactly (case-sensitive). When
/// several active configs match, the first in registry order wins.
pub fn match_repo<'a>(event: &WebhookEvent, repos: &'a [RepoConfig]) -> Option<&'a RepoConfig> {
    filter(event).ok()?;
    repos.iter().find(|repo| {
        repo.active
            && repo.github_repo == event.repository_full_name
            && repo.branch == event.head_branch
    })
}
