//! Outcome reporting: registry bookkeeping and notifications

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::models::deployment::{DeployJob, DeployOutcome, NotifyEvent, NotifyKind};
use crate::notify::Notifier;
use crate::registry::RepoRegistry;

/// Publishes deploy progress.
///
/// Nothing here can change an outcome; registry and notifier errors are
/// logged and dropped.
pub struct OutcomeReporter {
    registry: Arc<dyn RepoRegistry>,
    notifier: Arc<dyn Notifier>,
}

impl OutcomeReporter {
    pub fn new(registry: Arc<dyn RepoRegistry>, notifier: Arc<dyn Notifier>) -> Self {
        Self { registry, notifier }
    }

    /// Announce an admitted job
    pub async fn started(&self, job: &DeployJob) {
        let detail = format!("Deploying {}", job.image);
        self.send(NotifyEvent::for_job(NotifyKind::Start, job, None, detail))
            .await;
    }

    pub async fn report(&self, job: &DeployJob, outcome: &DeployOutcome) {
        match outcome {
            DeployOutcome::Succeeded => {
                if let Err(e) = self.registry.set_last_deployed(&job.repo_id, Utc::now()).await {
                    warn!("Failed to record last deploy of {}: {}", job.repo_id, e);
                }
                let detail = format!("{} is running {}", job.container_name, job.image);
                self.send(NotifyEvent::for_job(NotifyKind::Success, job, None, detail))
                    .await;
            }
            DeployOutcome::Failed { stage, reason } => {
                let mut event = NotifyEvent::for_job(NotifyKind::Failure, job, Some(*stage), reason.clone());
                if outcome.leaves_container_absent() {
                    error!(
                        "Container {} is DOWN after deploy #{}: {}",
                        job.container_name, job.attempt_id, reason
                    );
                    event.container_down = true;
                }
                self.send(event).await;
            }
            DeployOutcome::Skipped { reason } => {
                info!("Deploy #{} of {} skipped: {}", job.attempt_id, job.container_name, reason);
            }
        }
    }

    async fn send(&self, event: NotifyEvent) {
        if let Err(e) = self.notifier.notify(&event).await {
            warn!(
                "Failed to send {:?} notification for {}: {}",
                event.kind, event.container_name, e
            );
        }
    }
}
