//! Webhook to deploy orchestration

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use secrecy::ExposeSecret;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tokio_util::task::task_tracker::TaskTrackerToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use crate::credentials::CredentialStore;
use crate::deploy::executor::{fail, DeployExecutor};
use crate::deploy::fsm::DeployFsm;
use crate::deploy::lock::{Acquire, DeployLockManager, Lease};
use crate::deploy::reporter::OutcomeReporter;
use crate::errors::{DeployHookError, StageFailure};
use crate::models::deployment::{ContainerAction, DeployJob, DeployOutcome, Trigger};
use crate::models::repo::RepoConfig;
use crate::registry::RepoRegistry;
use crate::webhook::matcher::{self, IgnoreReason};
use crate::webhook::payload::{WebhookEvent, WORKFLOW_RUN_EVENT};
use crate::webhook::signature;

pub const BUSY_REASON: &str = "deploy already in progress";

/// What became of an incoming request before any container work
#[derive(Debug)]
pub enum Admission {
    /// Verified, but not a deploy-worthy event
    Ignored(IgnoreReason),

    /// No active repository config matches
    NoMatch,

    /// The container is already being deployed
    Skipped(DeployJob),

    /// Lease held; ready for `Orchestrator::execute`
    Admitted(AdmittedDeploy),
}

/// A job holding its container's lease, counted as running until it is
/// executed or dropped
#[derive(Debug)]
pub struct AdmittedDeploy {
    pub job: DeployJob,
    repo: RepoConfig,
    lease: Lease,
    tracked: TaskTrackerToken,
}

/// Acknowledgment returned to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ack {
    pub status: AckStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt_id: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AckStatus {
    Ignored,
    NoMatch,
    Skipped,
    Accepted,
    Succeeded,
    Failed,
}

impl Ack {
    fn new(status: AckStatus, attempt_id: Option<u64>, detail: Option<String>) -> Self {
        Self {
            status,
            attempt_id,
            detail,
        }
    }

    fn finished(job: &DeployJob, outcome: &DeployOutcome) -> Self {
        match outcome {
            DeployOutcome::Succeeded => Self::new(AckStatus::Succeeded, Some(job.attempt_id), None),
            DeployOutcome::Failed { .. } => {
                Self::new(AckStatus::Failed, Some(job.attempt_id), Some(outcome.to_string()))
            }
            DeployOutcome::Skipped { reason } => {
                Self::new(AckStatus::Skipped, Some(job.attempt_id), Some(reason.clone()))
            }
        }
    }
}

/// Verify, match, lock, execute, report.
///
/// Deploys of different containers never wait on each other; the only
/// shared state is the lock table. Every running job is tracked so shutdown
/// can wait for it or interrupt it.
pub struct Orchestrator {
    registry: Arc<dyn RepoRegistry>,
    credentials: Arc<dyn CredentialStore>,
    locks: DeployLockManager,
    executor: DeployExecutor,
    reporter: OutcomeReporter,
    next_attempt: AtomicU64,
    tasks: TaskTracker,
    interrupt: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<dyn RepoRegistry>,
        credentials: Arc<dyn CredentialStore>,
        executor: DeployExecutor,
        reporter: OutcomeReporter,
    ) -> Self {
        Self {
            registry,
            credentials,
            locks: DeployLockManager::new(),
            executor,
            reporter,
            next_attempt: AtomicU64::new(1),
            tasks: TaskTracker::new(),
            interrupt: CancellationToken::new(),
        }
    }

    pub fn locks(&self) -> &DeployLockManager {
        &self.locks
    }

    /// Admit a webhook delivery.
    ///
    /// Errors are boundary rejections; nothing has been touched when one is
    /// returned.
    pub async fn admit_webhook(
        &self,
        body: &[u8],
        signature_header: Option<&str>,
        event_type: Option<&str>,
    ) -> Result<Admission, DeployHookError> {
        let secret = self
            .credentials
            .webhook_secret()
            .await?
            .filter(|secret| !secret.expose_secret().is_empty())
            .ok_or(DeployHookError::WebhookSecretMissing)?;

        let header = signature_header.ok_or(DeployHookError::SignatureInvalid)?;
        if !signature::verify(body, header, secret.expose_secret().as_bytes()) {
            warn!("Rejected webhook with an invalid signature");
            return Err(DeployHookError::SignatureInvalid);
        }
        drop(secret);

        if let Some(event_type) = event_type {
            if event_type != WORKFLOW_RUN_EVENT {
                info!("Ignoring {} event", event_type);
                return Ok(Admission::Ignored(IgnoreReason::OtherEvent(event_type.to_string())));
            }
        }

        let event = WebhookEvent::decode(body, signature_header)?;
        if let Err(reason) = matcher::filter(&event) {
            info!("Ignoring {}@{}: {}", event.repository_full_name, event.head_branch, reason);
            return Ok(Admission::Ignored(reason));
        }

        let repos = self.registry.list_active().await?;
        let Some(repo) = matcher::match_repo(&event, &repos) else {
            info!(
                "No repository configured for {}@{}",
                event.repository_full_name, event.head_branch
            );
            return Ok(Admission::NoMatch);
        };

        let trigger = Trigger::Webhook {
            head_branch: event.head_branch.clone(),
        };
        Ok(self.admit(repo.clone(), &event.head_branch, trigger).await)
    }

    /// Admit an operator-requested redeploy of one active repository
    pub async fn admit_manual(&self, repo_id: &str) -> Result<Admission, DeployHookError> {
        let repo = self
            .registry
            .get(repo_id)
            .await?
            .filter(|repo| repo.active)
            .ok_or_else(|| DeployHookError::NotFound(format!("active repo {}", repo_id)))?;

        let branch = repo.branch.clone();
        Ok(self.admit(repo, &branch, Trigger::Manual).await)
    }

    async fn admit(&self, repo: RepoConfig, branch: &str, trigger: Trigger) -> Admission {
        let job = DeployJob {
            attempt_id: self.next_attempt.fetch_add(1, Ordering::Relaxed),
            repo_id: repo.id.clone(),
            github_repo: repo.github_repo.clone(),
            container_name: repo.container_name.clone(),
            image: repo.resolved_image(branch),
            trigger,
            started_at: Utc::now(),
        };

        match self.locks.try_acquire(&job.container_name) {
            Acquire::Acquired(lease) => {
                info!(
                    "Deploy #{} admitted: {} -> {} ({:?})",
                    job.attempt_id, job.github_repo, job.container_name, job.trigger
                );
                Admission::Admitted(AdmittedDeploy {
                    job,
                    repo,
                    lease,
                    tracked: self.tasks.token(),
                })
            }
            Acquire::Busy => {
                let outcome = DeployOutcome::Skipped {
                    reason: BUSY_REASON.to_string(),
                };
                self.reporter.report(&job, &outcome).await;
                Admission::Skipped(job)
            }
        }
    }

    /// Run an admitted job to its outcome.
    ///
    /// The outcome is reported and the lease released whatever happens
    /// inside the executor, panics and shutdown interrupts included.
    pub async fn execute(&self, admitted: AdmittedDeploy) -> DeployOutcome {
        let AdmittedDeploy {
            job,
            repo,
            lease,
            tracked,
        } = admitted;

        self.reporter.started(&job).await;

        let mut fsm = DeployFsm::new();
        let result = {
            let run = AssertUnwindSafe(self.executor.execute(&job, &repo, &mut fsm)).catch_unwind();
            tokio::select! {
                result = run => Some(result),
                _ = self.interrupt.cancelled() => None,
            }
        };
        let outcome = match result {
            Some(Ok(outcome)) => outcome,
            Some(Err(panic)) => {
                let message = panic_message(panic.as_ref());
                error!("Deploy #{} panicked: {}", job.attempt_id, message);
                fail(&mut fsm, StageFailure::Panicked(message))
            }
            None => {
                warn!("Deploy #{} of {} interrupted by shutdown", job.attempt_id, job.container_name);
                fail(&mut fsm, StageFailure::Interrupted)
            }
        };

        self.reporter.report(&job, &outcome).await;
        self.locks.release(lease);
        drop(tracked);
        outcome
    }

    /// Turn an admission into the caller's acknowledgment.
    ///
    /// With `run_async` the deploy continues on its own task and the caller
    /// gets `accepted` straight away.
    pub async fn dispatch(self: &Arc<Self>, admission: Admission, run_async: bool) -> Ack {
        match admission {
            Admission::Ignored(reason) => Ack::new(AckStatus::Ignored, None, Some(reason.to_string())),
            Admission::NoMatch => Ack::new(AckStatus::NoMatch, None, None),
            Admission::Skipped(job) => {
                Ack::new(AckStatus::Skipped, Some(job.attempt_id), Some(BUSY_REASON.to_string()))
            }
            Admission::Admitted(admitted) if run_async => {
                let attempt_id = admitted.job.attempt_id;
                let orchestrator = Arc::clone(self);
                tokio::spawn(async move {
                    orchestrator.execute(admitted).await;
                });
                Ack::new(AckStatus::Accepted, Some(attempt_id), None)
            }
            Admission::Admitted(admitted) => {
                let job = admitted.job.clone();
                let outcome = self.execute(admitted).await;
                Ack::finished(&job, &outcome)
            }
        }
    }

    /// Restart or stop one repository's container.
    ///
    /// Takes the same lease as a deploy, so it is skipped while one is in
    /// flight and a deploy cannot start halfway through it.
    pub async fn control(&self, repo_id: &str, action: ContainerAction) -> Result<Ack, DeployHookError> {
        let repo = self
            .registry
            .get(repo_id)
            .await?
            .ok_or_else(|| DeployHookError::NotFound(format!("repo {}", repo_id)))?;

        let lease = match self.locks.try_acquire(&repo.container_name) {
            Acquire::Acquired(lease) => lease,
            Acquire::Busy => {
                info!("Manual {} of {} skipped: {}", action, repo.container_name, BUSY_REASON);
                return Ok(Ack::new(AckStatus::Skipped, None, Some(BUSY_REASON.to_string())));
            }
        };
        let _tracked = self.tasks.token();

        info!("Manual {} of {}", action, repo.container_name);
        let result = tokio::select! {
            result = self.executor.control(&repo.container_name, action) => result,
            _ = self.interrupt.cancelled() => Err(StageFailure::Interrupted),
        };
        self.locks.release(lease);

        Ok(match result {
            Ok(()) => Ack::new(AckStatus::Succeeded, None, None),
            Err(failure) => {
                warn!("Manual {} of {} failed: {}", action, repo.container_name, failure);
                Ack::new(AckStatus::Failed, None, Some(failure.to_string()))
            }
        })
    }

    /// Wait up to `grace` for running jobs, then interrupt the rest.
    ///
    /// Interrupted deploys end `Failed` at the stage they were in and are
    /// reported like any other failure before this returns.
    pub async fn shutdown(&self, grace: Duration) {
        self.tasks.close();
        if self.tasks.is_empty() {
            return;
        }

        info!("Waiting up to {:?} for {} deploy(s) to finish", grace, self.tasks.len());
        if tokio::time::timeout(grace, self.tasks.wait()).await.is_ok() {
            return;
        }

        warn!("Interrupting {} deploy(s) still running", self.tasks.len());
        self.interrupt.cancel();
        self.tasks.wait().await;
    }

    /// Admit and run a webhook delivery inline
    pub async fn handle_webhook(
        self: &Arc<Self>,
        body: &[u8],
        signature_header: Option<&str>,
        event_type: Option<&str>,
    ) -> Result<Ack, DeployHookError> {
        let admission = self.admit_webhook(body, signature_header, event_type).await?;
        Ok(self.dispatch(admission, false).await)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
