//! Deploy executor: pull, stop, remove, run

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use tracing::{debug, error, info, warn};

use crate::credentials::CredentialStore;
use crate::deploy::fsm::{DeployEvent, DeployFsm, FsmSettings, Stage};
use crate::deploy::runtime::{ContainerRuntime, Removal, RunSpec, RESTART_POLICY};
use crate::errors::StageFailure;
use crate::filesys::dir::Dir;
use crate::models::deployment::{ContainerAction, DeployJob, DeployOutcome};
use crate::models::repo::RepoConfig;
use crate::utils::{parse_env_file, registry_host, split_flag_lines};

/// Runs one deploy job against the container runtime
pub struct DeployExecutor {
    runtime: Arc<dyn ContainerRuntime>,
    credentials: Arc<dyn CredentialStore>,
    settings: FsmSettings,
    run_dir: Dir,
}

impl DeployExecutor {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        credentials: Arc<dyn CredentialStore>,
        settings: FsmSettings,
        run_dir: Dir,
    ) -> Self {
        Self {
            runtime,
            credentials,
            settings,
            run_dir,
        }
    }

    /// Drive `fsm` to a terminal state.
    ///
    /// Every stage runs exactly once; nothing is retried.
    pub async fn execute(&self, job: &DeployJob, repo: &RepoConfig, fsm: &mut DeployFsm) -> DeployOutcome {
        match self.drive(job, repo, fsm).await {
            Ok(()) => {
                info!(
                    "Deploy #{} of {} succeeded ({})",
                    job.attempt_id, job.container_name, job.image
                );
                DeployOutcome::Succeeded
            }
            Err(failure) => fail(fsm, failure),
        }
    }

    async fn drive(&self, job: &DeployJob, repo: &RepoConfig, fsm: &mut DeployFsm) -> Result<(), StageFailure> {
        // flags are checked before the old container is touched
        let extra_args = split_flag_lines(&repo.extra_flags).map_err(StageFailure::InvalidFlag)?;

        advance(fsm, DeployEvent::Begin)?;
        self.login(&job.image).await?;
        self.pull(&job.image).await?;

        advance(fsm, DeployEvent::Pulled)?;
        self.stop_container(&job.container_name).await?;

        advance(fsm, DeployEvent::Stopped)?;
        self.remove_container(&job.container_name).await?;

        advance(fsm, DeployEvent::Removed)?;
        self.start(job, repo, extra_args).await?;

        advance(fsm, DeployEvent::Started)?;
        self.prune().await;
        Ok(())
    }

    /// Restart or tear down a container, with the same per-call timeout as a
    /// deploy stage
    pub async fn control(&self, container_name: &str, action: ContainerAction) -> Result<(), StageFailure> {
        match action {
            ContainerAction::Restart => {
                self.bounded("docker restart", self.settings.stage_timeout, async {
                    self.runtime.restart(container_name).await.map_err(StageFailure::Restart)
                })
                .await
            }
            ContainerAction::Stop => {
                self.stop_container(container_name).await?;
                self.remove_container(container_name).await
            }
        }
    }

    async fn stop_container(&self, container_name: &str) -> Result<(), StageFailure> {
        let stopped = self
            .bounded("docker stop", self.settings.stage_timeout, async {
                self.runtime.stop(container_name).await.map_err(StageFailure::Stop)
            })
            .await?;
        if stopped == Removal::NotFound {
            debug!("Container {} was not running", container_name);
        }
        Ok(())
    }

    async fn remove_container(&self, container_name: &str) -> Result<(), StageFailure> {
        let removed = self
            .bounded("docker rm", self.settings.stage_timeout, async {
                self.runtime.remove(container_name).await.map_err(StageFailure::Remove)
            })
            .await?;
        if removed == Removal::NotFound {
            debug!("Container {} did not exist", container_name);
        }
        Ok(())
    }

    /// Log in when credentials exist for the image's registry
    async fn login(&self, image: &str) -> Result<(), StageFailure> {
        let host = registry_host(image);
        let credentials = self
            .credentials
            .registry_credentials()
            .await
            .map_err(|e| StageFailure::Auth(e.to_string()))?;

        let Some(credentials) = credentials.filter(|c| c.host == host) else {
            debug!("No registry credentials for {}, pulling anonymously", host);
            return Ok(());
        };

        self.bounded("docker login", self.settings.stage_timeout, async {
            self.runtime
                .login(host, &credentials.username, &credentials.secret)
                .await
                .map_err(|e| StageFailure::Auth(e.to_string()))
        })
        .await
    }

    async fn pull(&self, image: &str) -> Result<(), StageFailure> {
        info!("Pulling {}", image);
        self.bounded("docker pull", self.settings.pull_timeout, async {
            self.runtime.pull(image).await.map_err(StageFailure::Pull)
        })
        .await
    }

    async fn start(&self, job: &DeployJob, repo: &RepoConfig, extra_args: Vec<String>) -> Result<(), StageFailure> {
        let env_file = self.materialize_env(job, repo).await?;

        let spec = RunSpec {
            container_name: job.container_name.clone(),
            image: job.image.clone(),
            ports: repo.ports.clone(),
            volumes: repo.volumes.clone(),
            env_file: env_file.as_ref().map(|f| f.path.clone()),
            extra_args,
            restart_policy: RESTART_POLICY.to_string(),
        };

        let result = self
            .bounded("docker run", self.settings.stage_timeout, async {
                self.runtime.run(&spec).await.map_err(StageFailure::Run)
            })
            .await;

        // the env file only has to outlive `docker run`
        drop(env_file);
        result
    }

    /// Write the repo's env blob to a private file for `docker run --env-file`
    async fn materialize_env(&self, job: &DeployJob, repo: &RepoConfig) -> Result<Option<EnvFile>, StageFailure> {
        let Some(env_ref) = repo.env_file_ref.as_deref() else {
            return Ok(None);
        };

        let content = self
            .credentials
            .env_content(env_ref)
            .await
            .map_err(|e| StageFailure::EnvFile(e.to_string()))?;

        let Some(content) = content else {
            warn!(
                "Env blob {} for {} does not exist, starting without it",
                env_ref, job.container_name
            );
            return Ok(None);
        };

        let normalized: String = parse_env_file(content.expose_secret())
            .into_iter()
            .map(|(key, value)| format!("{}={}\n", key, value))
            .collect();

        let name = format!("{}-{}.env", job.container_name, uuid::Uuid::new_v4());
        let file = self
            .run_dir
            .file(&name)
            .map_err(|e| StageFailure::EnvFile(e.to_string()))?;
        let guard = EnvFile {
            path: file.path().to_path_buf(),
        };
        file.write_private(normalized.as_bytes())
            .await
            .map_err(|e| StageFailure::EnvFile(e.to_string()))?;

        Ok(Some(guard))
    }

    async fn prune(&self) {
        if !self.settings.prune_images {
            return;
        }
        let result = self
            .bounded("docker image prune", self.settings.stage_timeout, async {
                self.runtime
                    .prune_dangling_images()
                    .await
                    .map_err(StageFailure::Run)
            })
            .await;
        if let Err(e) = result {
            warn!("Image prune failed (ignored): {}", e);
        }
    }

    async fn bounded<T, F>(&self, operation: &'static str, limit: Duration, fut: F) -> Result<T, StageFailure>
    where
        F: Future<Output = Result<T, StageFailure>>,
    {
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(StageFailure::Timeout { operation, limit }),
        }
    }
}

fn advance(fsm: &mut DeployFsm, event: DeployEvent) -> Result<(), StageFailure> {
    fsm.process(event).map_err(StageFailure::InvalidTransition)
}

/// Move `fsm` into `Failed` and build the matching outcome
pub fn fail(fsm: &mut DeployFsm, failure: StageFailure) -> DeployOutcome {
    let reason = failure.to_string();
    let stage = fsm.stage().unwrap_or(Stage::Pending);
    if let Err(e) = fsm.process(DeployEvent::Fail(reason.clone())) {
        error!("Could not record deploy failure: {}", e);
    }
    DeployOutcome::Failed { stage, reason }
}

/// A materialized env file, deleted on drop
#[derive(Debug)]
struct EnvFile {
    path: PathBuf,
}

impl Drop for EnvFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove env file {}: {}", self.path.display(), e);
            }
        }
    }
}
