//! Container runtime gateway contract

use std::path::PathBuf;

use async_trait::async_trait;
use secrecy::SecretString;
use thiserror::Error;

/// Restart policy applied to every container deployhook starts
pub const RESTART_POLICY: &str = "unless-stopped";

/// Error reported by a container runtime call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// The runtime binary could not be spawned at all
    #[error("failed to spawn {command}: {detail}")]
    Spawn { command: String, detail: String },

    /// The command ran and exited unsuccessfully
    #[error("{command} exited with {code:?}: {detail}")]
    Command {
        command: String,
        code: Option<i32>,
        detail: String,
    },
}

/// Result of a stop or remove call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// The container existed and the operation went through
    Done,

    /// There was no such container; nothing to do
    NotFound,
}

/// Everything needed to launch the replacement container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSpec {
    pub container_name: String,
    pub image: String,
    pub ports: Vec<String>,
    pub volumes: Vec<String>,
    pub env_file: Option<PathBuf>,

    /// Already split, appended verbatim before the image
    pub extra_args: Vec<String>,
    pub restart_policy: String,
}

impl RunSpec {
    /// Arguments for `docker run`, in the order the CLI expects them
    pub fn docker_args(&self) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            self.container_name.clone(),
            "--restart".to_string(),
            self.restart_policy.clone(),
        ];

        for port in &self.ports {
            args.push("-p".to_string());
            args.push(port.clone());
        }

        for volume in &self.volumes {
            args.push("-v".to_string());
            args.push(volume.clone());
        }

        if let Some(env_file) = &self.env_file {
            args.push("--env-file".to_string());
            args.push(env_file.display().to_string());
        }

        args.extend(self.extra_args.iter().cloned());

        // image goes last, everything after it would be passed to the entrypoint
        args.push(self.image.clone());
        args
    }
}

/// Operations deployhook needs from a container runtime.
///
/// Implementations must not log secret arguments.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn login(
        &self,
        registry_host: &str,
        username: &str,
        secret: &SecretString,
    ) -> Result<(), RuntimeError>;

    async fn pull(&self, image: &str) -> Result<(), RuntimeError>;

    async fn stop(&self, container_name: &str) -> Result<Removal, RuntimeError>;

    async fn remove(&self, container_name: &str) -> Result<Removal, RuntimeError>;

    async fn run(&self, spec: &RunSpec) -> Result<(), RuntimeError>;

    /// Restart an existing container in place, keeping its image
    async fn restart(&self, container_name: &str) -> Result<(), RuntimeError>;

    /// Housekeeping only; callers treat failures as warnings
    async fn prune_dangling_images(&self) -> Result<(), RuntimeError>;
}
