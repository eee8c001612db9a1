//! Docker CLI container runtime

use std::process::Stdio;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::deploy::runtime::{ContainerRuntime, Removal, RunSpec, RuntimeError};

/// Drives the `docker` binary.
///
/// Children are killed when their future is dropped, so an executor timeout
/// does not leave a stray `docker pull` behind.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
}

impl DockerCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    async fn exec(&self, label: &str, args: &[&str]) -> Result<String, RuntimeError> {
        debug!("Running docker {}", label);
        let output = self
            .command(args)
            .output()
            .await
            .map_err(|e| RuntimeError::Spawn {
                command: format!("docker {}", label),
                detail: e.to_string(),
            })?;

        check_output(label, output)
    }

    /// Stop/rm share the same "not found" handling
    async fn exec_removal(&self, label: &str, args: &[&str]) -> Result<Removal, RuntimeError> {
        match self.exec(label, args).await {
            Ok(_) => Ok(Removal::Done),
            Err(RuntimeError::Command { ref detail, .. }) if is_no_such_container(detail) => {
                Ok(Removal::NotFound)
            }
            Err(e) => Err(e),
        }
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

fn check_output(label: &str, output: std::process::Output) -> Result<String, RuntimeError> {
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if output.status.success() {
        return Ok(stdout);
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let detail = if !stderr.is_empty() {
        stderr
    } else if !stdout.is_empty() {
        stdout
    } else {
        "no output".to_string()
    };

    Err(RuntimeError::Command {
        command: format!("docker {}", label),
        code: output.status.code(),
        detail,
    })
}

fn is_no_such_container(detail: &str) -> bool {
    detail.contains("No such container")
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn login(
        &self,
        registry_host: &str,
        username: &str,
        secret: &SecretString,
    ) -> Result<(), RuntimeError> {
        debug!("Logging in to {} as {}", registry_host, username);
        let label = format!("login {}", registry_host);

        let spawn_err = |e: std::io::Error| RuntimeError::Spawn {
            command: format!("docker {}", label),
            detail: e.to_string(),
        };

        // the token only ever travels over stdin
        let mut child = Command::new(&self.binary)
            .args(["login", registry_host, "-u", username, "--password-stdin"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_err)?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(secret.expose_secret().as_bytes())
                .await
                .map_err(spawn_err)?;
        }

        let output = child.wait_with_output().await.map_err(spawn_err)?;
        check_output(&label, output).map(|_| ())
    }

    async fn pull(&self, image: &str) -> Result<(), RuntimeError> {
        self.exec("pull", &["pull", image]).await.map(|_| ())
    }

    async fn stop(&self, container_name: &str) -> Result<Removal, RuntimeError> {
        self.exec_removal("stop", &["stop", container_name]).await
    }

    async fn remove(&self, container_name: &str) -> Result<Removal, RuntimeError> {
        self.exec_removal("rm", &["rm", "-f", container_name]).await
    }

    async fn run(&self, spec: &RunSpec) -> Result<(), RuntimeError> {
        let args = spec.docker_args();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let container_id = self.exec("run", &args).await?;
        debug!("Started container {} ({})", spec.container_name, container_id);
        Ok(())
    }

    async fn restart(&self, container_name: &str) -> Result<(), RuntimeError> {
        self.exec("restart", &["restart", container_name]).await.map(|_| ())
    }

    async fn prune_dangling_images(&self) -> Result<(), RuntimeError> {
        self.exec("image prune", &["image", "prune", "-f"]).await.map(|_| ())
    }
}
