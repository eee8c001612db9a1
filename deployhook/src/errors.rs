//! Error types for deployhook

use thiserror::Error;

use crate::deploy::runtime::RuntimeError;

/// Main error type for deployhook
#[derive(Error, Debug)]
pub enum DeployHookError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Webhook signature is invalid")]
    SignatureInvalid,

    #[error("Webhook payload rejected: {0}")]
    InvalidPayload(String),

    #[error("Webhook secret is not configured; rejecting all webhooks")]
    WebhookSecretMissing,

    #[error("Registry error: {0}")]
    RegistryError(String),

    #[error("Notify error: {0}")]
    NotifyError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for DeployHookError {
    fn from(err: anyhow::Error) -> Self {
        DeployHookError::Internal(err.to_string())
    }
}

/// Why a single executor stage gave up.
///
/// The `Display` text becomes the reason carried by a failed outcome, so it
/// must never include secret material.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageFailure {
    #[error("auth: {0}")]
    Auth(String),

    #[error("pull failed: {0}")]
    Pull(RuntimeError),

    #[error("stop failed: {0}")]
    Stop(RuntimeError),

    #[error("remove failed: {0}")]
    Remove(RuntimeError),

    #[error("run failed: {0}")]
    Run(RuntimeError),

    #[error("restart failed: {0}")]
    Restart(RuntimeError),

    #[error("env file: {0}")]
    EnvFile(String),

    #[error("invalid extra flag {0:?}: unbalanced quote or trailing escape")]
    InvalidFlag(String),

    #[error("interrupted by shutdown")]
    Interrupted,

    #[error("{operation} timed out after {limit:?}")]
    Timeout {
        operation: &'static str,
        limit: std::time::Duration,
    },

    #[error("executor panicked: {0}")]
    Panicked(String),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),
}
