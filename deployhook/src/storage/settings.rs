//! Settings file management

use serde::{Deserialize, Serialize};

use crate::errors::DeployHookError;
use crate::filesys::file::File;
use crate::logs::LogLevel;

/// deployhook settings.
///
/// Secret fields are plain strings here; they are only wrapped once handed
/// out by the credential store.
#[derive(Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON log lines
    #[serde(default)]
    pub log_json: bool,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// Path the GitHub webhook posts to
    #[serde(default = "default_webhook_path")]
    pub webhook_path: String,

    /// Acknowledge webhooks before the deploy finishes
    #[serde(default = "default_true")]
    pub run_async: bool,

    /// Container registry login
    #[serde(default)]
    pub registry: RegistrySettings,

    /// HMAC secret shared with GitHub
    #[serde(default)]
    pub webhook_secret: Option<String>,

    /// Discord webhook for deploy notifications
    #[serde(default)]
    pub discord_webhook_url: Option<String>,

    /// Bearer token for the manual deploy endpoint
    #[serde(default)]
    pub api_token: Option<String>,

    /// Executor timeouts and housekeeping
    #[serde(default)]
    pub executor: ExecutorSettings,
}

fn default_true() -> bool {
    true
}

fn default_webhook_path() -> String {
    "/webhook".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            server: ServerSettings::default(),
            webhook_path: default_webhook_path(),
            run_async: true,
            registry: RegistrySettings::default(),
            webhook_secret: None,
            discord_webhook_url: None,
            api_token: None,
            executor: ExecutorSettings::default(),
        }
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "<redacted>");
        f.debug_struct("Settings")
            .field("log_level", &self.log_level)
            .field("log_json", &self.log_json)
            .field("server", &self.server)
            .field("webhook_path", &self.webhook_path)
            .field("run_async", &self.run_async)
            .field("registry", &self.registry)
            .field("webhook_secret", &redact(&self.webhook_secret))
            .field("discord_webhook_url", &redact(&self.discord_webhook_url))
            .field("api_token", &redact(&self.api_token))
            .field("executor", &self.executor)
            .finish()
    }
}

impl Settings {
    /// Load settings; a missing file means all defaults
    pub async fn load(file: &File) -> Result<Self, DeployHookError> {
        file.read_json_or_default().await
    }

    /// Webhook path with a leading slash
    pub fn normalized_webhook_path(&self) -> String {
        let path = self.webhook_path.trim().trim_end_matches('/');
        if path.is_empty() {
            default_webhook_path()
        } else if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        }
    }
}

/// Non-empty settings value, otherwise the environment variable.
///
/// The settings file wins so an operator can override a container env var
/// without restarting.
pub fn setting_or_env(value: Option<&str>, var: &str) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| {
            std::env::var(var)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        })
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Registry login settings
#[derive(Clone, Serialize, Deserialize)]
pub struct RegistrySettings {
    /// Registry the credentials belong to
    #[serde(default = "default_registry_host")]
    pub host: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub token: Option<String>,
}

fn default_registry_host() -> String {
    "ghcr.io".to_string()
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            host: default_registry_host(),
            username: None,
            token: None,
        }
    }
}

impl std::fmt::Debug for RegistrySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrySettings")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Executor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorSettings {
    #[serde(default = "default_stage_timeout")]
    pub stage_timeout_secs: u64,

    #[serde(default = "default_pull_timeout")]
    pub pull_timeout_secs: u64,

    #[serde(default = "default_true")]
    pub prune_images: bool,
}

fn default_stage_timeout() -> u64 {
    120
}

fn default_pull_timeout() -> u64 {
    600
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            stage_timeout_secs: default_stage_timeout(),
            pull_timeout_secs: default_pull_timeout(),
            prune_images: true,
        }
    }
}
