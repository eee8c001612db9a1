//! Credential store

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::warn;

use crate::errors::DeployHookError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;
use crate::storage::settings::{setting_or_env, Settings};

pub const ENV_WEBHOOK_SECRET: &str = "GITHUB_WEBHOOK_SECRET";
pub const ENV_REGISTRY_USERNAME: &str = "GHCR_USERNAME";
pub const ENV_REGISTRY_TOKEN: &str = "GHCR_PAT";
pub const ENV_DISCORD_WEBHOOK_URL: &str = "DISCORD_WEBHOOK_URL";
pub const ENV_API_TOKEN: &str = "DEPLOYHOOK_API_TOKEN";

/// Login for one container registry
#[derive(Debug)]
pub struct RegistryCredentials {
    pub host: String,
    pub username: String,
    pub secret: SecretString,
}

/// Source of secrets.
///
/// Every call returns fresh values; callers drop them once the stage that
/// needed them is over.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn registry_credentials(&self) -> Result<Option<RegistryCredentials>, DeployHookError>;

    async fn webhook_secret(&self) -> Result<Option<SecretString>, DeployHookError>;

    /// Where deploy notifications are posted
    async fn notification_url(&self) -> Result<Option<SecretString>, DeployHookError>;

    /// Bearer token guarding the manual deploy endpoint
    async fn api_token(&self) -> Result<Option<SecretString>, DeployHookError>;

    /// Decrypted env blob for a repository, `None` if it does not exist
    async fn env_content(&self, env_ref: &str) -> Result<Option<SecretString>, DeployHookError>;
}

/// Logged whenever webhooks cannot be verified for lack of a secret
pub const MISSING_SECRET_MESSAGE: &str =
    "No webhook secret configured (settings `webhook_secret` or GITHUB_WEBHOOK_SECRET); every webhook is rejected with 503";

/// Whether a non-empty webhook secret currently resolves
pub async fn has_webhook_secret(store: &dyn CredentialStore) -> Result<bool, DeployHookError> {
    Ok(store
        .webhook_secret()
        .await?
        .is_some_and(|secret| !secret.expose_secret().is_empty()))
}

/// Credentials read from the settings file, falling back to the process
/// environment; env blobs live as `<ref>.env` in the secrets directory.
pub struct SettingsCredentialStore {
    settings_file: File,
    secrets_dir: Dir,
}

impl SettingsCredentialStore {
    pub fn new(settings_file: File, secrets_dir: Dir) -> Self {
        Self {
            settings_file,
            secrets_dir,
        }
    }

    async fn settings(&self) -> Result<Settings, DeployHookError> {
        Settings::load(&self.settings_file).await
    }
}

#[async_trait]
impl CredentialStore for SettingsCredentialStore {
    async fn registry_credentials(&self) -> Result<Option<RegistryCredentials>, DeployHookError> {
        let settings = self.settings().await?;
        let username = setting_or_env(settings.registry.username.as_deref(), ENV_REGISTRY_USERNAME);
        let token = setting_or_env(settings.registry.token.as_deref(), ENV_REGISTRY_TOKEN);

        match (username, token) {
            (Some(username), Some(token)) => Ok(Some(RegistryCredentials {
                host: settings.registry.host,
                username,
                secret: SecretString::from(token),
            })),
            (Some(_), None) | (None, Some(_)) => {
                warn!("Registry credentials are only half configured; ignoring them");
                Ok(None)
            }
            (None, None) => Ok(None),
        }
    }

    async fn webhook_secret(&self) -> Result<Option<SecretString>, DeployHookError> {
        let settings = self.settings().await?;
        Ok(setting_or_env(settings.webhook_secret.as_deref(), ENV_WEBHOOK_SECRET).map(SecretString::from))
    }

    async fn notification_url(&self) -> Result<Option<SecretString>, DeployHookError> {
        let settings = self.settings().await?;
        Ok(
            setting_or_env(settings.discord_webhook_url.as_deref(), ENV_DISCORD_WEBHOOK_URL)
                .map(SecretString::from),
        )
    }

    async fn api_token(&self) -> Result<Option<SecretString>, DeployHookError> {
        let settings = self.settings().await?;
        Ok(setting_or_env(settings.api_token.as_deref(), ENV_API_TOKEN).map(SecretString::from))
    }

    async fn env_content(&self, env_ref: &str) -> Result<Option<SecretString>, DeployHookError> {
        let file = self.secrets_dir.file(&format!("{}.env", env_ref))?;
        Ok(file.read_string_opt().await?.map(SecretString::from))
    }
}
