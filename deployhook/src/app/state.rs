//! Application state management

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::app::options::AppOptions;
use crate::credentials::{has_webhook_secret, CredentialStore, SettingsCredentialStore, MISSING_SECRET_MESSAGE};
use crate::deploy::docker::DockerCli;
use crate::deploy::executor::DeployExecutor;
use crate::deploy::orchestrator::Orchestrator;
use crate::deploy::reporter::OutcomeReporter;
use crate::errors::DeployHookError;
use crate::notify::discord::DiscordNotifier;
use crate::registry::{JsonFileRegistry, RepoRegistry};

/// Main application state
pub struct AppState {
    /// Repository registry
    pub registry: Arc<dyn RepoRegistry>,

    /// Secrets and env blobs
    pub credentials: Arc<dyn CredentialStore>,

    /// Webhook to deploy pipeline
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    /// Initialize application state
    pub async fn init(options: &AppOptions) -> Result<Self, DeployHookError> {
        info!("Initializing application state...");

        let layout = &options.layout;
        layout.setup().await?;

        // env files left behind by a crash mid-deploy
        let run_dir = layout.run_dir();
        match run_dir.clear_files().await {
            Ok(0) => {}
            Ok(n) => warn!("Removed {} stale env file(s) from {}", n, run_dir.path().display()),
            Err(e) => warn!("Failed to clean {}: {}", run_dir.path().display(), e),
        }

        let registry: Arc<dyn RepoRegistry> = Arc::new(JsonFileRegistry::new(layout.repos_file()));
        let credentials: Arc<dyn CredentialStore> = Arc::new(SettingsCredentialStore::new(
            layout.settings_file(),
            layout.secrets_dir(),
        ));
        match has_webhook_secret(credentials.as_ref()).await {
            Ok(true) => {}
            Ok(false) => warn!("{}", MISSING_SECRET_MESSAGE),
            Err(e) => warn!("Could not resolve the webhook secret: {}", e),
        }

        let notifier = Arc::new(DiscordNotifier::new(credentials.clone())?);

        let executor = DeployExecutor::new(
            Arc::new(DockerCli::new(options.docker_binary.clone())),
            credentials.clone(),
            options.fsm_settings.clone(),
            run_dir,
        );
        let reporter = OutcomeReporter::new(registry.clone(), notifier);
        let orchestrator = Arc::new(Orchestrator::new(
            registry.clone(),
            credentials.clone(),
            executor,
            reporter,
        ));

        Ok(Self {
            registry,
            credentials,
            orchestrator,
        })
    }

    /// Shutdown application state, draining running deploys within `grace`
    pub async fn shutdown(&self, grace: Duration) -> Result<(), DeployHookError> {
        info!("Shutting down application state...");
        self.orchestrator.shutdown(grace).await;
        Ok(())
    }
}
