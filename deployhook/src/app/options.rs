//! Application configuration options

use std::time::Duration;

use crate::deploy::fsm::FsmSettings;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::Settings;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Storage layout paths
    pub layout: StorageLayout,

    /// Server configuration
    pub server: ServerOptions,

    /// Acknowledge webhooks before the deploy finishes
    pub run_async: bool,

    /// Docker CLI binary
    pub docker_binary: String,

    /// Executor timeouts and housekeeping
    pub fsm_settings: FsmSettings,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            layout: StorageLayout::default(),
            server: ServerOptions::default(),
            run_async: true,
            docker_binary: "docker".to_string(),
            fsm_settings: FsmSettings::default(),
        }
    }
}

impl AppOptions {
    /// Options for `layout` as configured by its settings file
    pub fn from_settings(layout: StorageLayout, settings: &Settings) -> Self {
        Self {
            layout,
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
                webhook_path: settings.normalized_webhook_path(),
            },
            run_async: settings.run_async,
            fsm_settings: FsmSettings {
                stage_timeout: Duration::from_secs(settings.executor.stage_timeout_secs),
                pull_timeout: Duration::from_secs(settings.executor.pull_timeout_secs),
                prune_images: settings.executor.prune_images,
            },
            ..Default::default()
        }
    }
}

/// Lifecycle options
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,

    /// How long running deploys may finish before they are interrupted;
    /// must leave room within `max_shutdown_delay` to report them
    pub deploy_grace: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
            deploy_grace: Duration::from_secs(20),
        }
    }
}

/// HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Path the webhook is served on
    pub webhook_path: String,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            webhook_path: "/webhook".to_string(),
        }
    }
}
