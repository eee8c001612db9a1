//! deployhook - Entry Point
//!
//! Receives GitHub `workflow_run` webhooks and redeploys the matching Docker
//! container.

use std::collections::HashMap;
use std::env;

use deployhook::app::options::AppOptions;
use deployhook::app::run::run;
use deployhook::credentials::{has_webhook_secret, SettingsCredentialStore, MISSING_SECRET_MESSAGE};
use deployhook::errors::DeployHookError;
use deployhook::logs::{init_logging, LogOptions};
use deployhook::registry::{JsonFileRegistry, RepoRegistry};
use deployhook::storage::layout::StorageLayout;
use deployhook::storage::settings::Settings;
use deployhook::utils::version_info;

use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{}", json),
            Err(_) => println!("{}", version.version),
        }
        return;
    }

    let layout = match cli_args.get("data-dir") {
        Some(dir) => StorageLayout::new(dir),
        None => StorageLayout::default(),
    };

    // Retrieve the settings file
    let settings = match Settings::load(&layout.settings_file()).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Unable to read settings file: {e}");
            std::process::exit(1);
        }
    };

    if cli_args.contains_key("check-config") {
        if let Err(e) = check_config(&layout, &settings).await {
            eprintln!("Configuration is invalid: {e}");
            std::process::exit(1);
        }
        return;
    }

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level,
        json_format: settings.log_json,
    };
    if let Err(e) = init_logging(log_options) {
        println!("Failed to initialize logging: {e}");
    }

    let options = AppOptions::from_settings(layout, &settings);

    info!(
        "Running deployhook {} ({}) with options: {:?}",
        version.version, version.git_hash, options
    );
    if let Err(e) = run(options, await_shutdown_signal()).await {
        error!("Failed to run deployhook: {e}");
        std::process::exit(1);
    }
}

/// Print the effective configuration, secrets redacted
async fn check_config(layout: &StorageLayout, settings: &Settings) -> Result<(), DeployHookError> {
    println!("{:#?}", settings);

    let credentials = SettingsCredentialStore::new(layout.settings_file(), layout.secrets_dir());
    if !has_webhook_secret(&credentials).await? {
        println!("WARNING: {}", MISSING_SECRET_MESSAGE);
    }

    let registry = JsonFileRegistry::new(layout.repos_file());
    let repos = registry.list_active().await?;
    println!("{} active repositor(ies) in {}", repos.len(), layout.repos_file().path().display());
    for repo in &repos {
        println!(
            "  {} -> {}@{} => {} ({})",
            repo.id, repo.github_repo, repo.branch, repo.container_name, repo.image
        );
    }
    Ok(())
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) = match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            _ => {
                error!("Failed to install signal handlers, falling back to Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Ctrl+C received, shutting down...");
    }
}
