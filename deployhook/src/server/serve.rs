//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::errors::DeployHookError;
use crate::server::handlers::{
    deploy_handler, health_handler, restart_handler, stop_handler, version_handler, webhook_handler,
};
use crate::server::state::ServerState;

/// Build the router; `webhook_path` must start with `/`
pub fn router(webhook_path: &str, state: Arc<ServerState>) -> Router {
    Router::new()
        // Health and version
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        // Deploy triggers
        .route(webhook_path, post(webhook_handler))
        // Operator controls, bearer token
        .route("/repos/{id}/deploy", post(deploy_handler))
        .route("/repos/{id}/restart", post(restart_handler))
        .route("/repos/{id}/stop", post(stop_handler))
        // State and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server
pub async fn serve(
    options: &ServerOptions,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), DeployHookError>>, DeployHookError> {
    let app = router(&options.webhook_path, state);

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting HTTP server on {} (webhook at {})", addr, options.webhook_path);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| DeployHookError::ServerError(e.to_string()))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| DeployHookError::ServerError(e.to_string()))
    });

    Ok(handle)
}
