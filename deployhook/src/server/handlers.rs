//! HTTP request handlers

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use secrecy::ExposeSecret;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{error, warn};

use crate::credentials::MISSING_SECRET_MESSAGE;
use crate::deploy::orchestrator::{Ack, AckStatus};
use crate::errors::DeployHookError;
use crate::models::deployment::ContainerAction;
use crate::server::state::ServerState;
use crate::utils::version_info;
use crate::webhook::payload::EVENT_HEADER;
use crate::webhook::signature::SIGNATURE_HEADER;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "deployhook".to_string(),
        version: version.version,
    })
}

/// Version response
#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

/// Error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// GitHub webhook handler.
///
/// Anything that passes signature verification is acknowledged, whatever
/// becomes of the deploy.
pub async fn webhook_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = header_str(&headers, SIGNATURE_HEADER);
    let event_type = header_str(&headers, EVENT_HEADER);

    match state
        .orchestrator
        .admit_webhook(&body, signature, event_type)
        .await
    {
        Ok(admission) => ack_response(state.orchestrator.dispatch(admission, state.run_async).await),
        Err(e) => error_response(e),
    }
}

/// Manual redeploy of one repository
pub async fn deploy_handler(
    State(state): State<Arc<ServerState>>,
    Path(repo_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = authorize(&state, &headers, "deploy", &repo_id).await {
        return response;
    }

    match state.orchestrator.admit_manual(&repo_id).await {
        Ok(admission) => ack_response(state.orchestrator.dispatch(admission, state.run_async).await),
        Err(e) => error_response(e),
    }
}

/// Restart a repository's container without pulling
pub async fn restart_handler(
    State(state): State<Arc<ServerState>>,
    Path(repo_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    control(state, repo_id, headers, ContainerAction::Restart).await
}

/// Stop and remove a repository's container
pub async fn stop_handler(
    State(state): State<Arc<ServerState>>,
    Path(repo_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    control(state, repo_id, headers, ContainerAction::Stop).await
}

async fn control(state: Arc<ServerState>, repo_id: String, headers: HeaderMap, action: ContainerAction) -> Response {
    if let Err(response) = authorize(&state, &headers, &action.to_string(), &repo_id).await {
        return response;
    }

    match state.orchestrator.control(&repo_id, action).await {
        Ok(ack) => ack_response(ack),
        Err(e) => error_response(e),
    }
}

/// Bearer check for the operator endpoints, which do not exist without a
/// configured token
async fn authorize(state: &ServerState, headers: &HeaderMap, action: &str, repo_id: &str) -> Result<(), Response> {
    let expected = match state.credentials.api_token().await {
        Ok(Some(token)) => token,
        Ok(None) => return Err(StatusCode::NOT_FOUND.into_response()),
        Err(e) => return Err(error_response(e)),
    };

    let presented = header_str(headers, header::AUTHORIZATION.as_str())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);
    if !presented.is_some_and(|token| token_matches(token, expected.expose_secret())) {
        warn!("Rejected manual {} of {}: bad bearer token", action, repo_id);
        return Err(StatusCode::UNAUTHORIZED.into_response());
    }
    Ok(())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Compare digests so the check does not short-circuit on the token bytes
fn token_matches(presented: &str, expected: &str) -> bool {
    Sha256::digest(presented.as_bytes()) == Sha256::digest(expected.as_bytes())
}

fn ack_response(ack: Ack) -> Response {
    let status = match ack.status {
        AckStatus::Accepted => StatusCode::ACCEPTED,
        _ => StatusCode::OK,
    };
    (status, Json(ack)).into_response()
}

fn error_response(err: DeployHookError) -> Response {
    let status = match &err {
        DeployHookError::SignatureInvalid => StatusCode::UNAUTHORIZED,
        DeployHookError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
        DeployHookError::WebhookSecretMissing => {
            error!("{}", MISSING_SECRET_MESSAGE);
            StatusCode::SERVICE_UNAVAILABLE
        }
        DeployHookError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => {
            error!("Request failed: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(ErrorResponse { error: err.to_string() })).into_response()
}
