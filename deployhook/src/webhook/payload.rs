//! Strict decoding of `workflow_run` webhook payloads

use serde::Deserialize;

use crate::errors::DeployHookError;

/// Header GitHub carries the event name in
pub const EVENT_HEADER: &str = "x-github-event";

/// The only event type deployhook acts on
pub const WORKFLOW_RUN_EVENT: &str = "workflow_run";

#[derive(Debug, Deserialize)]
struct RawPayload {
    action: String,
    workflow_run: RawWorkflowRun,
    repository: RawRepository,
}

#[derive(Debug, Deserialize)]
struct RawWorkflowRun {
    /// GitHub sends `null` until the run completes
    conclusion: Option<String>,
    head_branch: String,
}

#[derive(Debug, Deserialize)]
struct RawRepository {
    full_name: String,
}

/// A decoded workflow run notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    pub action: String,
    pub conclusion: Option<String>,
    pub repository_full_name: String,
    pub head_branch: String,

    /// Raw `X-Hub-Signature-256` value
    pub signature: Option<String>,

    /// Raw request body, as signed
    pub body: Vec<u8>,
}

impl WebhookEvent {
    /// Decode a request body; missing required fields are an error, never
    /// defaulted.
    pub fn decode(body: &[u8], signature: Option<&str>) -> Result<Self, DeployHookError> {
        let raw: RawPayload = serde_json::from_slice(body)
            .map_err(|e| DeployHookError::InvalidPayload(e.to_string()))?;

        Ok(Self {
            action: raw.action,
            conclusion: raw.workflow_run.conclusion,
            repository_full_name: raw.repository.full_name,
            head_branch: raw.workflow_run.head_branch,
            signature: signature.map(str::to_string),
            body: body.to_vec(),
        })
    }
}
