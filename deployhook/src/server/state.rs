//! Server state

use std::sync::Arc;

use crate::credentials::CredentialStore;
use crate::deploy::orchestrator::Orchestrator;

/// Server state shared across handlers
pub struct ServerState {
    pub orchestrator: Arc<Orchestrator>,
    pub credentials: Arc<dyn CredentialStore>,

    /// Acknowledge before the deploy finishes
    pub run_async: bool,
}

impl ServerState {
    pub fn new(orchestrator: Arc<Orchestrator>, credentials: Arc<dyn CredentialStore>, run_async: bool) -> Self {
        Self {
            orchestrator,
            credentials,
            run_async,
        }
    }
}
