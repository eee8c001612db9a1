//! Deploy notifications

pub mod discord;

use async_trait::async_trait;

use crate::errors::DeployHookError;
use crate::models::deployment::NotifyEvent;

/// Delivers deploy notifications.
///
/// Failures are reported to the caller, which logs and drops them.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &NotifyEvent) -> Result<(), DeployHookError>;
}
