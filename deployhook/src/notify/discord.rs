//! Discord webhook notifier

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde_json::{json, Value};
use tracing::debug;

use crate::credentials::CredentialStore;
use crate::errors::DeployHookError;
use crate::models::deployment::{NotifyEvent, NotifyKind};
use crate::notify::Notifier;

const COLOUR_OK: u32 = 0x00a0f0;
const COLOUR_FAIL: u32 = 0xf85149;
const COLOUR_INFO: u32 = 0x58a6ff;
const COLOUR_DOWN: u32 = 0xb31d28;

/// Discord rejects field values over 1024 chars
const MAX_ERROR_CHARS: usize = 900;

/// Posts embeds to a Discord webhook; a no-op while no URL is configured
pub struct DiscordNotifier {
    client: Client,
    credentials: Arc<dyn CredentialStore>,
}

impl DiscordNotifier {
    pub fn new(credentials: Arc<dyn CredentialStore>) -> Result<Self, DeployHookError> {
        let client = Client::builder().timeout(Duration::from_secs(5)).build()?;
        Ok(Self { client, credentials })
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn notify(&self, event: &NotifyEvent) -> Result<(), DeployHookError> {
        let Some(url) = self.credentials.notification_url().await? else {
            debug!("No notification URL configured, dropping {:?} notification", event.kind);
            return Ok(());
        };

        let response = self
            .client
            .post(url.expose_secret())
            .json(&json!({ "embeds": [embed(event)] }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DeployHookError::NotifyError(format!("{}: {}", status, body)));
        }
        Ok(())
    }
}

/// Render one Discord embed object
pub fn embed(event: &NotifyEvent) -> Value {
    let (title, colour) = match event.kind {
        NotifyKind::Start => (format!("⏳ Deploying `{}`", event.container_name), COLOUR_INFO),
        NotifyKind::Success => (format!("✅ Deployed `{}`", event.container_name), COLOUR_OK),
        NotifyKind::Failure if event.container_down => (
            format!("🚨 Container is DOWN: `{}`", event.container_name),
            COLOUR_DOWN,
        ),
        NotifyKind::Failure => (
            format!("❌ Deploy Failed: `{}`", event.container_name),
            COLOUR_FAIL,
        ),
    };

    let mut fields = vec![
        json!({ "name": "Repository", "value": event.github_repo, "inline": true }),
        json!({ "name": "Container", "value": event.container_name, "inline": true }),
    ];

    match event.kind {
        NotifyKind::Failure => {
            if let Some(stage) = event.stage {
                fields.push(json!({ "name": "Stage", "value": stage.to_string(), "inline": true }));
            }
            if event.container_down {
                fields.push(json!({
                    "name": "State",
                    "value": "old container removed, replacement not running",
                    "inline": false,
                }));
            }
            let error: String = event.detail.chars().take(MAX_ERROR_CHARS).collect();
            fields.push(json!({ "name": "Error", "value": format!("```{}```", error), "inline": false }));
        }
        NotifyKind::Start | NotifyKind::Success => {
            fields.push(json!({ "name": "Image", "value": format!("`{}`", event.image), "inline": false }));
        }
    }

    json!({
        "title": title,
        "color": colour,
        "fields": fields,
        "timestamp": Utc::now().to_rfc3339(),
    })
}
