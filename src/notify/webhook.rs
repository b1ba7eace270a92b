use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::json;
use tracing::instrument;

use crate::config::Webhook;

use super::{Notifier, host_label};

/// Generic JSON webhook
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    webhook: Webhook,
    host: String,
}

impl WebhookNotifier {
    pub fn new(client: Client, webhook: Webhook) -> Self {
        Self {
            client,
            webhook,
            host: host_label(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    #[instrument(skip(self, message))]
    async fn send(&self, message: &str) -> Result<()> {
        let payload = json!({
            "message": message,
            "host": self.host,
            "timestamp": Utc::now().to_rfc3339()
        });

        let response = self
            .client
            .post(&self.webhook.url)
            .json(&payload)
            .send()
            .await
            .context("failed to send webhook alert")?;

        if !response.status().is_success() {
            bail!("webhook alert failed with status: {}", response.status());
        }

        Ok(())
    }
}
