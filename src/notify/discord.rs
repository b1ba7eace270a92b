use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use tracing::{error, instrument};

use crate::config::Discord;

use super::{Notifier, host_label};

/// Embed color for alerts (red)
const ALERT_COLOR: u32 = 15158332;

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Default)]
pub struct MessageBuilder {
    content: Option<String>,
    embeds: Vec<Embed>,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(mut self, content: impl ToString) -> Self {
        self.content = Some(content.to_string());
        self
    }

    pub fn add_embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn build(self) -> Message {
        Message {
            content: self.content,
            embeds: self.embeds,
        }
    }
}

/// Discord webhook backend
#[derive(Debug, Clone)]
pub struct DiscordNotifier {
    client: Client,
    discord: Discord,
    host: String,
}

impl DiscordNotifier {
    pub fn new(client: Client, discord: Discord) -> Self {
        Self {
            client,
            discord,
            host: host_label(),
        }
    }

    pub fn build_message(&self, text: &str) -> Message {
        let embed = Embed {
            title: Some("🔴 Service Monitor Alert".to_string()),
            description: Some(text.to_string()),
            color: Some(ALERT_COLOR),
            footer: Some(EmbedFooter {
                text: format!("Host: {}", self.host),
            }),
            timestamp: Some(Utc::now().to_rfc3339()),
        };

        let mut builder = MessageBuilder::new().add_embed(embed);
        if let Some(user_id) = &self.discord.user_id {
            builder = builder.content(format!("🔴 ({}) <@{user_id}>", self.host));
        }

        builder.build()
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    fn name(&self) -> &str {
        "discord"
    }

    #[instrument(skip(self, message))]
    async fn send(&self, message: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.discord.url)
            .json(&self.build_message(message))
            .send()
            .await
            .context("failed to send Discord message")?;

        let status = response.status();
        if !status.is_success() {
            if let Ok(error_text) = response.text().await {
                error!("Discord API error response: {}", error_text);
            }
            bail!("Discord message failed with status: {}", status);
        }

        Ok(())
    }
}
