use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use crate::config::TelegramSettings;

use super::{Notifier, host_label};

#[derive(Debug, Deserialize)]
struct BotResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotUser {
    pub id: i64,
    pub username: Option<String>,
}

/// Telegram Bot API backend
#[derive(Debug)]
pub struct TelegramNotifier {
    client: Client,
    settings: TelegramSettings,
    host: String,
    bot: OnceCell<BotUser>,
}

impl TelegramNotifier {
    pub fn new(client: Client, settings: TelegramSettings) -> Self {
        Self {
            client,
            settings,
            host: host_label(),
            bot: OnceCell::new(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.settings.api_url.trim_end_matches('/'),
            self.settings.bot_token,
            method
        )
    }

    /// Bot identity resolved by [`Notifier::initialize`]
    pub fn bot(&self) -> Option<&BotUser> {
        self.bot.get()
    }

    async fn get_me(&self) -> Result<BotUser> {
        let response: BotResponse<BotUser> = self
            .client
            .get(self.method_url("getMe"))
            .send()
            .await
            .context("failed to reach Telegram Bot API")?
            .json()
            .await
            .context("invalid getMe response")?;

        match response {
            BotResponse {
                ok: true,
                result: Some(user),
                ..
            } => Ok(user),
            BotResponse { description, .. } => bail!(
                "Telegram rejected bot token: {}",
                description.unwrap_or_default()
            ),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn initialize(&self) -> Result<()> {
        let user = self.bot.get_or_try_init(|| self.get_me()).await?;
        debug!(
            "telegram bot {} ({}) ready",
            user.username.as_deref().unwrap_or("unnamed"),
            user.id
        );
        Ok(())
    }

    #[instrument(skip(self, message))]
    async fn send(&self, message: &str) -> Result<()> {
        let payload = json!({
            "chat_id": self.settings.chat_id,
            "text": format!("[{}] {}", self.host, message),
        });

        let response: BotResponse<serde_json::Value> = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&payload)
            .send()
            .await
            .context("failed to send Telegram message")?
            .json()
            .await
            .context("invalid sendMessage response")?;

        if !response.ok {
            bail!(
                "Telegram message failed: {}",
                response.description.unwrap_or_default()
            );
        }

        Ok(())
    }
}
