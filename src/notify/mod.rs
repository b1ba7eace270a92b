//! Notification backends and fan-out dispatch
//!
//! A backend only has to know how to deliver a plain text message. The
//! [`Notifiers`] dispatcher sends every message to all configured backends
//! concurrently; one slow or failing backend never delays or fails the others,
//! and failures are logged rather than returned to the caller.
//!
//! ## Backends
//!
//! - **Webhook**: generic JSON POST
//! - **Discord**: Discord webhook with an embed
//! - **Telegram**: Bot API `sendMessage`
//! - **Email**: message piped into a `sendmail` compatible binary

pub mod discord;
pub mod email;
pub mod telegram;
pub mod webhook;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{DEFAULT_NOTIFY_TIMEOUT_SECS, NotificationSettings};

pub use discord::DiscordNotifier;
pub use email::EmailNotifier;
pub use telegram::TelegramNotifier;
pub use webhook::WebhookNotifier;

/// Capability set of a notification backend
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short label used in logs
    fn name(&self) -> &str;

    /// One-time setup before the first message, a no-op by default
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn send(&self, message: &str) -> Result<()>;
}

/// Outcome of one fan-out
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Broadcasts messages to every configured backend
#[derive(Clone)]
pub struct Notifiers {
    backends: Vec<Arc<dyn Notifier>>,
    timeout: Duration,
}

impl std::fmt::Debug for Notifiers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifiers")
            .field(
                "backends",
                &self.backends.iter().map(|b| b.name()).collect::<Vec<_>>(),
            )
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for Notifiers {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Notifiers {
    pub fn new(backends: Vec<Arc<dyn Notifier>>) -> Self {
        Self {
            backends,
            timeout: Duration::from_secs(DEFAULT_NOTIFY_TIMEOUT_SECS),
        }
    }

    /// Bound every single backend send by `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build all backends listed in the notification settings
    pub fn from_settings(settings: &NotificationSettings) -> Self {
        let client = reqwest::Client::new();
        let mut backends: Vec<Arc<dyn Notifier>> = Vec::new();

        for email in &settings.email {
            backends.push(Arc::new(EmailNotifier::new(email.clone())));
        }
        for telegram in &settings.telegram {
            backends.push(Arc::new(TelegramNotifier::new(
                client.clone(),
                telegram.clone(),
            )));
        }
        for webhook in &settings.webhook {
            backends.push(Arc::new(WebhookNotifier::new(client.clone(), webhook.clone())));
        }
        for discord in &settings.discord {
            backends.push(Arc::new(DiscordNotifier::new(client.clone(), discord.clone())));
        }

        Self::new(backends)
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Run the one-time initialization of every backend
    ///
    /// Backends initialize concurrently, each bounded by the send timeout. A
    /// backend that fails or times out stays registered; the failure is logged.
    pub async fn initialize_all(&self) {
        let timeout = self.timeout;
        let attempts = self.backends.iter().map(|backend| async move {
            debug!("initializing {} notifier", backend.name());
            match tokio::time::timeout(timeout, backend.initialize()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("failed to initialize {} notifier: {:#}", backend.name(), e),
                Err(_) => error!(
                    "{} notifier initialization timed out after {:?}",
                    backend.name(),
                    timeout
                ),
            }
        });

        join_all(attempts).await;
    }

    /// Deliver `message` to all backends and wait for every attempt to settle
    #[instrument(skip(self, message), fields(backends = self.backends.len()))]
    pub async fn notify_all(&self, message: &str) -> DispatchReport {
        if self.backends.is_empty() {
            warn!("no notifiers configured, dropping message: {message}");
            return DispatchReport::default();
        }

        let attempts = self.backends.iter().map(|backend| {
            let backend = Arc::clone(backend);
            let timeout = self.timeout;
            let message = message.to_string();

            // each send runs in its own task so a panicking backend stays isolated
            tokio::spawn(async move {
                match tokio::time::timeout(timeout, backend.send(&message)).await {
                    Ok(Ok(())) => {
                        info!("sent notification via {}", backend.name());
                        true
                    }
                    Ok(Err(e)) => {
                        error!("{} notifier failed: {:#}", backend.name(), e);
                        false
                    }
                    Err(_) => {
                        error!("{} notifier timed out after {:?}", backend.name(), timeout);
                        false
                    }
                }
            })
        });

        let mut report = DispatchReport::default();
        for result in join_all(attempts).await {
            match result {
                Ok(true) => report.delivered += 1,
                Ok(false) => report.failed += 1,
                Err(e) => {
                    error!("notifier task aborted: {e}");
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Fire-and-forget variant of [`Notifiers::notify_all`]
    pub fn spawn_notify_all(&self, message: String) -> JoinHandle<DispatchReport> {
        let notifiers = self.clone();
        tokio::spawn(async move { notifiers.notify_all(&message).await })
    }
}

/// Host name used to label outgoing alerts
pub fn host_label() -> String {
    sysinfo::System::host_name().unwrap_or_else(|| String::from("unknown host"))
}
