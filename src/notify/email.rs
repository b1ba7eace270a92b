use std::process::Stdio;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::instrument;

use crate::config::EmailSettings;

use super::{Notifier, host_label};

/// E-mail backend that hands messages to a local `sendmail` binary
#[derive(Debug, Clone)]
pub struct EmailNotifier {
    settings: EmailSettings,
    host: String,
}

impl EmailNotifier {
    pub fn new(settings: EmailSettings) -> Self {
        Self {
            settings,
            host: host_label(),
        }
    }

    /// RFC 5322 message as consumed by `sendmail -t`
    pub fn compose(&self, message: &str) -> String {
        format!(
            "From: {}\r\nTo: {}\r\nSubject: [{}] {}\r\nDate: {}\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{}\r\n",
            self.settings.from,
            self.settings.to.join(", "),
            self.host,
            self.settings.subject,
            Utc::now().to_rfc2822(),
            message
        )
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &str {
        "email"
    }

    async fn initialize(&self) -> Result<()> {
        if !self.settings.sendmail.exists() {
            bail!("{} not found", self.settings.sendmail.display());
        }
        Ok(())
    }

    #[instrument(skip(self, message))]
    async fn send(&self, message: &str) -> Result<()> {
        let mut child = Command::new(&self.settings.sendmail)
            .arg("-t")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {}", self.settings.sendmail.display()))?;

        let mut stdin = child
            .stdin
            .take()
            .context("sendmail stdin not available")?;
        stdin
            .write_all(self.compose(message).as_bytes())
            .await
            .context("failed to write message to sendmail")?;
        drop(stdin);

        let status = child.wait().await.context("sendmail did not finish")?;
        if !status.success() {
            bail!("sendmail exited with {status}");
        }

        Ok(())
    }
}
