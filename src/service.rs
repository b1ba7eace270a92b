//! OS service collaborator
//!
//! The monitor only needs four operations from the host's service manager. They
//! are expressed as the [`ServiceManager`] trait so the engine can be driven by a
//! scripted implementation in tests; [`SystemServiceManager`] shells out to
//! `service` and `journalctl`.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::Local;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

/// Marker printed by `service <name> status` for a running unit
const RUNNING_MARKER: &str = "Active: active (running)";

#[async_trait]
pub trait ServiceManager: Send + Sync {
    /// Whether the service is currently running
    async fn is_running(&self, service: &str) -> Result<bool>;

    /// Restart the service, `Ok(false)` if the manager reported a failure
    async fn restart(&self, service: &str) -> Result<bool>;

    /// Recent log output of the service
    async fn fetch_logs(&self, service: &str) -> Result<String>;

    /// Store a copy of the given log content, returning where it was written
    async fn persist_logs(&self, service: &str, content: &str) -> Result<PathBuf>;
}

/// [`ServiceManager`] backed by the host's `service` and `journalctl` commands
#[derive(Debug, Clone)]
pub struct SystemServiceManager {
    log_directory: PathBuf,
}

impl SystemServiceManager {
    pub fn new(log_directory: impl Into<PathBuf>) -> Self {
        Self {
            log_directory: log_directory.into(),
        }
    }

    pub fn log_directory(&self) -> &Path {
        &self.log_directory
    }
}

async fn run_captured(program: &str, args: &[&str]) -> Result<(bool, String)> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("failed to spawn {program}"))?;

    Ok((
        output.status.success(),
        String::from_utf8_lossy(&output.stdout).into_owned(),
    ))
}

/// Location of a persisted log file for `service` saved at `stamp`
pub fn log_file_path(directory: &Path, service: &str, stamp: &str) -> PathBuf {
    directory
        .join(service)
        .join(format!("{service}-{stamp}.log"))
}

/// Write `content` into `<directory>/<service>/<service>-<timestamp>.log`
pub async fn write_log_file(directory: &Path, service: &str, content: &str) -> Result<PathBuf> {
    let stamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let path = log_file_path(directory, service, &stamp);

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    tokio::fs::write(&path, content)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;

    Ok(path)
}

#[async_trait]
impl ServiceManager for SystemServiceManager {
    #[instrument(skip(self))]
    async fn is_running(&self, service: &str) -> Result<bool> {
        let (success, stdout) = run_captured("service", &[service, "status"]).await?;
        if !success {
            // non-zero exit still prints the status block for stopped units
            debug!("status command for {service} exited unsuccessfully");
        }
        Ok(stdout.contains(RUNNING_MARKER))
    }

    #[instrument(skip(self))]
    async fn restart(&self, service: &str) -> Result<bool> {
        let (success, _) = run_captured("service", &[service, "restart"]).await?;
        if !success {
            warn!("service manager failed to restart {service}");
        }
        Ok(success)
    }

    #[instrument(skip(self))]
    async fn fetch_logs(&self, service: &str) -> Result<String> {
        let (success, stdout) = run_captured("journalctl", &["-u", service, "--no-pager"]).await?;
        if !success {
            bail!("journalctl exited unsuccessfully for {service}");
        }
        Ok(stdout)
    }

    #[instrument(skip(self, content))]
    async fn persist_logs(&self, service: &str, content: &str) -> Result<PathBuf> {
        write_log_file(&self.log_directory, service, content).await
    }
}
