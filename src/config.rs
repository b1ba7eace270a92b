//! Configuration model for the service monitor
//!
//! The configuration is a JSON document with a list of services and global
//! settings. It is validated once, before the engine is constructed. Per-service
//! defaults (the check interval) are resolved into [`ResolvedService`] values
//! when the engine initializes.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;
use tracing::trace;

use crate::error::{ConfigError, ConfigResult};

/// Default directory under which persisted service logs are written
pub const DEFAULT_LOG_DIRECTORY: &str = "/var/log/apksm/services";

/// Default upper bound for a single notification send
pub const DEFAULT_NOTIFY_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub services: Vec<ServiceConfig>,

    pub settings: Settings,
}

/// A single OS-managed service as it appears in the configuration file
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    #[serde(default)]
    pub name: String,

    /// Pattern matched against the service's recent logs
    #[serde(default)]
    pub specific_pattern: Option<String>,

    /// Seconds between checks, `<= 0` falls back to the global interval
    #[serde(default)]
    pub check_interval: i64,

    #[serde(default)]
    pub restart_if_down: bool,

    #[serde(default)]
    pub save_logs_on_stop: bool,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Settings {
    #[serde(alias = "Monitor")]
    pub monitor: MonitorSettings,

    #[serde(default, alias = "Notifications")]
    pub notifications: NotificationSettings,
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorSettings {
    pub check_interval: i64,

    #[serde(default)]
    pub monitor_system_usage: bool,

    /// CPU ceiling in percent
    #[serde(default = "default_cpu_max", rename = "CPUMax", alias = "cpuMax")]
    pub cpu_max: u32,

    /// Memory ceiling in kB
    #[serde(default = "default_memory_max")]
    pub memory_max: u64,

    /// Base of the exponential notification backoff, 0 means 1s steps
    #[serde(default)]
    pub exponential_backoff_seconds: i64,

    #[serde(default = "default_log_directory")]
    pub log_directory: PathBuf,

    #[serde(default = "default_notify_timeout")]
    pub notify_timeout_seconds: u64,

    /// Upper bound for a single service manager call, 0 uses the service's interval
    #[serde(default)]
    pub check_timeout_seconds: u64,
}

impl MonitorSettings {
    /// Global check interval, only meaningful after validation
    pub fn default_interval(&self) -> u64 {
        self.check_interval.max(1) as u64
    }

    /// Backoff base in seconds, negative values are clamped to 0
    pub fn backoff_base(&self) -> u64 {
        self.exponential_backoff_seconds.max(0) as u64
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_seconds.max(1))
    }
}

fn default_cpu_max() -> u32 {
    90
}

fn default_memory_max() -> u64 {
    u64::MAX
}

fn default_log_directory() -> PathBuf {
    PathBuf::from(DEFAULT_LOG_DIRECTORY)
}

fn default_notify_timeout() -> u64 {
    DEFAULT_NOTIFY_TIMEOUT_SECS
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct NotificationSettings {
    #[serde(default)]
    pub email: Vec<EmailSettings>,

    #[serde(default)]
    pub telegram: Vec<TelegramSettings>,

    #[serde(default)]
    pub webhook: Vec<Webhook>,

    #[serde(default)]
    pub discord: Vec<Discord>,
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailSettings {
    pub to: Vec<String>,
    pub from: String,
    #[serde(default = "default_subject")]
    pub subject: String,
    #[serde(default = "default_sendmail")]
    pub sendmail: PathBuf,
}

fn default_subject() -> String {
    String::from("service monitor alert")
}

fn default_sendmail() -> PathBuf {
    PathBuf::from("/usr/sbin/sendmail")
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramSettings {
    pub bot_token: String,
    pub chat_id: String,
    /// Override for the Bot API base URL
    #[serde(default = "default_telegram_api")]
    pub api_url: String,
}

fn default_telegram_api() -> String {
    String::from("https://api.telegram.org")
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Webhook {
    pub url: String,
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Discord {
    pub url: String,
    pub user_id: Option<String>,
}

/// A service with all defaults applied and its log pattern compiled
#[derive(Debug, Clone)]
pub struct ResolvedService {
    pub name: String,
    pub pattern: Option<Regex>,
    /// Seconds between checks, always positive
    pub check_interval: u64,
    pub restart_if_down: bool,
    pub save_logs_on_stop: bool,
    /// Limit for each service manager call made by a check
    pub call_timeout: Duration,
}

impl ResolvedService {
    pub fn resolve(
        service: &ServiceConfig,
        default_interval: u64,
        check_timeout_secs: u64,
    ) -> ConfigResult<Self> {
        let pattern = compile_pattern(service)?;
        let check_interval = service.effective_interval(default_interval);
        let call_timeout = match check_timeout_secs {
            0 => check_interval,
            secs => secs,
        };

        Ok(Self {
            name: service.name.clone(),
            pattern,
            check_interval,
            restart_if_down: service.restart_if_down,
            save_logs_on_stop: service.save_logs_on_stop,
            call_timeout: Duration::from_secs(call_timeout),
        })
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.check_interval)
    }
}

impl ServiceConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn effective_interval(&self, default_interval: u64) -> u64 {
        if self.check_interval > 0 {
            self.check_interval as u64
        } else {
            default_interval.max(1)
        }
    }
}

fn compile_pattern(service: &ServiceConfig) -> ConfigResult<Option<Regex>> {
    match service.specific_pattern.as_deref() {
        None | Some("") => Ok(None),
        Some(pattern) => Regex::new(pattern)
            .map(Some)
            .map_err(|source| ConfigError::InvalidPattern {
                service: service.name.clone(),
                source,
            }),
    }
}

impl Config {
    pub fn from_json(data: &str) -> ConfigResult<Self> {
        let config: Config = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let monitor = &self.settings.monitor;
        if monitor.check_interval <= 0 {
            return Err(ConfigError::InvalidCheckInterval(monitor.check_interval));
        }
        if monitor.exponential_backoff_seconds < 0 {
            return Err(ConfigError::InvalidBackoff(
                monitor.exponential_backoff_seconds,
            ));
        }

        self.settings.notifications.validate()?;

        if self.services.is_empty() {
            return Err(ConfigError::NoServices);
        }

        let mut seen = HashSet::new();
        for (index, service) in self.services.iter().enumerate() {
            if service.name.trim().is_empty() {
                return Err(ConfigError::MissingServiceName { index });
            }
            if !seen.insert(service.name.as_str()) {
                return Err(ConfigError::DuplicateService(service.name.clone()));
            }
            compile_pattern(service)?;
        }

        Ok(())
    }

    /// Apply the global interval to every service that lacks one
    pub fn resolve_services(&self) -> ConfigResult<Vec<ResolvedService>> {
        let monitor = &self.settings.monitor;
        let default_interval = monitor.default_interval();
        self.services
            .iter()
            .map(|service| {
                ResolvedService::resolve(service, default_interval, monitor.check_timeout_seconds)
            })
            .collect()
    }
}

impl NotificationSettings {
    pub fn validate(&self) -> ConfigResult<()> {
        for email in &self.email {
            if email.to.is_empty() || email.to.iter().any(|to| to.trim().is_empty()) {
                return Err(invalid_notifier("email", "missing recipient"));
            }
            if email.from.trim().is_empty() {
                return Err(invalid_notifier("email", "missing sender"));
            }
        }
        for telegram in &self.telegram {
            if telegram.bot_token.trim().is_empty() {
                return Err(invalid_notifier("telegram", "missing botToken"));
            }
            if telegram.chat_id.trim().is_empty() {
                return Err(invalid_notifier("telegram", "missing chatId"));
            }
        }
        for webhook in &self.webhook {
            if webhook.url.trim().is_empty() {
                return Err(invalid_notifier("webhook", "missing url"));
            }
        }
        for discord in &self.discord {
            if discord.url.trim().is_empty() {
                return Err(invalid_notifier("discord", "missing url"));
            }
        }
        Ok(())
    }
}

fn invalid_notifier(kind: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidNotifier {
        kind,
        reason: reason.to_string(),
    }
}

pub fn read_config_file(path: &str) -> ConfigResult<Config> {
    let file_content = std::fs::read_to_string(path)?;
    Config::from_json(&file_content).inspect(|config| trace!("loaded config: {config:?}"))
}
