//! Error types for configuration loading and engine lifecycle

use std::fmt;

use crate::engine::EngineState;

/// Result type alias for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while loading or validating the configuration
///
/// All of these are fatal: the monitor refuses to start.
#[derive(Debug)]
pub enum ConfigError {
    /// The configuration file could not be read
    Io(std::io::Error),

    /// The configuration file is not valid JSON for the expected schema
    Parse(serde_json::Error),

    /// No services are configured
    NoServices,

    /// A service entry has an empty name
    MissingServiceName { index: usize },

    /// Two services share the same name
    DuplicateService(String),

    /// The global check interval is not positive
    InvalidCheckInterval(i64),

    /// The exponential backoff base is negative
    InvalidBackoff(i64),

    /// A service's `specificPattern` does not compile
    InvalidPattern {
        service: String,
        source: regex::Error,
    },

    /// A notifier entry is missing required fields
    InvalidNotifier { kind: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "failed to read configuration file: {}", err),
            ConfigError::Parse(err) => write!(f, "invalid configuration file: {}", err),
            ConfigError::NoServices => write!(f, "no services found in config"),
            ConfigError::MissingServiceName { index } => {
                write!(f, "service #{} is missing property 'name'", index)
            }
            ConfigError::DuplicateService(name) => {
                write!(f, "service '{}' is configured more than once", name)
            }
            ConfigError::InvalidCheckInterval(value) => write!(
                f,
                "monitor checkInterval must be greater than 0 (got {})",
                value
            ),
            ConfigError::InvalidBackoff(value) => write!(
                f,
                "monitor exponentialBackoffSeconds must not be negative (got {})",
                value
            ),
            ConfigError::InvalidPattern { service, source } => {
                write!(f, "service '{}' has an invalid specificPattern: {}", service, source)
            }
            ConfigError::InvalidNotifier { kind, reason } => {
                write!(f, "invalid {} notification settings: {}", kind, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(err) => Some(err),
            ConfigError::Parse(err) => Some(err),
            ConfigError::InvalidPattern { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err)
    }
}

/// Errors raised by misuse of the [`MonitorEngine`](crate::engine::MonitorEngine) lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The requested transition is not allowed from the current state
    InvalidTransition { from: EngineState, to: EngineState },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InvalidTransition { from, to } => {
                write!(f, "cannot move engine from {:?} to {:?}", from, to)
            }
        }
    }
}

impl std::error::Error for EngineError {}
