pub mod actors;
pub mod api;
pub mod backoff;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod notify;
pub mod service;
pub mod status;
pub mod system;
pub mod util;

pub use backoff::{BackoffGate, BackoffState, GateDecision};
pub use config::{Config, ResolvedService, ServiceConfig, read_config_file};
pub use engine::{EngineState, MonitorEngine, StopHandle};
pub use error::{ConfigError, EngineError};
pub use notify::{Notifier, Notifiers};
pub use service::{ServiceManager, SystemServiceManager};
pub use status::{StatusSample, StatusStore};
pub use system::{HostProbe, SystemProbe};
