//! Message types for actor communication
//!
//! ## Design Principles
//!
//! 1. **Requests**: check requests and down events flow through unbounded mpsc
//!    queues so a producer never waits on a slow consumer
//! 2. **Commands**: control messages sent to a specific actor via bounded mpsc
//! 3. **Request/Response**: oneshot channels for synchronous queries

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::oneshot;

use crate::backoff::BackoffState;
use crate::config::ResolvedService;

/// Request to run one health check for a service
///
/// Issued by a scheduler on every tick, consumed by the checker.
#[derive(Debug)]
pub struct CheckRequest {
    pub service: Arc<ResolvedService>,

    /// When the scheduler issued the request
    pub requested_at: DateTime<Utc>,

    /// Receives the outcome once the check finished (manual checks only)
    pub respond_to: Option<oneshot::Sender<CheckOutcome>>,
}

/// Result of one health check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    pub service: String,

    /// Time the sample was recorded with
    pub timestamp: DateTime<Utc>,

    pub up: bool,

    /// The service's log pattern matched the recent logs
    pub pattern_matched: bool,

    /// `Some(success)` if a restart was attempted
    pub restarted: Option<bool>,

    /// The request waited behind a running check and was superseded by a newer one
    pub skipped: bool,
}

impl CheckOutcome {
    pub fn skipped(service: &str) -> Self {
        Self {
            service: service.to_string(),
            timestamp: Utc::now(),
            up: false,
            pattern_matched: false,
            restarted: None,
            skipped: true,
        }
    }
}

/// Published by the checker for every failed check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownEvent {
    pub service: String,

    /// Observation time, used as "now" by the backoff gate
    pub timestamp: DateTime<Utc>,
}

/// Commands that can be sent to a SchedulerActor
#[derive(Debug)]
pub enum SchedulerCommand {
    /// Issue a check right away, bypassing the interval timer
    CheckNow {
        respond_to: oneshot::Sender<CheckOutcome>,
    },

    /// Stop issuing checks
    Shutdown,
}

/// Commands that can be sent to the CheckerActor
#[derive(Debug)]
pub enum CheckerCommand {
    /// Number of checks currently executing
    InFlight { respond_to: oneshot::Sender<usize> },

    /// Stop consuming requests and abandon in-flight checks
    Shutdown,
}

/// Commands that can be sent to the TrackerActor
#[derive(Debug)]
pub enum TrackerCommand {
    /// Current backoff state of a service
    GetState {
        service: String,
        respond_to: oneshot::Sender<Option<BackoffState>>,
    },

    /// Gracefully shut down the tracker
    Shutdown,
}

/// Commands that can be sent to the SystemWatcherActor
#[derive(Debug)]
pub enum WatcherCommand {
    /// Run one sampling cycle immediately
    SampleNow {
        respond_to: oneshot::Sender<anyhow::Result<UsageReport>>,
    },

    Shutdown,
}

/// Result of one system usage cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageReport {
    pub cpu_usage_percent: f64,
    pub used_memory_kb: u64,

    /// Alert messages emitted for this cycle
    pub alerts: Vec<String>,
}
