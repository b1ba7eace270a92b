//! In-memory status history for monitored services
//!
//! Every check appends one [`StatusSample`] for its service. The history is never
//! truncated during a run; it backs the uptime and last-status views of the
//! dashboard. Samples are kept ordered by their timestamp, so two checks that
//! finish out of order still produce a chronological history.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::trace;

/// One health observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusSample {
    pub time: DateTime<Utc>,
    pub running: bool,
}

/// Most recent observation of a service plus its age
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LastStatus {
    pub sample: StatusSample,
    pub age: chrono::Duration,
}

impl std::fmt::Display for LastStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = if self.sample.running { "OK" } else { "ERR" };
        write!(f, "{}, {} seconds ago", status, self.age.num_seconds().max(0))
    }
}

/// Uptime as a percentage of samples that were up
pub fn uptime_percentage(samples: &[StatusSample]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }

    let up = samples.iter().filter(|sample| sample.running).count();
    Some(up as f64 / samples.len() as f64 * 100.0)
}

/// Shared, concurrency-safe store of status samples keyed by service name
///
/// Cloning the store is cheap and yields a handle to the same history.
#[derive(Debug, Clone, Default)]
pub struct StatusStore {
    samples: Arc<RwLock<HashMap<String, Vec<StatusSample>>>>,
}

impl StatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with an empty history for each given service
    pub fn with_services<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let samples = names
            .into_iter()
            .map(|name| (name.to_string(), Vec::with_capacity(100)))
            .collect();

        Self {
            samples: Arc::new(RwLock::new(samples)),
        }
    }

    pub async fn record(&self, service: &str, time: DateTime<Utc>, running: bool) {
        let mut samples = self.samples.write().await;
        let history = samples.entry(service.to_string()).or_default();

        // insert after every sample with time <= the new one
        let index = history.partition_point(|sample| sample.time <= time);
        history.insert(index, StatusSample { time, running });

        trace!(
            "recorded {} for {service} ({} samples)",
            if running { "up" } else { "down" },
            history.len()
        );
    }

    /// Chronological samples for a service (empty if unknown)
    pub async fn query(&self, service: &str) -> Vec<StatusSample> {
        let samples = self.samples.read().await;
        samples.get(service).cloned().unwrap_or_default()
    }

    /// Copy of every service's history
    pub async fn snapshot(&self) -> HashMap<String, Vec<StatusSample>> {
        self.samples.read().await.clone()
    }

    pub async fn uptime(&self, service: &str) -> Option<f64> {
        let samples = self.samples.read().await;
        samples
            .get(service)
            .and_then(|history| uptime_percentage(history))
    }

    pub async fn last_status(&self, service: &str) -> Option<LastStatus> {
        let samples = self.samples.read().await;
        let sample = *samples.get(service)?.last()?;

        Some(LastStatus {
            sample,
            age: Utc::now() - sample.time,
        })
    }

    pub async fn service_names(&self) -> Vec<String> {
        let samples = self.samples.read().await;
        let mut names: Vec<String> = samples.keys().cloned().collect();
        names.sort();
        names
    }
}
