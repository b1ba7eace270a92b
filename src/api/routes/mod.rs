pub mod dashboard;
pub mod services;

use chrono::Utc;

use crate::api::state::ApiState;
use crate::api::types::{ServiceStatus, ServiceSummary};
use crate::status::{StatusSample, uptime_percentage};

/// Summarize every monitored service in configuration order
pub(crate) async fn summarize(state: &ApiState) -> Vec<ServiceSummary> {
    let snapshot = state.store.snapshot().await;
    let now = Utc::now();

    state
        .services
        .iter()
        .map(|name| {
            let samples: &[StatusSample] = snapshot.get(name).map(Vec::as_slice).unwrap_or(&[]);
            let last = samples.last();

            ServiceSummary {
                name: name.clone(),
                checks: samples.len(),
                uptime: uptime_percentage(samples),
                last_status: ServiceStatus::from_running(last.map(|s| s.running)),
                last_check: last.map(|s| s.time),
                seconds_since_last_check: last.map(|s| (now - s.time).num_seconds().max(0)),
            }
        })
        .collect()
}
