//! API response types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::status::StatusSample;

/// Last observed state of a service
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Up,
    Down,
    /// No check finished yet
    Unknown,
}

impl ServiceStatus {
    pub fn from_running(running: Option<bool>) -> Self {
        match running {
            Some(true) => ServiceStatus::Up,
            Some(false) => ServiceStatus::Down,
            None => ServiceStatus::Unknown,
        }
    }
}

/// Summary of one monitored service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSummary {
    pub name: String,

    /// Number of finished checks
    pub checks: usize,

    /// Percentage of checks that found the service running
    pub uptime: Option<f64>,

    pub last_status: ServiceStatus,

    pub last_check: Option<DateTime<Utc>>,

    pub seconds_since_last_check: Option<i64>,
}

/// Response for GET /api/services
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesResponse {
    pub services: Vec<ServiceSummary>,
    pub count: usize,
}

/// Response for GET /api/services/:name
#[derive(Debug, Clone, Serialize)]
pub struct ServiceHistoryResponse {
    pub name: String,
    pub samples: Vec<StatusSample>,
}
