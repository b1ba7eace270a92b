//! Exponential backoff gate for service alerts
//!
//! ## Gate State Machine
//!
//! ```text
//! down event, now <  next_allowed_at  → Suppressed (no alert, no state change)
//! down event, now >= next_allowed_at  → Fire: delay = next(delay), next_allowed_at = now + delay
//! check up,   has_fired               → Reset to the initial state
//! ```
//!
//! The first firing waits `max(base, 1)` seconds before the gate opens again,
//! every later firing at least doubles the previous delay. A base of 0 is
//! therefore a 1s, 2s, 4s, ... schedule and never a zero-length gate.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, trace};

/// Upper bound for a single delay step (one year)
const MAX_DELAY_SECS: u64 = 365 * 24 * 60 * 60;

/// Per-service backoff state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BackoffState {
    pub base_interval_secs: u64,
    pub current_delay_secs: u64,
    pub next_allowed_at: DateTime<Utc>,
    pub has_fired: bool,
}

/// Result of offering a down event to the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// The alert may be sent now; the gate is closed until `next_allowed_at`
    Fire {
        delay_secs: u64,
        next_allowed_at: DateTime<Utc>,
    },

    /// The gate is still closed
    Suppressed { next_allowed_at: DateTime<Utc> },
}

impl GateDecision {
    pub fn fired(&self) -> bool {
        matches!(self, GateDecision::Fire { .. })
    }
}

impl BackoffState {
    /// Initial state: the gate is open and the delay is the configured base
    pub fn new(base_interval_secs: u64) -> Self {
        Self {
            base_interval_secs,
            current_delay_secs: base_interval_secs,
            next_allowed_at: DateTime::<Utc>::MIN_UTC,
            has_fired: false,
        }
    }

    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        now >= self.next_allowed_at
    }

    /// Delay applied by the next firing
    fn next_delay(&self) -> u64 {
        let delay = if self.has_fired {
            self.current_delay_secs.saturating_mul(2)
        } else {
            self.current_delay_secs
        };

        delay.clamp(1, MAX_DELAY_SECS)
    }

    /// Evaluate the gate and advance the state if it is open
    pub fn evaluate(&mut self, now: DateTime<Utc>) -> GateDecision {
        if !self.is_open(now) {
            return GateDecision::Suppressed {
                next_allowed_at: self.next_allowed_at,
            };
        }

        let delay_secs = self.next_delay();
        let step = TimeDelta::try_seconds(delay_secs as i64).unwrap_or(TimeDelta::MAX);
        let candidate = now.checked_add_signed(step).unwrap_or(DateTime::<Utc>::MAX_UTC);

        self.current_delay_secs = delay_secs;
        self.next_allowed_at = candidate.max(self.next_allowed_at);
        self.has_fired = true;

        GateDecision::Fire {
            delay_secs,
            next_allowed_at: self.next_allowed_at,
        }
    }
}

/// Shared map of backoff states, one per service
///
/// Evaluation and reset for a service happen under one lock, so two
/// near-simultaneous down events can never both pass the gate.
#[derive(Debug, Clone)]
pub struct BackoffGate {
    base_interval_secs: u64,
    states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl BackoffGate {
    pub fn new<'a>(base_interval_secs: u64, services: impl IntoIterator<Item = &'a str>) -> Self {
        let states = services
            .into_iter()
            .map(|name| (name.to_string(), BackoffState::new(base_interval_secs)))
            .collect();

        Self {
            base_interval_secs,
            states: Arc::new(Mutex::new(states)),
        }
    }

    pub fn base_interval_secs(&self) -> u64 {
        self.base_interval_secs
    }

    /// Offer a down event for `service` at `now`
    pub async fn try_fire(&self, service: &str, now: DateTime<Utc>) -> GateDecision {
        let mut states = self.states.lock().await;
        let state = states
            .entry(service.to_string())
            .or_insert_with(|| BackoffState::new(self.base_interval_secs));

        let decision = state.evaluate(now);
        trace!("{service}: gate decision {decision:?}");
        decision
    }

    /// Replace the state with a fresh one if the service has alerted before
    ///
    /// Returns whether a reset happened.
    pub async fn reset_if_fired(&self, service: &str) -> bool {
        let mut states = self.states.lock().await;
        match states.get_mut(service) {
            Some(state) if state.has_fired => {
                *state = BackoffState::new(self.base_interval_secs);
                debug!("{service}: recovered, notification backoff reset");
                true
            }
            _ => false,
        }
    }

    pub async fn state(&self, service: &str) -> Option<BackoffState> {
        self.states.lock().await.get(service).copied()
    }
}
