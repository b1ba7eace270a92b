//! Actor-based monitoring pipeline
//!
//! Each actor runs as an independent async task communicating via Tokio channels.
//!
//! ## Architecture Overview
//!
//! ```text
//!                      ┌──────────────────┐
//!                      │  MonitorEngine   │
//!                      └────────┬─────────┘
//!                               │ spawns
//!          ┌────────────────────┼─────────────────────┐
//!          │                    │                     │
//!  ┌───────▼───────┐    ┌───────▼───────┐    ┌────────▼────────┐
//!  │ Scheduler-1   │    │ Scheduler-N   │    │ SystemWatcher   │
//!  │ (service A)   │    │ (service N)   │    └────────┬────────┘
//!  └───────┬───────┘    └───────┬───────┘             │
//!          └─────────┬──────────┘                     │
//!                    │ CheckRequest (unbounded mpsc)  │
//!            ┌───────▼────────┐                       │
//!            │ CheckerActor   │── record ──► StatusStore
//!            │ task per check │                       │
//!            └───────┬────────┘                       │
//!                    │ DownEvent (unbounded mpsc)     │
//!            ┌───────▼────────┐                       │
//!            │ TrackerActor   │                       │
//!            │ (backoff gate) │                       │
//!            └───────┬────────┘                       │
//!                    │ alert                          │ alert
//!            ┌───────▼────────────────────────────────▼─┐
//!            │          Notifiers (fan-out)             │
//!            └──────────────────────────────────────────┘
//! ```
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: each actor has a bounded mpsc command channel for control messages
//! 2. **Work queues**: check requests and down events never block their producer
//! 3. **Request/Response**: oneshot channels for synchronous queries

pub mod checker;
pub mod messages;
pub mod scheduler;
pub mod system_watcher;
pub mod tracker;
