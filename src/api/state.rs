//! API shared state

use std::sync::Arc;

use crate::engine::MonitorEngine;
use crate::status::StatusStore;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Status history written by the checker
    pub store: StatusStore,

    /// Monitored service names in configuration order
    pub services: Arc<[String]>,
}

impl ApiState {
    pub fn new(store: StatusStore, services: impl IntoIterator<Item = String>) -> Self {
        Self {
            store,
            services: services.into_iter().collect(),
        }
    }

    /// State backed by an initialized engine
    pub fn from_engine(engine: &MonitorEngine) -> Self {
        Self::new(
            engine.store().clone(),
            engine.services().iter().map(|s| s.name.clone()),
        )
    }

    pub fn is_monitored(&self, service: &str) -> bool {
        self.services.iter().any(|name| name == service)
    }
}
