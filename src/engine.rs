//! MonitorEngine - lifecycle and topology wiring
//!
//! ```text
//! Created ──initialize──► Initialized ──start──► Running ──shutdown──► Stopped
//!    └──────────────────────────┴──────────────shutdown──────────────────┘
//! ```
//!
//! The engine owns the status store and the backoff gate, spawns one scheduler
//! per service, the checker, the tracker and (if enabled) the system watcher,
//! and stops all of them when the stop signal fires. In-flight checks are
//! abandoned on stop.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use crate::actors::checker::{CheckContext, CheckerHandle};
use crate::actors::scheduler::SchedulerHandle;
use crate::actors::system_watcher::{DEFAULT_SAMPLE_GAP, UsageLimits, WatcherHandle};
use crate::actors::tracker::TrackerHandle;
use crate::backoff::BackoffGate;
use crate::config::{Config, ResolvedService};
use crate::error::EngineError;
use crate::notify::Notifiers;
use crate::service::{ServiceManager, SystemServiceManager};
use crate::status::StatusStore;
use crate::system::{HostProbe, SystemProbe};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum EngineState {
    Created,
    Initialized,
    Running,
    Stopped,
}

/// Cloneable trigger for the engine's stop signal
///
/// Stopping is idempotent, and a stop requested before the engine runs is
/// observed as soon as it does.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }
}

pub struct MonitorEngine {
    config: Config,
    manager: Arc<dyn ServiceManager>,
    probe: Arc<dyn SystemProbe>,
    notifiers: Notifiers,

    state: EngineState,
    services: Vec<Arc<ResolvedService>>,
    store: StatusStore,
    gate: BackoffGate,

    schedulers: Vec<SchedulerHandle>,
    checker: Option<CheckerHandle>,
    tracker: Option<TrackerHandle>,
    watcher: Option<WatcherHandle>,

    stop_tx: Arc<watch::Sender<bool>>,
    sample_gap: Duration,
}

impl MonitorEngine {
    pub fn new(
        config: Config,
        manager: Arc<dyn ServiceManager>,
        probe: Arc<dyn SystemProbe>,
        notifiers: Notifiers,
    ) -> Self {
        let (stop_tx, _) = watch::channel(false);

        Self {
            config,
            manager,
            probe,
            notifiers,
            state: EngineState::Created,
            services: Vec::new(),
            store: StatusStore::new(),
            gate: BackoffGate::new(0, std::iter::empty()),
            schedulers: Vec::new(),
            checker: None,
            tracker: None,
            watcher: None,
            stop_tx: Arc::new(stop_tx),
            sample_gap: DEFAULT_SAMPLE_GAP,
        }
    }

    /// Engine talking to the local init system, `/proc` and the configured backends
    pub fn from_config(config: Config) -> Self {
        let monitor = &config.settings.monitor;
        let manager = Arc::new(SystemServiceManager::new(monitor.log_directory.clone()));
        let notifiers = Notifiers::from_settings(&config.settings.notifications)
            .with_timeout(monitor.notify_timeout());

        Self::new(config, manager, Arc::new(HostProbe), notifiers)
    }

    /// Pause between the two CPU snapshots of a system usage cycle
    pub fn with_sample_gap(mut self, sample_gap: Duration) -> Self {
        self.sample_gap = sample_gap;
        self
    }

    fn transition(&mut self, expected: EngineState, to: EngineState) -> Result<(), EngineError> {
        if self.state != expected {
            return Err(EngineError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }

    /// Resolve per-service defaults, build the backoff states and initialize
    /// the notification backends
    #[instrument(skip(self))]
    pub async fn initialize(&mut self) -> Result<()> {
        if self.state != EngineState::Created {
            return Err(EngineError::InvalidTransition {
                from: self.state,
                to: EngineState::Initialized,
            }
            .into());
        }

        self.config.validate().context("invalid configuration")?;
        self.services = self
            .config
            .resolve_services()
            .context("failed to resolve services")?
            .into_iter()
            .map(Arc::new)
            .collect();

        let names = self.services.iter().map(|s| s.name.as_str());
        self.store = StatusStore::with_services(names.clone());
        self.gate = BackoffGate::new(self.config.settings.monitor.backoff_base(), names);

        self.notifiers.initialize_all().await;

        self.transition(EngineState::Created, EngineState::Initialized)?;
        info!(
            "initialized {} services, {} notifiers",
            self.services.len(),
            self.notifiers.len()
        );
        Ok(())
    }

    /// Spawn every actor
    #[instrument(skip(self))]
    pub fn start(&mut self) -> Result<(), EngineError> {
        self.transition(EngineState::Initialized, EngineState::Running)?;

        let (check_tx, check_rx) = mpsc::unbounded_channel();
        let (down_tx, down_rx) = mpsc::unbounded_channel();

        self.tracker = Some(TrackerHandle::spawn(
            self.gate.clone(),
            self.notifiers.clone(),
            down_rx,
        ));

        let ctx = CheckContext {
            manager: Arc::clone(&self.manager),
            store: self.store.clone(),
            gate: self.gate.clone(),
            notifiers: self.notifiers.clone(),
            down_tx,
        };
        self.checker = Some(CheckerHandle::spawn(ctx, check_rx));

        self.schedulers = self
            .services
            .iter()
            .map(|service| SchedulerHandle::spawn(Arc::clone(service), check_tx.clone()))
            .collect();

        let monitor = &self.config.settings.monitor;
        if monitor.monitor_system_usage {
            let limits = UsageLimits {
                cpu_max: monitor.cpu_max,
                memory_max_kb: monitor.memory_max,
            };
            self.watcher = Some(WatcherHandle::spawn_with_gap(
                Arc::clone(&self.probe),
                limits,
                self.notifiers.clone(),
                Duration::from_secs(monitor.default_interval()),
                self.sample_gap,
            ));
        } else {
            debug!("system usage monitoring disabled");
        }

        info!("monitoring {} services", self.schedulers.len());
        Ok(())
    }

    /// Wait for the stop signal, then shut everything down
    pub async fn run_until_stopped(&mut self) {
        let mut stop_rx = self.stop_tx.subscribe();
        // the engine holds the sender, so this only returns once stopped
        let _ = stop_rx.wait_for(|stopped| *stopped).await;

        self.shutdown().await;
    }

    /// Stop every actor; a no-op once stopped
    #[instrument(skip(self))]
    pub async fn shutdown(&mut self) {
        if self.state == EngineState::Stopped {
            return;
        }
        self.stop_tx.send_replace(true);

        for scheduler in self.schedulers.drain(..) {
            scheduler.shutdown().await;
        }
        if let Some(checker) = self.checker.take() {
            checker.shutdown().await;
        }
        if let Some(tracker) = self.tracker.take() {
            tracker.shutdown().await;
        }
        if let Some(watcher) = self.watcher.take() {
            watcher.shutdown().await;
        }

        self.state = EngineState::Stopped;
        info!("monitor stopped");
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            tx: Arc::clone(&self.stop_tx),
        }
    }

    /// Fire the stop signal after `duration`
    pub fn run_for(&self, duration: Duration) -> JoinHandle<()> {
        let stop = self.stop_handle();
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            debug!("run time of {:?} elapsed", duration);
            stop.stop();
        })
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &StatusStore {
        &self.store
    }

    pub fn gate(&self) -> &BackoffGate {
        &self.gate
    }

    pub fn notifiers(&self) -> &Notifiers {
        &self.notifiers
    }

    /// Resolved services, empty before initialization
    pub fn services(&self) -> &[Arc<ResolvedService>] {
        &self.services
    }

    pub fn schedulers(&self) -> &[SchedulerHandle] {
        &self.schedulers
    }

    pub fn scheduler(&self, service: &str) -> Option<&SchedulerHandle> {
        self.schedulers.iter().find(|s| s.service_name() == service)
    }

    pub fn checker(&self) -> Option<&CheckerHandle> {
        self.checker.as_ref()
    }

    pub fn tracker(&self) -> Option<&TrackerHandle> {
        self.tracker.as_ref()
    }

    pub fn watcher(&self) -> Option<&WatcherHandle> {
        self.watcher.as_ref()
    }
}
