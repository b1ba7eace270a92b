//! Helper types for integration tests

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde_json::Value;
use service_monitor::{
    Config, MonitorEngine, Notifier, Notifiers, ServiceManager,
    system::{CpuTicks, MemorySnapshot, SystemProbe},
};

/// Scripted [`ServiceManager`]
///
/// Every service is running unless told otherwise. A script is consumed one
/// result per liveness query before falling back to the fixed status.
#[derive(Default)]
pub struct MockServiceManager {
    status: Mutex<HashMap<String, bool>>,
    scripts: Mutex<HashMap<String, VecDeque<bool>>>,
    failing_queries: Mutex<Vec<String>>,
    logs: Mutex<HashMap<String, String>>,
    delays: Mutex<HashMap<String, Duration>>,
    hang_once: Mutex<Vec<String>>,
    restart_succeeds: AtomicBool,
    log_directory: Option<PathBuf>,

    queries: Mutex<HashMap<String, usize>>,
    restarts: Mutex<HashMap<String, usize>>,
    persisted: Mutex<HashMap<String, Vec<String>>>,
}

impl MockServiceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist logs for real below `directory`
    pub fn with_log_directory(directory: impl Into<PathBuf>) -> Self {
        Self {
            log_directory: Some(directory.into()),
            ..Self::default()
        }
    }

    pub fn set_running(&self, service: &str, running: bool) {
        self.status
            .lock()
            .unwrap()
            .insert(service.to_string(), running);
    }

    pub fn script(&self, service: &str, results: impl IntoIterator<Item = bool>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(service.to_string(), results.into_iter().collect());
    }

    pub fn fail_queries(&self, service: &str) {
        self.failing_queries
            .lock()
            .unwrap()
            .push(service.to_string());
    }

    pub fn set_logs(&self, service: &str, logs: &str) {
        self.logs
            .lock()
            .unwrap()
            .insert(service.to_string(), logs.to_string());
    }

    pub fn set_delay(&self, service: &str, delay: Duration) {
        self.delays
            .lock()
            .unwrap()
            .insert(service.to_string(), delay);
    }

    /// Make the next liveness query of `service` never return
    pub fn hang_next_query(&self, service: &str) {
        self.hang_once.lock().unwrap().push(service.to_string());
    }

    pub fn set_restart_succeeds(&self, succeeds: bool) {
        self.restart_succeeds.store(succeeds, Ordering::SeqCst);
    }

    pub fn queries(&self, service: &str) -> usize {
        self.queries
            .lock()
            .unwrap()
            .get(service)
            .copied()
            .unwrap_or_default()
    }

    pub fn restarts(&self, service: &str) -> usize {
        self.restarts
            .lock()
            .unwrap()
            .get(service)
            .copied()
            .unwrap_or_default()
    }

    pub fn persisted(&self, service: &str) -> Vec<String> {
        self.persisted
            .lock()
            .unwrap()
            .get(service)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ServiceManager for MockServiceManager {
    async fn is_running(&self, service: &str) -> Result<bool> {
        *self
            .queries
            .lock()
            .unwrap()
            .entry(service.to_string())
            .or_default() += 1;

        let hang = {
            let mut hang_once = self.hang_once.lock().unwrap();
            let position = hang_once.iter().position(|s| s == service);
            position.map(|i| hang_once.remove(i)).is_some()
        };
        if hang {
            std::future::pending::<()>().await;
        }

        let delay = self.delays.lock().unwrap().get(service).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing_queries.lock().unwrap().iter().any(|s| s == service) {
            bail!("service: unrecognized service {service}");
        }

        if let Some(next) = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(service)
            .and_then(VecDeque::pop_front)
        {
            return Ok(next);
        }

        Ok(self
            .status
            .lock()
            .unwrap()
            .get(service)
            .copied()
            .unwrap_or(true))
    }

    async fn restart(&self, service: &str) -> Result<bool> {
        *self
            .restarts
            .lock()
            .unwrap()
            .entry(service.to_string())
            .or_default() += 1;

        Ok(self.restart_succeeds.load(Ordering::SeqCst))
    }

    async fn fetch_logs(&self, service: &str) -> Result<String> {
        Ok(self
            .logs
            .lock()
            .unwrap()
            .get(service)
            .cloned()
            .unwrap_or_default())
    }

    async fn persist_logs(&self, service: &str, content: &str) -> Result<PathBuf> {
        self.persisted
            .lock()
            .unwrap()
            .entry(service.to_string())
            .or_default()
            .push(content.to_string());

        match &self.log_directory {
            Some(directory) => {
                service_monitor::service::write_log_file(directory, service, content).await
            }
            None => Ok(PathBuf::from(format!("/dev/null/{service}.log"))),
        }
    }
}

/// Notifier that remembers every message it was asked to send
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
    initialized: AtomicUsize,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.contains(needle))
            .count()
    }

    pub fn initialized(&self) -> usize {
        self.initialized.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn initialize(&self) -> Result<()> {
        self.initialized.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn send(&self, message: &str) -> Result<()> {
        self.messages.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

/// Notifier whose initialization and every send fail
#[derive(Default)]
pub struct FailingNotifier {
    attempts: AtomicUsize,
}

impl FailingNotifier {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for FailingNotifier {
    fn name(&self) -> &str {
        "failing"
    }

    async fn initialize(&self) -> Result<()> {
        bail!("backend unreachable")
    }

    async fn send(&self, _message: &str) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        bail!("backend unreachable")
    }
}

/// Notifier that never finishes initializing or sending
pub struct HangingNotifier;

#[async_trait]
impl Notifier for HangingNotifier {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn initialize(&self) -> Result<()> {
        std::future::pending::<Result<()>>().await
    }

    async fn send(&self, _message: &str) -> Result<()> {
        std::future::pending::<Result<()>>().await
    }
}

/// Probe reporting fixed snapshots
pub struct FixedProbe {
    pub before: CpuTicks,
    pub after: CpuTicks,
    pub memory: MemorySnapshot,
    calls: AtomicUsize,
}

impl FixedProbe {
    pub fn idle() -> Self {
        Self::new(CpuTicks::default(), CpuTicks::default(), MemorySnapshot::default())
    }

    pub fn new(before: CpuTicks, after: CpuTicks, memory: MemorySnapshot) -> Self {
        Self {
            before,
            after,
            memory,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SystemProbe for FixedProbe {
    async fn cpu_ticks(&self) -> Result<CpuTicks> {
        // even calls open a cycle, odd calls close it
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(if call % 2 == 0 { self.before } else { self.after })
    }

    async fn memory(&self) -> Result<MemorySnapshot> {
        Ok(self.memory)
    }
}

pub fn config(json: Value) -> Config {
    Config::from_json(&json.to_string()).unwrap()
}

/// Configuration with the given services and no notification backends
pub fn services_config(services: Value, check_interval: i64, backoff: i64) -> Config {
    config(serde_json::json!({
        "services": services,
        "settings": {
            "monitor": {
                "checkInterval": check_interval,
                "exponentialBackoffSeconds": backoff
            }
        }
    }))
}

pub fn notifiers(backends: Vec<Arc<dyn Notifier>>) -> Notifiers {
    Notifiers::new(backends).with_timeout(Duration::from_secs(1))
}

/// Initialized and started engine
pub async fn start_engine(
    config: Config,
    manager: Arc<MockServiceManager>,
    notifiers: Notifiers,
) -> MonitorEngine {
    let mut engine = MonitorEngine::new(config, manager, Arc::new(FixedProbe::idle()), notifiers);
    engine.initialize().await.unwrap();
    engine.start().unwrap();
    engine
}
