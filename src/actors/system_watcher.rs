//! SystemWatcherActor - Host CPU and memory thresholds
//!
//! Every period the watcher takes a CPU tick snapshot and a memory snapshot,
//! waits `sample_gap`, takes a second CPU snapshot and compares the result
//! against the configured ceilings. Each breach produces its own alert. There
//! is no gate here: a sustained breach alerts again on every cycle.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep};
use tracing::{debug, error, instrument, trace, warn};

use crate::notify::Notifiers;
use crate::system::{SystemProbe, SystemSample};

use super::messages::{UsageReport, WatcherCommand};

/// Pause between the two CPU tick snapshots of one cycle
pub const DEFAULT_SAMPLE_GAP: Duration = Duration::from_secs(3);

/// Alert ceilings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageLimits {
    /// Percent
    pub cpu_max: u32,
    pub memory_max_kb: u64,
}

/// Alert messages for every ceiling `sample` exceeds
pub fn evaluate_usage(sample: &SystemSample, limits: UsageLimits) -> Vec<String> {
    let mut alerts = Vec::new();

    if sample.cpu_usage_percent() > f64::from(limits.cpu_max) {
        alerts.push(format!(
            "CPU usage gone upper than {} percent!",
            limits.cpu_max
        ));
    }

    if sample.used_memory_kb() > limits.memory_max_kb {
        alerts.push(format!(
            "Memory usage gone upper than {}kB!",
            limits.memory_max_kb
        ));
    }

    alerts
}

pub struct SystemWatcherActor {
    probe: Arc<dyn SystemProbe>,
    limits: UsageLimits,
    notifiers: Notifiers,
    period: Duration,
    sample_gap: Duration,
    command_rx: mpsc::Receiver<WatcherCommand>,
}

impl SystemWatcherActor {
    pub fn new(
        probe: Arc<dyn SystemProbe>,
        limits: UsageLimits,
        notifiers: Notifiers,
        period: Duration,
        command_rx: mpsc::Receiver<WatcherCommand>,
    ) -> Self {
        Self {
            probe,
            limits,
            notifiers,
            period,
            sample_gap: DEFAULT_SAMPLE_GAP,
            command_rx,
        }
    }

    pub fn with_sample_gap(mut self, sample_gap: Duration) -> Self {
        self.sample_gap = sample_gap;
        self
    }

    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!(
            "starting system watcher, cpu max {}%, memory max {}kB",
            self.limits.cpu_max, self.limits.memory_max_kb
        );

        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.cycle().await {
                        error!("system usage sampling failed: {:#}", e);
                    }
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        WatcherCommand::SampleNow { respond_to } => {
                            let _ = respond_to.send(self.cycle().await);
                        }

                        WatcherCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }

                else => {
                    warn!("command channel closed, shutting down");
                    break;
                }
            }
        }

        debug!("system watcher stopped");
    }

    async fn sample(&self) -> Result<SystemSample> {
        let before = self.probe.cpu_ticks().await?;
        let memory = self.probe.memory().await?;
        sleep(self.sample_gap).await;
        let after = self.probe.cpu_ticks().await?;

        Ok(SystemSample {
            before,
            after,
            memory,
        })
    }

    /// One sampling cycle; alerts are dispatched without waiting for delivery
    async fn cycle(&self) -> Result<UsageReport> {
        let sample = self.sample().await?;
        let alerts = evaluate_usage(&sample, self.limits);

        trace!(
            "cpu {:.2}%, memory {}kB",
            sample.cpu_usage_percent(),
            sample.used_memory_kb()
        );

        for alert in &alerts {
            warn!("{alert}");
            self.notifiers.spawn_notify_all(alert.clone());
        }

        Ok(UsageReport {
            cpu_usage_percent: sample.cpu_usage_percent(),
            used_memory_kb: sample.used_memory_kb(),
            alerts,
        })
    }
}

/// Handle for controlling the SystemWatcherActor
#[derive(Clone)]
pub struct WatcherHandle {
    sender: mpsc::Sender<WatcherCommand>,
}

impl WatcherHandle {
    pub fn spawn(
        probe: Arc<dyn SystemProbe>,
        limits: UsageLimits,
        notifiers: Notifiers,
        period: Duration,
    ) -> Self {
        Self::spawn_with_gap(probe, limits, notifiers, period, DEFAULT_SAMPLE_GAP)
    }

    pub fn spawn_with_gap(
        probe: Arc<dyn SystemProbe>,
        limits: UsageLimits,
        notifiers: Notifiers,
        period: Duration,
        sample_gap: Duration,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = SystemWatcherActor::new(probe, limits, notifiers, period, cmd_rx)
            .with_sample_gap(sample_gap);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Run one cycle now and return what it measured
    pub async fn sample_now(&self) -> Result<UsageReport> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(WatcherCommand::SampleNow { respond_to: tx })
            .await
            .map_err(|_| anyhow!("system watcher is not running"))?;

        rx.await
            .map_err(|_| anyhow!("system watcher dropped the request"))?
    }

    pub async fn shutdown(&self) {
        let _ = self.sender.send(WatcherCommand::Shutdown).await;
    }
}
