//! SchedulerActor - Drives the periodic checks of one service
//!
//! Every service gets its own scheduler. It issues one check request right away
//! and then one per `check_interval`, forever. Requests are handed to the
//! checker through an unbounded queue, so a scheduler never waits for a check
//! to finish and never delays any other service's timer.
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick → CheckRequest → [CheckerActor]
//!     ↑
//!     └─── Commands (CheckNow, Shutdown)
//! ```

use std::sync::Arc;

use anyhow::{Result, anyhow};
use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, instrument, trace, warn};

use crate::config::ResolvedService;

use super::messages::{CheckOutcome, CheckRequest, SchedulerCommand};

/// Actor that schedules the checks of a single service
pub struct SchedulerActor {
    service: Arc<ResolvedService>,

    /// Command receiver for control messages
    command_rx: mpsc::Receiver<SchedulerCommand>,

    /// Queue consumed by the checker
    check_tx: mpsc::UnboundedSender<CheckRequest>,
}

impl SchedulerActor {
    pub fn new(
        service: Arc<ResolvedService>,
        command_rx: mpsc::Receiver<SchedulerCommand>,
        check_tx: mpsc::UnboundedSender<CheckRequest>,
    ) -> Self {
        Self {
            service,
            command_rx,
            check_tx,
        }
    }

    /// Run the actor's main loop
    ///
    /// Runs until a Shutdown command is received, the command channel closes,
    /// or the checker is gone.
    #[instrument(skip(self), fields(service = %self.service.name))]
    pub async fn run(mut self) {
        debug!(
            "starting scheduler, checking every {}s",
            self.service.check_interval
        );

        // the first tick completes immediately, which is the initial check
        let mut ticker = interval(self.service.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !self.issue(None) {
                        break;
                    }
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        SchedulerCommand::CheckNow { respond_to } => {
                            debug!("received CheckNow command");
                            if !self.issue(Some(respond_to)) {
                                break;
                            }
                        }

                        SchedulerCommand::Shutdown => {
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

        debug!("scheduler stopped");
    }

    /// Hand a check request to the checker, false if the checker is gone
    fn issue(&self, respond_to: Option<oneshot::Sender<CheckOutcome>>) -> bool {
        trace!("issuing check request");

        let request = CheckRequest {
            service: Arc::clone(&self.service),
            requested_at: Utc::now(),
            respond_to,
        };

        if let Err(e) = self.check_tx.send(request) {
            error!("checker is gone, dropping check request: {}", e);
            return false;
        }

        true
    }
}

/// Handle for controlling a SchedulerActor
#[derive(Clone)]
pub struct SchedulerHandle {
    sender: mpsc::Sender<SchedulerCommand>,
    service_name: String,
}

impl SchedulerHandle {
    /// Spawn a new scheduler for `service`
    pub fn spawn(
        service: Arc<ResolvedService>,
        check_tx: mpsc::UnboundedSender<CheckRequest>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let service_name = service.name.clone();

        let actor = SchedulerActor::new(service, cmd_rx, check_tx);

        tokio::spawn(actor.run());

        Self {
            sender: cmd_tx,
            service_name,
        }
    }

    /// Trigger a check now and wait for its outcome
    pub async fn check_now(&self) -> Result<CheckOutcome> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SchedulerCommand::CheckNow { respond_to: tx })
            .await
            .map_err(|_| anyhow!("scheduler for {} is not running", self.service_name))?;

        rx.await
            .map_err(|_| anyhow!("check for {} was abandoned", self.service_name))
    }

    /// Stop the scheduler
    pub async fn shutdown(&self) {
        let _ = self.sender.send(SchedulerCommand::Shutdown).await;
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}
