//! TrackerActor - Backoff-gated service alerts
//!
//! Single consumer of the checker's down events. Because every gate decision
//! for every service passes through this one loop, two near-simultaneous
//! failures of the same service can never both pass the gate.
//!
//! ## Gate
//!
//! ```text
//! DownEvent(now) → now <  next_allowed_at → suppressed, state untouched
//!                → now >= next_allowed_at → alert, delay doubles,
//!                                           next_allowed_at = now + delay
//! ```

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument, trace, warn};

use crate::backoff::{BackoffGate, BackoffState, GateDecision};
use crate::notify::Notifiers;

use super::messages::{DownEvent, TrackerCommand};

/// Alert text for a service that failed its check
pub fn down_message(service: &str) -> String {
    format!("Service {service} is down")
}

/// Actor that decides which down events turn into alerts
pub struct TrackerActor {
    gate: BackoffGate,

    notifiers: Notifiers,

    down_rx: mpsc::UnboundedReceiver<DownEvent>,

    command_rx: mpsc::Receiver<TrackerCommand>,
}

impl TrackerActor {
    pub fn new(
        gate: BackoffGate,
        notifiers: Notifiers,
        down_rx: mpsc::UnboundedReceiver<DownEvent>,
        command_rx: mpsc::Receiver<TrackerCommand>,
    ) -> Self {
        Self {
            gate,
            notifiers,
            down_rx,
            command_rx,
        }
    }

    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting tracker actor");

        loop {
            tokio::select! {
                Some(event) = self.down_rx.recv() => {
                    self.handle_down_event(event).await;
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        TrackerCommand::GetState { service, respond_to } => {
                            let _ = respond_to.send(self.gate.state(&service).await);
                        }

                        TrackerCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }

                else => {
                    warn!("all channels closed, shutting down");
                    break;
                }
            }
        }

        debug!("tracker actor stopped");
    }

    #[instrument(skip(self, event), fields(service = %event.service))]
    async fn handle_down_event(&self, event: DownEvent) {
        match self.gate.try_fire(&event.service, event.timestamp).await {
            GateDecision::Fire {
                delay_secs,
                next_allowed_at,
            } => {
                info!(
                    "alerting, next alert allowed after {} ({}s)",
                    next_allowed_at, delay_secs
                );
                self.notifiers.spawn_notify_all(down_message(&event.service));
            }

            GateDecision::Suppressed { next_allowed_at } => {
                trace!("alert suppressed until {}", next_allowed_at);
            }
        }
    }
}

/// Handle for controlling the TrackerActor
#[derive(Clone)]
pub struct TrackerHandle {
    sender: mpsc::Sender<TrackerCommand>,
}

impl TrackerHandle {
    pub fn spawn(
        gate: BackoffGate,
        notifiers: Notifiers,
        down_rx: mpsc::UnboundedReceiver<DownEvent>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = TrackerActor::new(gate, notifiers, down_rx, cmd_rx);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Backoff state of a service, `None` if unknown or the tracker stopped
    pub async fn get_state(&self, service: impl Into<String>) -> Option<BackoffState> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(TrackerCommand::GetState {
                service: service.into(),
                respond_to: tx,
            })
            .await
            .ok()?;

        rx.await.ok()?
    }

    pub async fn shutdown(&self) {
        let _ = self.sender.send(TrackerCommand::Shutdown).await;
    }
}
