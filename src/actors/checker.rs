//! CheckerActor - Executes health checks
//!
//! The checker consumes check requests from every scheduler and runs each check
//! as its own task, so a hung service manager call for one service never blocks
//! another service. Every service manager call is bounded by the service's call
//! timeout. At most one check per service executes at a time: a request that
//! arrives while the previous check of the same service is still running waits
//! until that check ends, and only the newest waiting request is kept.
//!
//! ## Check Flow
//!
//! ```text
//! CheckRequest → is_running ┐
//!              → fetch_logs ┴→ pattern match → notify (fire-and-forget)
//!                           → record sample in StatusStore
//!                           → down: save logs, restart, DownEvent → [TrackerActor]
//!                           → up:   reset backoff if it had fired
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::{self, JoinSet};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::backoff::BackoffGate;
use crate::config::ResolvedService;
use crate::notify::Notifiers;
use crate::service::ServiceManager;
use crate::status::StatusStore;

use super::messages::{CheckOutcome, CheckRequest, CheckerCommand, DownEvent};

/// Everything a single check needs, shared by all check tasks
pub struct CheckContext {
    pub manager: Arc<dyn ServiceManager>,
    pub store: StatusStore,
    pub gate: BackoffGate,
    pub notifiers: Notifiers,
    pub down_tx: mpsc::UnboundedSender<DownEvent>,
}

/// Run one health check for `service`
///
/// Collaborator failures are logged and degrade the outcome; they never
/// propagate.
#[instrument(skip_all, fields(service = %service.name))]
pub async fn run_check(ctx: &CheckContext, service: &ResolvedService) -> CheckOutcome {
    trace!("checking service");

    let liveness = bounded(service, "liveness query", ctx.manager.is_running(&service.name));
    let logs = async {
        match &service.pattern {
            Some(_) => Some(
                bounded(service, "log fetch", ctx.manager.fetch_logs(&service.name)).await,
            ),
            None => None,
        }
    };
    let (liveness, logs) = tokio::join!(liveness, logs);

    let up = liveness.unwrap_or_else(|e| {
        warn!("liveness query failed, treating as down: {:#}", e);
        false
    });

    let logs = match logs {
        Some(Ok(logs)) => Some(logs),
        Some(Err(e)) => {
            warn!("failed to fetch logs: {:#}", e);
            None
        }
        None => None,
    };

    let mut pattern_matched = false;
    if let (Some(pattern), Some(logs)) = (&service.pattern, &logs)
        && pattern.is_match(logs)
    {
        pattern_matched = true;
        let message = format!(
            "Found `{}` pattern in {} service logs",
            pattern.as_str(),
            service.name
        );
        info!("{message}");
        ctx.notifiers.spawn_notify_all(message);
    }

    let timestamp = Utc::now();
    ctx.store.record(&service.name, timestamp, up).await;

    let mut outcome = CheckOutcome {
        service: service.name.clone(),
        timestamp,
        up,
        pattern_matched,
        restarted: None,
        skipped: false,
    };

    if up {
        debug!("service is up");
        ctx.gate.reset_if_fired(&service.name).await;
        return outcome;
    }

    error!("service is down");

    if service.save_logs_on_stop {
        save_logs(ctx, service, logs).await;
    }

    if service.restart_if_down {
        info!("restarting service");
        let restarted = match bounded(service, "restart", ctx.manager.restart(&service.name)).await {
            Ok(true) => {
                info!("service restarted");
                true
            }
            Ok(false) => {
                error!("failed to restart service");
                false
            }
            Err(e) => {
                error!("failed to restart service: {:#}", e);
                false
            }
        };
        outcome.restarted = Some(restarted);
    } else {
        debug!("restart if down is off");
    }

    let event = DownEvent {
        service: service.name.clone(),
        timestamp,
    };
    if let Err(e) = ctx.down_tx.send(event) {
        error!("alert tracker is gone, dropping down event: {}", e);
    }

    outcome
}

/// Await a service manager call, failing once the service's call timeout elapsed
async fn bounded<T>(
    service: &ResolvedService,
    what: &str,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(service.call_timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(anyhow!("{what} timed out after {:?}", service.call_timeout)),
    }
}

async fn save_logs(ctx: &CheckContext, service: &ResolvedService, logs: Option<String>) {
    let logs = match logs {
        Some(logs) => logs,
        None => match bounded(service, "log fetch", ctx.manager.fetch_logs(&service.name)).await {
            Ok(logs) => logs,
            Err(e) => {
                error!("failed to fetch logs for saving: {:#}", e);
                return;
            }
        },
    };

    let persisted = bounded(
        service,
        "log persist",
        ctx.manager.persist_logs(&service.name, &logs),
    );
    match persisted.await {
        Ok(path) => info!("saved logs to {}", path.display()),
        Err(e) => error!("failed to save logs: {:#}", e),
    }
}

/// Check state of one service
#[derive(Default)]
struct ServiceSlot {
    running: bool,

    /// Newest request that arrived while a check was running
    pending: Option<CheckRequest>,
}

/// Actor that fans check requests out into check tasks
pub struct CheckerActor {
    ctx: Arc<CheckContext>,

    request_rx: mpsc::UnboundedReceiver<CheckRequest>,

    command_rx: mpsc::Receiver<CheckerCommand>,

    slots: HashMap<String, ServiceSlot>,

    /// Service checked by each running task
    running: HashMap<task::Id, String>,

    /// Running check tasks, aborted when the actor stops
    tasks: JoinSet<()>,
}

impl CheckerActor {
    pub fn new(
        ctx: CheckContext,
        request_rx: mpsc::UnboundedReceiver<CheckRequest>,
        command_rx: mpsc::Receiver<CheckerCommand>,
    ) -> Self {
        Self {
            ctx: Arc::new(ctx),
            request_rx,
            command_rx,
            slots: HashMap::new(),
            running: HashMap::new(),
            tasks: JoinSet::new(),
        }
    }

    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting checker actor");

        loop {
            tokio::select! {
                Some(request) = self.request_rx.recv() => {
                    self.dispatch(request);
                }

                Some(result) = self.tasks.join_next_with_id(), if !self.tasks.is_empty() => {
                    let id = match result {
                        Ok((id, ())) => id,
                        Err(e) => {
                            error!("check task failed: {}", e);
                            e.id()
                        }
                    };
                    self.finished(id);
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        CheckerCommand::InFlight { respond_to } => {
                            let _ = respond_to.send(self.tasks.len());
                        }

                        CheckerCommand::Shutdown => {
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

        if !self.tasks.is_empty() {
            debug!("abandoning {} in-flight checks", self.tasks.len());
        }
        self.tasks.shutdown().await;
        debug!("checker actor stopped");
    }

    fn dispatch(&mut self, request: CheckRequest) {
        let slot = self.slots.entry(request.service.name.clone()).or_default();

        if slot.running {
            match slot.pending.replace(request) {
                Some(stale) => {
                    warn!(
                        "{}: check still running, dropping waiting request from {}",
                        stale.service.name, stale.requested_at
                    );
                    if let Some(respond_to) = stale.respond_to {
                        let _ = respond_to.send(CheckOutcome::skipped(&stale.service.name));
                    }
                }
                None => trace!("check still running, request queued"),
            }
            return;
        }
        slot.running = true;

        let CheckRequest {
            service,
            respond_to,
            ..
        } = request;

        let name = service.name.clone();
        let ctx = Arc::clone(&self.ctx);
        let handle = self.tasks.spawn(async move {
            let outcome = run_check(&ctx, &service).await;

            if let Some(respond_to) = respond_to {
                let _ = respond_to.send(outcome);
            }
        });
        self.running.insert(handle.id(), name);
    }

    /// Release the service of a finished task and start its waiting request
    fn finished(&mut self, id: task::Id) {
        let Some(name) = self.running.remove(&id) else {
            return;
        };

        let next = self.slots.get_mut(&name).and_then(|slot| {
            slot.running = false;
            slot.pending.take()
        });

        if let Some(request) = next {
            debug!("{name}: starting queued check from {}", request.requested_at);
            self.dispatch(request);
        }
    }
}

/// Handle for controlling the CheckerActor
#[derive(Clone)]
pub struct CheckerHandle {
    sender: mpsc::Sender<CheckerCommand>,
}

impl CheckerHandle {
    pub fn spawn(ctx: CheckContext, request_rx: mpsc::UnboundedReceiver<CheckRequest>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        tokio::spawn(CheckerActor::new(ctx, request_rx, cmd_rx).run());

        Self { sender: cmd_tx }
    }

    /// Number of checks currently executing, `None` if the checker stopped
    pub async fn in_flight(&self) -> Option<usize> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(CheckerCommand::InFlight { respond_to: tx })
            .await
            .ok()?;

        rx.await.ok()
    }

    pub async fn shutdown(&self) {
        let _ = self.sender.send(CheckerCommand::Shutdown).await;
    }
}
