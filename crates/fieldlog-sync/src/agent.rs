//! # Sync Agent
//!
//! Background task that decides *when* to flush. The engine decides *how*.
//!
//! ## Agent Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SyncAgent Loop                                   │
//! │                                                                         │
//! │  startup: probe ──► monitor.report() ──► monitor.check_now()           │
//! │                                                                         │
//! │  ┌──────────────────────── select! ─────────────────────────────────┐  │
//! │  │                                                                  │  │
//! │  │  BecameOnline event ─────────────► reset backoff, flush         │  │
//! │  │  WentOffline event  ─────────────► disarm retry                 │  │
//! │  │  probe tick         ─────────────► probe, report; if online,    │  │
//! │  │                                    nothing armed and records    │  │
//! │  │                                    eligible: flush (sweep)      │  │
//! │  │  retry deadline     ─────────────► flush if still online        │  │
//! │  │  Flush command      ─────────────► flush, reply with report     │  │
//! │  │  Shutdown command   ─────────────► exit                         │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  AFTER EACH FLUSH                                                      │
//! │  ────────────────                                                      │
//! │  Idle / Delivered   → backoff reset, no retry armed                    │
//! │  Partial / Failed   → retry armed at now + next backoff (if online)    │
//! │                       500ms, 1s, 2s, ... capped at max_backoff         │
//! │                                                                         │
//! │  STATUS EVENTS (to the embedding host):                                │
//! │  emit_status   - connectivity, counts, last flush                      │
//! │  emit_progress - { pending, synced }                                   │
//! │  emit_error    - { message, retryable }                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every trigger funnels into [`SyncEngine::flush`], which is single-flight,
//! so overlapping triggers queue up rather than double-send.

use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use fieldlog_core::StatusCounts;

use crate::config::SyncConfig;
use crate::connectivity::{Connectivity, ConnectivityEvent, ConnectivityMonitor, ReachabilityProbe};
use crate::engine::{FlushOutcome, FlushReport, SyncEngine};
use crate::error::{SyncError, SyncResult};

// =============================================================================
// Sync Status
// =============================================================================

/// Current sync status for external queries.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    /// Current connectivity belief.
    pub connectivity: Connectivity,

    pub is_online: bool,

    /// Outbox counts as of the last refresh.
    pub counts: StatusCounts,

    /// When the last flush that delivered anything finished.
    pub last_sync: Option<DateTime<Utc>>,

    /// Report of the most recent flush, whatever its outcome.
    pub last_report: Option<FlushReport>,

    /// Last error message (if any).
    pub last_error: Option<String>,

    /// Whether a backoff retry is armed.
    pub retry_pending: bool,
}

impl Default for SyncStatus {
    fn default() -> Self {
        SyncStatus {
            connectivity: Connectivity::Unknown,
            is_online: false,
            counts: StatusCounts::default(),
            last_sync: None,
            last_report: None,
            last_error: None,
            retry_pending: false,
        }
    }
}

// =============================================================================
// Event Emitter Trait
// =============================================================================

/// Receives sync notifications (implemented by whatever hosts the agent).
pub trait SyncEventEmitter: Send + Sync {
    /// Emits a sync status change event.
    fn emit_status(&self, status: &SyncStatus);

    /// Emits a sync progress event.
    fn emit_progress(&self, pending: i64, synced: i64);

    /// Emits a sync error event.
    fn emit_error(&self, message: &str, retryable: bool);
}

/// No-op event emitter.
pub struct NoOpEmitter;

impl SyncEventEmitter for NoOpEmitter {
    fn emit_status(&self, _status: &SyncStatus) {}
    fn emit_progress(&self, _pending: i64, _synced: i64) {}
    fn emit_error(&self, _message: &str, _retryable: bool) {}
}

// =============================================================================
// Commands
// =============================================================================

enum AgentCommand {
    Flush(oneshot::Sender<FlushReport>),
    Shutdown,
}

// =============================================================================
// Sync Agent
// =============================================================================

/// Owns the trigger loop. Create with [`SyncAgent::new`], then `run()` it
/// on a task and keep the [`SyncAgentHandle`].
pub struct SyncAgent {
    engine: Arc<SyncEngine>,
    monitor: Arc<ConnectivityMonitor>,
    probe: Arc<dyn ReachabilityProbe>,
    emitter: Arc<dyn SyncEventEmitter>,
    status: Arc<RwLock<SyncStatus>>,
    commands: mpsc::Receiver<AgentCommand>,

    probe_interval: Duration,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl SyncAgent {
    /// Creates an agent and the handle used to control it.
    pub fn new(
        config: &SyncConfig,
        engine: Arc<SyncEngine>,
        monitor: Arc<ConnectivityMonitor>,
        probe: Arc<dyn ReachabilityProbe>,
    ) -> (Self, SyncAgentHandle) {
        let (tx, rx) = mpsc::channel(16);
        let status = Arc::new(RwLock::new(SyncStatus::default()));

        let agent = SyncAgent {
            engine,
            monitor,
            probe,
            emitter: Arc::new(NoOpEmitter),
            status: status.clone(),
            commands: rx,
            probe_interval: config.probe_interval(),
            initial_backoff: Duration::from_millis(config.sync.initial_backoff_ms),
            max_backoff: Duration::from_secs(config.sync.max_backoff_secs),
        };

        (agent, SyncAgentHandle { commands: tx, status })
    }

    /// Replaces the event emitter.
    pub fn with_emitter(mut self, emitter: Arc<dyn SyncEventEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    /// Runs until shutdown is requested or every handle is dropped.
    pub async fn run(mut self) {
        let mut events = self.monitor.subscribe();
        let mut backoff = self.create_backoff();
        let mut retry_at: Option<Instant> = None;

        info!(
            probe_interval_secs = self.probe_interval.as_secs(),
            "Sync agent started"
        );

        let online = self.probe.probe().await;
        self.monitor.report(online);
        self.monitor.check_now();
        self.refresh_status(retry_at.is_some()).await;

        let mut ticker = interval(self.probe_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick fires immediately; startup already probed.
        ticker.tick().await;

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(ConnectivityEvent::BecameOnline) => {
                        backoff.reset();
                        self.flush(&mut backoff, &mut retry_at).await;
                    }
                    Ok(ConnectivityEvent::WentOffline) => {
                        retry_at = None;
                        self.refresh_status(false).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Connectivity events lagged");
                        if self.monitor.is_online() {
                            self.flush(&mut backoff, &mut retry_at).await;
                        }
                    }
                    Err(RecvError::Closed) => break,
                },

                _ = ticker.tick() => {
                    let online = self.probe.probe().await;
                    let transition = self.monitor.report(online);

                    if online && transition.is_none() && retry_at.is_none() && self.has_eligible().await {
                        debug!("Sweep found eligible records");
                        self.flush(&mut backoff, &mut retry_at).await;
                    } else {
                        self.refresh_status(retry_at.is_some()).await;
                    }
                }

                _ = sleep_until(retry_at.unwrap_or_else(Instant::now)), if retry_at.is_some() => {
                    retry_at = None;
                    if self.monitor.is_online() {
                        debug!("Backoff elapsed, retrying flush");
                        self.flush(&mut backoff, &mut retry_at).await;
                    }
                }

                command = self.commands.recv() => match command {
                    Some(AgentCommand::Flush(reply)) => {
                        let report = self.flush(&mut backoff, &mut retry_at).await;
                        let _ = reply.send(report);
                    }
                    Some(AgentCommand::Shutdown) | None => {
                        info!("Sync agent received shutdown");
                        break;
                    }
                },
            }
        }

        info!("Sync agent stopped");
    }

    /// Runs one flush and arms or clears the retry deadline.
    async fn flush(
        &self,
        backoff: &mut ExponentialBackoff,
        retry_at: &mut Option<Instant>,
    ) -> FlushReport {
        let report = self.engine.flush().await;

        if report.is_success() {
            backoff.reset();
            *retry_at = None;
        } else if self.monitor.is_online() {
            let delay = backoff.next_backoff().unwrap_or(self.max_backoff);
            debug!(delay_ms = delay.as_millis() as u64, "Retry armed");
            *retry_at = Some(Instant::now() + delay);
        } else {
            *retry_at = None;
        }

        if let FlushOutcome::Failed { reason, retryable } = &report.outcome {
            self.emitter.emit_error(reason, *retryable);
        }

        {
            let mut s = self.status.write().await;
            if report.synced > 0 {
                s.last_sync = Some(report.finished_at);
            }
            s.last_error = report.error().map(str::to_string);
            s.last_report = Some(report.clone());
        }
        self.refresh_status(retry_at.is_some()).await;

        report
    }

    async fn has_eligible(&self) -> bool {
        match self.engine.database().outbox().count_by_status().await {
            Ok(counts) => counts.eligible() > 0,
            Err(e) => {
                warn!(error = %e, "Could not count outbox records");
                false
            }
        }
    }

    /// Re-reads counts and connectivity, then notifies the emitter.
    async fn refresh_status(&self, retry_pending: bool) {
        let counts = match self.engine.database().outbox().count_by_status().await {
            Ok(counts) => Some(counts),
            Err(e) => {
                warn!(error = %e, "Could not count outbox records");
                None
            }
        };

        let snapshot = {
            let mut s = self.status.write().await;
            s.connectivity = self.monitor.state();
            s.is_online = self.monitor.is_online();
            s.retry_pending = retry_pending;
            if let Some(counts) = counts {
                s.counts = counts;
            }
            s.clone()
        };

        self.emitter
            .emit_progress(snapshot.counts.eligible(), snapshot.counts.synced);
        self.emitter.emit_status(&snapshot);
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_backoff,
            max_interval: self.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

// =============================================================================
// Agent Handle (for external control)
// =============================================================================

/// Cloneable handle for a running [`SyncAgent`].
#[derive(Clone)]
pub struct SyncAgentHandle {
    commands: mpsc::Sender<AgentCommand>,
    status: Arc<RwLock<SyncStatus>>,
}

impl SyncAgentHandle {
    /// Gets the current sync status.
    pub async fn status(&self) -> SyncStatus {
        self.status.read().await.clone()
    }

    /// Asks the agent to flush now and waits for the report.
    pub async fn request_flush(&self) -> SyncResult<FlushReport> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(AgentCommand::Flush(tx))
            .await
            .map_err(|_| SyncError::ShuttingDown)?;
        rx.await
            .map_err(|e| SyncError::ChannelError(e.to_string()))
    }

    /// Signals the agent to shut down gracefully.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(AgentCommand::Shutdown).await;
    }
}

// =============================================================================
// Tests
// =============================================================================
