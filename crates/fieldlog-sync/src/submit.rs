//! # Submission Path
//!
//! What happens when a technician presses "save".
//!
//! ```text
//!   LogSheet
//!      │
//!      ▼
//!   validate ──── invalid ──► SubmitError::Invalid      (nothing stored)
//!      │
//!      ▼
//!   outbox.put(pending) ── fails ──► SubmitError::PersistFailed
//!      │
//!      ├── offline, or optimistic send disabled ──► Queued
//!      │
//!      ▼
//!   engine.deliver_one ── ok ──► Delivered
//!                       └ err ─► Queued { reason }   (record stays pending)
//! ```
//!
//! The local write completes before any network activity. A send failure
//! after that is never surfaced as a submission failure.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use fieldlog_core::{validation, LogSheet, QueuedRecord, RecordId, ValidationError};
use fieldlog_db::{Database, DbError};

use crate::connectivity::ConnectivityMonitor;
use crate::engine::SyncEngine;

/// What became of a submitted log sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// Stored locally and confirmed by the acceptor.
    Delivered { id: RecordId },
    /// Stored locally; a later flush will deliver it.
    Queued {
        id: RecordId,
        reason: Option<String>,
    },
}

impl SubmitOutcome {
    pub fn id(&self) -> &RecordId {
        match self {
            SubmitOutcome::Delivered { id } | SubmitOutcome::Queued { id, .. } => id,
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, SubmitOutcome::Delivered { .. })
    }
}

/// Submission failed and nothing was queued.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Invalid log sheet: {0}")]
    Invalid(#[from] ValidationError),

    #[error("Could not save log sheet locally: {0}")]
    PersistFailed(#[from] DbError),
}

/// Turns form submissions into durable outbox records.
#[derive(Clone)]
pub struct Submitter {
    db: Database,
    engine: Arc<SyncEngine>,
    monitor: Arc<ConnectivityMonitor>,
    optimistic_send: bool,
}

impl Submitter {
    pub fn new(
        db: Database,
        engine: Arc<SyncEngine>,
        monitor: Arc<ConnectivityMonitor>,
        optimistic_send: bool,
    ) -> Self {
        Submitter {
            db,
            engine,
            monitor,
            optimistic_send,
        }
    }

    /// Validates, persists, then tries an immediate send if online.
    pub async fn submit(&self, sheet: LogSheet) -> Result<SubmitOutcome, SubmitError> {
        validation::validate_log_sheet(&sheet)?;

        let record = QueuedRecord::new(sheet);
        self.db.outbox().put(&record).await?;

        info!(
            id = %record.id,
            station = %record.payload.station_code,
            "Log sheet queued"
        );

        if !self.optimistic_send || !self.monitor.is_online() {
            debug!(id = %record.id, "Skipping immediate send");
            return Ok(SubmitOutcome::Queued {
                id: record.id,
                reason: None,
            });
        }

        match self.engine.deliver_one(&record).await {
            Ok(true) => Ok(SubmitOutcome::Delivered { id: record.id }),
            Ok(false) => Ok(SubmitOutcome::Queued {
                id: record.id,
                reason: Some("not confirmed by acceptor".to_string()),
            }),
            Err(e) => {
                warn!(id = %record.id, error = %e, "Immediate send failed, record stays queued");
                Ok(SubmitOutcome::Queued {
                    id: record.id,
                    reason: Some(e.to_string()),
                })
            }
        }
    }
}
