//! # Sync Engine
//!
//! One flush = one attempt to deliver every record that is eligible at the
//! moment the flush starts.
//!
//! ## Flush Cycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          flush()                                        │
//! │                                                                         │
//! │  acquire single-flight lock  (a second caller waits its turn)          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  snapshot = outbox.list_eligible()     pending + error, FIFO           │
//! │       │                                                                 │
//! │       ├── empty? ──► Idle (no network call)                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  for chunk in snapshot.chunks(batch_size):                             │
//! │       │                                                                 │
//! │       ├── Ok(Accepted)     ──► mark chunk synced                       │
//! │       ├── Ok(PerRecord)    ──► accepted/duplicate → synced             │
//! │       │                        rejected           → error(detail)      │
//! │       │                        not mentioned      → untouched          │
//! │       ├── BatchTooLarge    ──► resend as two halves, in order          │
//! │       └── Err(e)           ──► note last_error, statuses unchanged,    │
//! │                                stop (later chunks untouched)           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  FlushReport { attempted, synced, rejected, remaining, outcome }       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only ids from the snapshot are ever marked. A record queued while a
//! flush is in flight waits for the next one.
//!
//! `flush` never returns an error; failures become report metadata and log
//! lines.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use fieldlog_core::{QueuedRecord, RecordId, RecordStatus};
use fieldlog_db::Database;

use crate::acceptor::{BatchAck, RemoteAcceptor};
use crate::error::{SyncError, SyncResult};
use crate::protocol::{Outcome, RecordOutcome};

// =============================================================================
// Flush Report
// =============================================================================

/// How a flush ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FlushOutcome {
    /// Nothing was eligible; no request was made.
    Idle,
    /// Every record in the snapshot is now synced.
    Delivered,
    /// The acceptor answered, but some records were rejected or not
    /// mentioned.
    Partial,
    /// A request or a local write failed; unsent records are unchanged.
    Failed { reason: String, retryable: bool },
}

/// Result of one flush.
#[derive(Debug, Clone, Serialize)]
pub struct FlushReport {
    /// Records in the snapshot.
    pub attempted: usize,
    /// Records marked synced by this flush.
    pub synced: usize,
    /// Records marked error by this flush.
    pub rejected: usize,
    pub outcome: FlushOutcome,
    pub finished_at: DateTime<Utc>,
}

impl FlushReport {
    fn new(attempted: usize) -> Self {
        FlushReport {
            attempted,
            synced: 0,
            rejected: 0,
            outcome: FlushOutcome::Idle,
            finished_at: Utc::now(),
        }
    }

    fn failed(attempted: usize, err: &SyncError) -> Self {
        FlushReport {
            outcome: FlushOutcome::Failed {
                reason: err.to_string(),
                retryable: err.is_retryable(),
            },
            ..FlushReport::new(attempted)
        }
    }

    /// Snapshot records that are still eligible after this flush.
    pub fn remaining(&self) -> usize {
        self.attempted.saturating_sub(self.synced)
    }

    /// Idle or fully delivered.
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, FlushOutcome::Idle | FlushOutcome::Delivered)
    }

    /// A retry after a delay could plausibly succeed.
    pub fn needs_retry(&self) -> bool {
        matches!(self.outcome, FlushOutcome::Failed { retryable: true, .. })
    }

    /// The failure message, if the flush failed.
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            FlushOutcome::Failed { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Orchestrates flush cycles against a [`RemoteAcceptor`].
pub struct SyncEngine {
    db: Database,
    acceptor: Arc<dyn RemoteAcceptor>,
    batch_size: usize,
    /// Held for the whole flush cycle.
    flight: Mutex<()>,
}

impl SyncEngine {
    pub fn new(db: Database, acceptor: Arc<dyn RemoteAcceptor>, batch_size: usize) -> Self {
        SyncEngine {
            db,
            acceptor,
            batch_size: batch_size.max(1),
            flight: Mutex::new(()),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Attempts to deliver every currently eligible record.
    ///
    /// Safe to call concurrently: calls are serialized, and each one takes
    /// its own snapshot once it gets the lock.
    #[instrument(skip(self), name = "flush")]
    pub async fn flush(&self) -> FlushReport {
        let _guard = self.flight.lock().await;

        let snapshot = match self.db.outbox().list_eligible().await {
            Ok(records) => records,
            Err(e) => {
                let err = SyncError::from(e);
                warn!(error = %err, "Could not read outbox snapshot");
                return FlushReport::failed(0, &err);
            }
        };

        if snapshot.is_empty() {
            debug!("Nothing to flush");
            return FlushReport::new(0);
        }

        info!(count = snapshot.len(), "Flushing outbox");

        let mut report = FlushReport::new(snapshot.len());
        let mut partial = false;

        for chunk in snapshot.chunks(self.batch_size) {
            let mut result = ChunkResult::default();
            let delivered = self.deliver_fitting(chunk, &mut result).await;
            report.synced += result.synced;
            report.rejected += result.rejected;

            match delivered {
                Ok(()) => partial |= result.synced < chunk.len(),
                Err(err) => {
                    warn!(
                        error = %err,
                        retryable = err.is_retryable(),
                        unsent = report.attempted - report.synced - report.rejected,
                        "Flush stopped"
                    );
                    report.outcome = FlushOutcome::Failed {
                        reason: err.to_string(),
                        retryable: err.is_retryable(),
                    };
                    report.finished_at = Utc::now();
                    return report;
                }
            }
        }

        report.outcome = if partial {
            FlushOutcome::Partial
        } else {
            FlushOutcome::Delivered
        };
        report.finished_at = Utc::now();

        info!(
            synced = report.synced,
            rejected = report.rejected,
            remaining = report.remaining(),
            "Flush complete"
        );

        report
    }

    /// Sends a single record right away, outside the flush cycle.
    ///
    /// Used for the optimistic path after a record is queued while online.
    /// Returns `Ok(true)` once the record is marked synced, `Ok(false)` if
    /// the acceptor rejected it or did not mention it.
    pub async fn deliver_one(&self, record: &QueuedRecord) -> SyncResult<bool> {
        let mut result = ChunkResult::default();
        self.deliver_fitting(std::slice::from_ref(record), &mut result).await?;
        Ok(result.synced == 1)
    }

    /// Delivers a chunk, halving it for as long as the acceptor answers
    /// that it is too large. Halves go out in snapshot order and the first
    /// failure stops the rest; what was delivered before it stays counted
    /// in `total`.
    async fn deliver_fitting(
        &self,
        chunk: &[QueuedRecord],
        total: &mut ChunkResult,
    ) -> SyncResult<()> {
        let mut parts: Vec<&[QueuedRecord]> = vec![chunk];

        while let Some(part) = parts.pop() {
            match self.deliver_chunk(part).await {
                Ok(result) => {
                    total.synced += result.synced;
                    total.rejected += result.rejected;
                }
                Err(SyncError::BatchTooLarge { size }) if part.len() > 1 => {
                    warn!(size, "Batch too large for acceptor, splitting; lower sync.batch_size");
                    let (head, tail) = part.split_at(part.len() / 2);
                    parts.push(tail);
                    parts.push(head);
                }
                Err(err) => {
                    if err.is_config_error() {
                        error!(error = %err, "Delivery blocked by configuration");
                    }
                    let ids: Vec<RecordId> = part.iter().map(|r| r.id.clone()).collect();
                    if let Err(db_err) =
                        self.db.outbox().record_failure(&ids, &err.to_string()).await
                    {
                        warn!(error = %db_err, "Could not record delivery failure");
                    }
                    return Err(err);
                }
            }
        }

        Ok(())
    }

    /// Submits one chunk and applies the answer to the outbox.
    async fn deliver_chunk(&self, chunk: &[QueuedRecord]) -> SyncResult<ChunkResult> {
        let ids: Vec<RecordId> = chunk.iter().map(|r| r.id.clone()).collect();

        let ack = self.acceptor.submit(chunk).await?;

        match ack {
            BatchAck::Accepted => {
                self.db
                    .outbox()
                    .mark_batch(&ids, RecordStatus::Synced, None)
                    .await?;
                Ok(ChunkResult {
                    synced: ids.len(),
                    rejected: 0,
                })
            }
            BatchAck::PerRecord(outcomes) => self.apply_outcomes(&ids, outcomes).await,
        }
    }

    /// Applies per-record outcomes, restricted to ids that were sent.
    async fn apply_outcomes(
        &self,
        sent: &[RecordId],
        outcomes: Vec<RecordOutcome>,
    ) -> SyncResult<ChunkResult> {
        let sent_set: HashSet<&RecordId> = sent.iter().collect();
        let mut delivered = Vec::new();
        let mut rejected = 0;
        let mut seen = HashSet::new();

        for outcome in outcomes {
            if !sent_set.contains(&outcome.client_uuid) {
                warn!(id = %outcome.client_uuid, "Acceptor reported an id that was not sent");
                continue;
            }
            if !seen.insert(outcome.client_uuid.clone()) {
                continue;
            }

            match outcome.outcome {
                Outcome::Accepted | Outcome::Duplicate => delivered.push(outcome.client_uuid),
                Outcome::Rejected => {
                    let detail = outcome
                        .detail
                        .unwrap_or_else(|| "rejected by acceptor".to_string());
                    warn!(id = %outcome.client_uuid, detail = %detail, "Record rejected");
                    self.db
                        .outbox()
                        .mark(&outcome.client_uuid, RecordStatus::Error, Some(&detail))
                        .await?;
                    rejected += 1;
                }
            }
        }

        let unmentioned = sent.len() - seen.len();
        if unmentioned > 0 {
            debug!(unmentioned, "Records missing from acceptor response left untouched");
        }

        self.db
            .outbox()
            .mark_batch(&delivered, RecordStatus::Synced, None)
            .await?;

        Ok(ChunkResult {
            synced: delivered.len(),
            rejected,
        })
    }
}

#[derive(Default)]
struct ChunkResult {
    synced: usize,
    rejected: usize,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use fieldlog_core::LogSheet;
    use fieldlog_db::DbConfig;
    use std::sync::Mutex as StdMutex;

    /// Scripted acceptor: pops one canned answer per call, records batches.
    struct Scripted {
        answers: StdMutex<Vec<SyncResult<BatchAck>>>,
        batches: StdMutex<Vec<Vec<RecordId>>>,
    }

    impl Scripted {
        fn new(mut answers: Vec<SyncResult<BatchAck>>) -> Arc<Self> {
            answers.reverse();
            Arc::new(Scripted {
                answers: StdMutex::new(answers),
                batches: StdMutex::new(Vec::new()),
            })
        }

        fn batches(&self) -> Vec<Vec<RecordId>> {
            self.batches.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RemoteAcceptor for Scripted {
        async fn submit(&self, batch: &[QueuedRecord]) -> SyncResult<BatchAck> {
            self.batches
                .lock()
                .unwrap()
                .push(batch.iter().map(|r| r.id.clone()).collect());
            self.answers
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Ok(BatchAck::Accepted))
        }
    }

    async fn setup(
        answers: Vec<SyncResult<BatchAck>>,
        batch_size: usize,
    ) -> (SyncEngine, Arc<Scripted>, Database) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let acceptor = Scripted::new(answers);
        let engine = SyncEngine::new(db.clone(), acceptor.clone(), batch_size);
        (engine, acceptor, db)
    }

    async fn queue(db: &Database, station: &str) -> QueuedRecord {
        let record = QueuedRecord::new(LogSheet::new(
            station,
            NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
        ));
        db.outbox().put(&record).await.unwrap();
        record
    }

    #[tokio::test]
    async fn test_empty_flush_makes_no_request() {
        let (engine, acceptor, _db) = setup(vec![], 10).await;

        let report = engine.flush().await;

        assert_eq!(report.outcome, FlushOutcome::Idle);
        assert!(report.is_success());
        assert!(acceptor.batches().is_empty());
    }

    #[tokio::test]
    async fn test_chunks_are_sent_in_fifo_order() {
        let (engine, acceptor, db) = setup(vec![], 2).await;
        let a = queue(&db, "STN-A").await;
        let b = queue(&db, "STN-B").await;
        let c = queue(&db, "STN-C").await;

        let report = engine.flush().await;

        assert_eq!(report.outcome, FlushOutcome::Delivered);
        assert_eq!(report.synced, 3);
        assert_eq!(
            acceptor.batches(),
            vec![vec![a.id, b.id], vec![c.id]]
        );
    }

    #[tokio::test]
    async fn test_failed_chunk_stops_flush() {
        let (engine, acceptor, db) = setup(
            vec![
                Ok(BatchAck::Accepted),
                Err(SyncError::ConnectionFailed("down".into())),
            ],
            1,
        )
        .await;
        let a = queue(&db, "STN-A").await;
        let b = queue(&db, "STN-B").await;
        let c = queue(&db, "STN-C").await;

        let report = engine.flush().await;

        assert!(report.needs_retry());
        assert_eq!(report.synced, 1);
        assert_eq!(acceptor.batches().len(), 2);

        let outbox = db.outbox();
        assert_eq!(outbox.get(&a.id).await.unwrap().unwrap().status, RecordStatus::Synced);
        let b = outbox.get(&b.id).await.unwrap().unwrap();
        assert_eq!(b.status, RecordStatus::Pending);
        assert!(b.last_error.unwrap().contains("down"));
        let c = outbox.get(&c.id).await.unwrap().unwrap();
        assert_eq!(c.status, RecordStatus::Pending);
        assert_eq!(c.attempts, 0);
    }

    #[tokio::test]
    async fn test_per_record_outcomes() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let a = queue(&db, "STN-A").await;
        let b = queue(&db, "STN-B").await;
        let c = queue(&db, "STN-C").await;
        let d = queue(&db, "STN-D").await;

        let acceptor = Scripted::new(vec![Ok(BatchAck::PerRecord(vec![
            RecordOutcome::accepted(a.id.clone()),
            RecordOutcome::duplicate(b.id.clone()),
            RecordOutcome::rejected(c.id.clone(), "unknown station"),
            RecordOutcome::accepted(RecordId::generate()),
        ]))]);
        let engine = SyncEngine::new(db.clone(), acceptor, 10);

        let report = engine.flush().await;

        assert_eq!(report.outcome, FlushOutcome::Partial);
        assert_eq!(report.synced, 2);
        assert_eq!(report.rejected, 1);
        assert_eq!(report.remaining(), 2);

        let outbox = db.outbox();
        assert_eq!(outbox.get(&a.id).await.unwrap().unwrap().status, RecordStatus::Synced);
        assert_eq!(outbox.get(&b.id).await.unwrap().unwrap().status, RecordStatus::Synced);
        let c = outbox.get(&c.id).await.unwrap().unwrap();
        assert_eq!(c.status, RecordStatus::Error);
        assert_eq!(c.last_error.as_deref(), Some("unknown station"));
        let d = outbox.get(&d.id).await.unwrap().unwrap();
        assert_eq!(d.status, RecordStatus::Pending);
        assert_eq!(d.attempts, 0);
    }

    #[tokio::test]
    async fn test_rejected_records_are_retried_next_flush() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let a = queue(&db, "STN-A").await;

        let acceptor = Scripted::new(vec![
            Ok(BatchAck::PerRecord(vec![RecordOutcome::rejected(
                a.id.clone(),
                "server busy",
            )])),
            Ok(BatchAck::Accepted),
        ]);
        let engine = SyncEngine::new(db.clone(), acceptor.clone(), 10);

        assert_eq!(engine.flush().await.rejected, 1);
        let second = engine.flush().await;

        assert_eq!(second.outcome, FlushOutcome::Delivered);
        assert_eq!(acceptor.batches().len(), 2);
        assert!(db.outbox().list_eligible().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_chunk_is_split_in_order() {
        let (engine, acceptor, db) = setup(
            vec![
                Err(SyncError::BatchTooLarge { size: 4 }),
                Ok(BatchAck::Accepted),
                Ok(BatchAck::Accepted),
            ],
            4,
        )
        .await;
        let a = queue(&db, "STN-A").await;
        let b = queue(&db, "STN-B").await;
        let c = queue(&db, "STN-C").await;
        let d = queue(&db, "STN-D").await;

        let report = engine.flush().await;

        assert_eq!(report.outcome, FlushOutcome::Delivered);
        assert_eq!(report.synced, 4);
        assert_eq!(
            acceptor.batches(),
            vec![
                vec![a.id.clone(), b.id.clone(), c.id.clone(), d.id.clone()],
                vec![a.id.clone(), b.id.clone()],
                vec![c.id.clone(), d.id.clone()],
            ]
        );
        let a = db.outbox().get(&a.id).await.unwrap().unwrap();
        assert_eq!(a.status, RecordStatus::Synced);
        assert_eq!(a.attempts, 0);
    }

    #[tokio::test]
    async fn test_split_failure_keeps_earlier_halves() {
        let (engine, _acceptor, db) = setup(
            vec![
                Err(SyncError::BatchTooLarge { size: 2 }),
                Ok(BatchAck::Accepted),
                Err(SyncError::ConnectionFailed("down".into())),
            ],
            2,
        )
        .await;
        let a = queue(&db, "STN-A").await;
        let b = queue(&db, "STN-B").await;

        let report = engine.flush().await;

        assert!(report.needs_retry());
        assert_eq!(report.synced, 1);
        let outbox = db.outbox();
        assert_eq!(outbox.get(&a.id).await.unwrap().unwrap().status, RecordStatus::Synced);
        let b = outbox.get(&b.id).await.unwrap().unwrap();
        assert_eq!(b.status, RecordStatus::Pending);
        assert_eq!(b.attempts, 1);
    }

    #[tokio::test]
    async fn test_single_record_too_large_is_not_retryable() {
        let (engine, acceptor, db) =
            setup(vec![Err(SyncError::BatchTooLarge { size: 1 })], 10).await;
        let a = queue(&db, "STN-A").await;

        let report = engine.flush().await;

        assert!(!report.needs_retry());
        assert!(matches!(report.outcome, FlushOutcome::Failed { retryable: false, .. }));
        assert_eq!(acceptor.batches().len(), 1);
        let a = db.outbox().get(&a.id).await.unwrap().unwrap();
        assert_eq!(a.status, RecordStatus::Pending);
        assert_eq!(a.attempts, 1);
    }

    #[tokio::test]
    async fn test_deliver_one() {
        let (engine, _acceptor, db) = setup(
            vec![
                Ok(BatchAck::Accepted),
                Err(SyncError::Timeout("30s".into())),
            ],
            10,
        )
        .await;
        let a = queue(&db, "STN-A").await;
        let b = queue(&db, "STN-B").await;

        assert!(engine.deliver_one(&a).await.unwrap());
        assert!(engine.deliver_one(&b).await.is_err());

        let outbox = db.outbox();
        assert_eq!(outbox.get(&a.id).await.unwrap().unwrap().status, RecordStatus::Synced);
        assert_eq!(outbox.get(&b.id).await.unwrap().unwrap().status, RecordStatus::Pending);
    }
}
