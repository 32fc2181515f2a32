//! Shared fixtures for the delivery tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Notify;

use fieldlog_core::{LogSheet, QueuedRecord, RecordId};
use fieldlog_db::{Database, DbConfig};
use fieldlog_sync::{BatchAck, RecordOutcome, RemoteAcceptor, SyncError, SyncResult};

// ============================================================================
// In-memory acceptor
// ============================================================================

/// Acceptor that dedupes on record id, like a real server would.
#[derive(Default)]
pub struct MemoryAcceptor {
    held: Mutex<HashMap<RecordId, LogSheet>>,
    batches: Mutex<Vec<Vec<RecordId>>>,

    /// Refuse every batch before storing anything.
    pub unreachable: AtomicBool,
    /// Store the batch, then fail as if the response was lost.
    pub lose_ack: AtomicBool,
    /// Answer with per-record outcomes instead of a blanket ack.
    pub per_record: AtomicBool,

    /// When armed, the next submit announces itself on `entered` and
    /// waits for `release`.
    gate_armed: AtomicBool,
    pub entered: Notify,
    pub release: Notify,
}

impl MemoryAcceptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm_gate(&self) {
        self.gate_armed.store(true, Ordering::SeqCst);
    }

    pub fn held_count(&self) -> usize {
        self.held.lock().unwrap().len()
    }

    pub fn holds(&self, id: &RecordId) -> bool {
        self.held.lock().unwrap().contains_key(id)
    }

    pub fn batches(&self) -> Vec<Vec<RecordId>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn sent_ids(&self) -> Vec<RecordId> {
        self.batches().into_iter().flatten().collect()
    }
}

#[async_trait]
impl RemoteAcceptor for MemoryAcceptor {
    async fn submit(&self, batch: &[QueuedRecord]) -> SyncResult<BatchAck> {
        if self.gate_armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }

        self.batches
            .lock()
            .unwrap()
            .push(batch.iter().map(|r| r.id.clone()).collect());

        if self.unreachable.load(Ordering::SeqCst) {
            return Err(SyncError::ConnectionFailed("network unreachable".into()));
        }

        let outcomes: Vec<RecordOutcome> = {
            let mut held = self.held.lock().unwrap();
            batch
                .iter()
                .map(|r| {
                    if held.contains_key(&r.id) {
                        RecordOutcome::duplicate(r.id.clone())
                    } else {
                        held.insert(r.id.clone(), r.payload.clone());
                        RecordOutcome::accepted(r.id.clone())
                    }
                })
                .collect()
        };

        if self.lose_ack.load(Ordering::SeqCst) {
            return Err(SyncError::Timeout("response lost".into()));
        }

        if self.per_record.load(Ordering::SeqCst) {
            Ok(BatchAck::PerRecord(outcomes))
        } else {
            Ok(BatchAck::Accepted)
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

pub async fn memory_db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

pub fn sheet(station: &str) -> LogSheet {
    LogSheet::new(station, NaiveDate::from_ymd_opt(2024, 6, 14).unwrap())
        .with_notes("Routine visit")
}

pub async fn queue(db: &Database, station: &str) -> QueuedRecord {
    let record = QueuedRecord::new(sheet(station));
    db.outbox().put(&record).await.unwrap();
    record
}
