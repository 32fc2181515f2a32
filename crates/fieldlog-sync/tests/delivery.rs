//! End-to-end delivery tests for the outbox, engine and agent.
//!
//! These drive a real SQLite outbox against an in-memory acceptor and check
//! the guarantees a field device relies on: nothing is lost, nothing is
//! stored twice, and delivery follows creation order.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use common::{memory_db, queue, sheet, MemoryAcceptor};
use fieldlog_core::{QueuedRecord, RecordStatus};
use fieldlog_db::{Database, DbConfig};
use fieldlog_sync::{
    ConnectivityMonitor, FlushOutcome, ReachabilityProbe, SubmitOutcome, Submitter, SyncAgent,
    SyncConfig, SyncEngine,
};

fn engine(db: &Database, acceptor: &Arc<MemoryAcceptor>, batch_size: usize) -> Arc<SyncEngine> {
    Arc::new(SyncEngine::new(db.clone(), acceptor.clone(), batch_size))
}

// ============================================================================
// Idempotence
// ============================================================================

/// A lost acknowledgement causes a resend, but the acceptor keeps one copy.
#[tokio::test]
async fn test_lost_ack_does_not_duplicate() {
    let db = memory_db().await;
    let acceptor = Arc::new(MemoryAcceptor::new());
    acceptor.per_record.store(true, Ordering::SeqCst);
    let engine = engine(&db, &acceptor, 10);

    let a = queue(&db, "STN-A").await;
    let b = queue(&db, "STN-B").await;

    acceptor.lose_ack.store(true, Ordering::SeqCst);
    let first = engine.flush().await;
    assert!(first.needs_retry());
    assert_eq!(db.outbox().list_eligible().await.unwrap().len(), 2);

    acceptor.lose_ack.store(false, Ordering::SeqCst);
    let second = engine.flush().await;
    assert_eq!(second.outcome, FlushOutcome::Delivered);

    assert_eq!(acceptor.held_count(), 2);
    assert_eq!(acceptor.sent_ids(), vec![a.id.clone(), b.id.clone(), a.id, b.id]);
}

/// Flushing an already delivered outbox sends nothing.
#[tokio::test]
async fn test_repeated_flush_sends_once() {
    let db = memory_db().await;
    let acceptor = Arc::new(MemoryAcceptor::new());
    let engine = engine(&db, &acceptor, 10);

    queue(&db, "STN-A").await;

    assert_eq!(engine.flush().await.synced, 1);
    assert_eq!(engine.flush().await.outcome, FlushOutcome::Idle);
    assert_eq!(acceptor.batches().len(), 1);
}

// ============================================================================
// Durability
// ============================================================================

/// Records queued before a restart are delivered after it.
#[tokio::test]
async fn test_outbox_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("outbox.db");

    let (queued, synced, failed) = {
        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        let a = queue(&db, "STN-A").await;
        let b = queue(&db, "STN-B").await;
        let c = queue(&db, "STN-C").await;
        let d = queue(&db, "STN-D").await;
        db.outbox()
            .mark(&c.id, RecordStatus::Synced, None)
            .await
            .unwrap();
        db.outbox()
            .mark(&d.id, RecordStatus::Error, Some("unknown station"))
            .await
            .unwrap();
        db.close().await;
        (vec![a.id, b.id], c.id, d.id)
    };

    let db = Database::new(DbConfig::new(&path)).await.unwrap();
    let pending = db.outbox().list_by_status(RecordStatus::Pending).await.unwrap();
    assert_eq!(
        pending.iter().map(|r| r.id.clone()).collect::<Vec<_>>(),
        queued
    );
    assert_eq!(pending[0].payload, sheet("STN-A"));

    let c = db.outbox().get(&synced).await.unwrap().unwrap();
    assert_eq!(c.status, RecordStatus::Synced);
    assert!(c.synced_at.is_some());
    assert_eq!(c.payload, sheet("STN-C"));

    let d = db.outbox().get(&failed).await.unwrap().unwrap();
    assert_eq!(d.status, RecordStatus::Error);
    assert_eq!(d.last_error.as_deref(), Some("unknown station"));
    assert_eq!(d.attempts, 1);

    let acceptor = Arc::new(MemoryAcceptor::new());
    let report = engine(&db, &acceptor, 10).flush().await;

    // Synced stays put; the errored record is resent in queue order.
    let mut expected = queued.clone();
    expected.push(failed);
    assert_eq!(report.synced, 3);
    assert_eq!(acceptor.sent_ids(), expected);
}

// ============================================================================
// No loss on failure
// ============================================================================

#[tokio::test]
async fn test_unreachable_acceptor_loses_nothing() {
    let db = memory_db().await;
    let acceptor = Arc::new(MemoryAcceptor::new());
    acceptor.unreachable.store(true, Ordering::SeqCst);
    let engine = engine(&db, &acceptor, 10);

    for station in ["STN-A", "STN-B", "STN-C"] {
        queue(&db, station).await;
    }

    for _ in 0..3 {
        let report = engine.flush().await;
        assert!(report.needs_retry());
        assert_eq!(report.synced, 0);
    }

    let records = db.outbox().list_eligible().await.unwrap();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.status == RecordStatus::Pending));
    assert!(records.iter().all(|r| r.attempts == 3));

    acceptor.unreachable.store(false, Ordering::SeqCst);
    assert_eq!(engine.flush().await.synced, 3);
    assert_eq!(acceptor.held_count(), 3);
}

// ============================================================================
// Ordering and snapshot isolation
// ============================================================================

#[tokio::test]
async fn test_delivery_follows_creation_order() {
    let db = memory_db().await;
    let acceptor = Arc::new(MemoryAcceptor::new());
    let engine = engine(&db, &acceptor, 3);

    let mut expected = Vec::new();
    for i in 0..8 {
        expected.push(queue(&db, &format!("STN-{}", i)).await.id);
    }

    let report = engine.flush().await;

    assert_eq!(report.synced, 8);
    assert_eq!(acceptor.batches().len(), 3);
    assert_eq!(acceptor.sent_ids(), expected);
}

/// A record queued while a flush is in flight is left for the next flush.
#[tokio::test]
async fn test_record_queued_mid_flush_waits() {
    let db = memory_db().await;
    let acceptor = Arc::new(MemoryAcceptor::new());
    let engine = engine(&db, &acceptor, 10);

    let a = queue(&db, "STN-A").await;
    acceptor.arm_gate();

    let in_flight = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.flush().await })
    };

    acceptor.entered.notified().await;
    let late = queue(&db, "STN-LATE").await;
    acceptor.release.notify_one();

    let report = in_flight.await.unwrap();
    assert_eq!(report.attempted, 1);
    assert_eq!(acceptor.sent_ids(), vec![a.id.clone()]);

    let stored = db.outbox().get(&late.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RecordStatus::Pending);

    let next = engine.flush().await;
    assert_eq!(next.synced, 1);
    assert!(acceptor.holds(&late.id));
}

/// Concurrent flushes never send the same record twice.
#[tokio::test]
async fn test_concurrent_flushes_are_serialized() {
    let db = memory_db().await;
    let acceptor = Arc::new(MemoryAcceptor::new());
    let engine = engine(&db, &acceptor, 10);

    for station in ["STN-A", "STN-B"] {
        queue(&db, station).await;
    }

    let (first, second) = tokio::join!(engine.flush(), engine.flush());

    assert_eq!(first.synced + second.synced, 2);
    assert_eq!(acceptor.sent_ids().len(), 2);
}

// ============================================================================
// Submission and connectivity
// ============================================================================

struct Unreachable;

#[async_trait]
impl ReachabilityProbe for Unreachable {
    async fn probe(&self) -> bool {
        false
    }
}

/// Offline submissions queue up and go out when connectivity returns.
#[tokio::test]
async fn test_offline_then_online() {
    let db = memory_db().await;
    let acceptor = Arc::new(MemoryAcceptor::new());
    let engine = engine(&db, &acceptor, 10);
    let monitor = Arc::new(ConnectivityMonitor::new());

    let mut config = SyncConfig::default();
    config.sync.probe_interval_secs = 3600;

    let (agent, handle) = SyncAgent::new(&config, engine.clone(), monitor.clone(), Arc::new(Unreachable));
    tokio::spawn(agent.run());

    // Wait until the startup probe has marked us offline.
    for _ in 0..100 {
        if handle.status().await.connectivity == fieldlog_sync::Connectivity::Offline {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let submitter = Submitter::new(db.clone(), engine, monitor.clone(), true);
    let mut ids = Vec::new();
    for station in ["STN-A", "STN-B", "STN-C"] {
        match submitter.submit(sheet(station)).await.unwrap() {
            SubmitOutcome::Queued { id, .. } => ids.push(id),
            other => panic!("expected queued while offline, got {:?}", other),
        }
    }
    assert!(acceptor.batches().is_empty());

    monitor.report(true);

    for _ in 0..200 {
        if acceptor.held_count() == 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(acceptor.sent_ids(), ids);

    for _ in 0..200 {
        if db.outbox().count_by_status().await.unwrap().synced == 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(db.outbox().count_by_status().await.unwrap().synced, 3);

    handle.shutdown().await;
}

/// A failed immediate send leaves the record for the next flush.
#[tokio::test]
async fn test_failed_optimistic_send_is_flushed_later() {
    let db = memory_db().await;
    let acceptor = Arc::new(MemoryAcceptor::new());
    let engine = engine(&db, &acceptor, 10);
    let monitor = Arc::new(ConnectivityMonitor::new());
    monitor.report(true);

    acceptor.unreachable.store(true, Ordering::SeqCst);
    let submitter = Submitter::new(db.clone(), engine.clone(), monitor, true);
    let outcome = submitter.submit(sheet("STN-A")).await.unwrap();

    assert!(!outcome.is_delivered());
    let stored: QueuedRecord = db.outbox().get(outcome.id()).await.unwrap().unwrap();
    assert_eq!(stored.status, RecordStatus::Pending);

    acceptor.unreachable.store(false, Ordering::SeqCst);
    assert_eq!(engine.flush().await.synced, 1);
    assert!(acceptor.holds(outcome.id()));
}
