//! # Outbox Repository
//!
//! The durable local store behind the sync queue: one row per record id,
//! surviving restarts, crashes and power loss.
//!
//! ## The Outbox Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Outbox Pattern Implementation                        │
//! │                                                                         │
//! │  submit(sheet)                                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  put(record{status: pending})     ← durable before returning           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 FLUSH (SyncEngine, async)                       │   │
//! │  │                                                                 │   │
//! │  │  1. list_eligible()           → snapshot, FIFO by seq          │   │
//! │  │  2. send snapshot to acceptor                                  │   │
//! │  │  3. mark_batch(snapshot ids, synced)                           │   │
//! │  │     or mark(id, error, reason) per rejected record             │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  KEY GUARANTEES:                                                       │
//! │  • put is an upsert keyed by id: at most one row per id                │
//! │  • payload never changes once written                                  │
//! │  • synced is terminal: no put or mark moves a row out of it            │
//! │  • rows added during a flush are not touched by that flush             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Concurrent writers on the same id are serialized by SQLite's write lock;
//! every operation here is a single statement or a single transaction.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use fieldlog_core::{LogSheet, QueuedRecord, RecordId, RecordStatus, StatusCounts};

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, FromRow)]
struct OutboxRow {
    id: String,
    payload: String,
    status: RecordStatus,
    last_error: Option<String>,
    attempts: i64,
    created_at: DateTime<Utc>,
    attempted_at: Option<DateTime<Utc>>,
    synced_at: Option<DateTime<Utc>>,
}

impl TryFrom<OutboxRow> for QueuedRecord {
    type Error = DbError;

    fn try_from(row: OutboxRow) -> Result<Self, Self::Error> {
        let payload: LogSheet = serde_json::from_str(&row.payload).map_err(|e| {
            DbError::Serialization(format!("payload of record {}: {}", row.id, e))
        })?;

        Ok(QueuedRecord {
            id: row.id.parse()?,
            payload,
            status: row.status,
            last_error: row.last_error,
            attempts: row.attempts,
            created_at: row.created_at,
            attempted_at: row.attempted_at,
            synced_at: row.synced_at,
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, payload, status, last_error, attempts,
           created_at, attempted_at, synced_at
    FROM sync_outbox
"#;

fn into_records(rows: Vec<OutboxRow>) -> DbResult<Vec<QueuedRecord>> {
    rows.into_iter().map(QueuedRecord::try_from).collect()
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for outbox operations.
#[derive(Debug, Clone)]
pub struct OutboxRepository {
    pool: SqlitePool,
}

impl OutboxRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OutboxRepository { pool }
    }

    /// Inserts or updates a record keyed by its id.
    ///
    /// ## Upsert Rules
    /// ```text
    /// id unknown                    → insert (new seq, FIFO position fixed)
    /// id known, same payload        → status/last_error take the new values
    ///                                 (unless the row is already synced)
    /// id known, different payload   → DbError::ImmutablePayload, row untouched
    /// ```
    ///
    /// Returns once the write is committed and synced to disk.
    pub async fn put(&self, record: &QueuedRecord) -> DbResult<()> {
        let payload = record.payload_json()?;

        debug!(
            id = %record.id,
            status = %record.status,
            "Putting record into outbox"
        );

        let result = sqlx::query(
            r#"
            INSERT INTO sync_outbox (
                id, payload, status, last_error, attempts,
                created_at, attempted_at, synced_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO UPDATE SET
                status = CASE
                    WHEN sync_outbox.status = 'synced' THEN sync_outbox.status
                    ELSE excluded.status
                END,
                last_error = CASE
                    WHEN sync_outbox.status = 'synced' THEN sync_outbox.last_error
                    ELSE excluded.last_error
                END,
                synced_at = COALESCE(sync_outbox.synced_at, excluded.synced_at)
            WHERE sync_outbox.payload = excluded.payload
            "#,
        )
        .bind(record.id.as_str())
        .bind(&payload)
        .bind(record.status)
        .bind(&record.last_error)
        .bind(record.attempts)
        .bind(record.created_at)
        .bind(record.attempted_at)
        .bind(record.synced_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            warn!(id = %record.id, "Rejected put with a different payload");
            return Err(DbError::ImmutablePayload {
                id: record.id.to_string(),
            });
        }

        Ok(())
    }

    /// Fetches a single record.
    pub async fn get(&self, id: &RecordId) -> DbResult<Option<QueuedRecord>> {
        let row: Option<OutboxRow> = sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE id = ?1"))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(QueuedRecord::try_from).transpose()
    }

    /// Returns every record in `status`, oldest first.
    ///
    /// The result is a point-in-time snapshot: records written after the
    /// query runs are not part of it.
    pub async fn list_by_status(&self, status: RecordStatus) -> DbResult<Vec<QueuedRecord>> {
        let rows: Vec<OutboxRow> =
            sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE status = ?1 ORDER BY seq ASC"))
                .bind(status)
                .fetch_all(&self.pool)
                .await?;

        into_records(rows)
    }

    /// Returns every record a flush should deliver (`pending` and `error`),
    /// oldest first, as one snapshot.
    pub async fn list_eligible(&self) -> DbResult<Vec<QueuedRecord>> {
        let rows: Vec<OutboxRow> = sqlx::query_as(&format!(
            "{SELECT_COLUMNS} WHERE status IN ('pending', 'error') ORDER BY seq ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        into_records(rows)
    }

    /// Returns the most recent records regardless of status, newest first.
    pub async fn list_recent(&self, limit: u32) -> DbResult<Vec<QueuedRecord>> {
        let rows: Vec<OutboxRow> =
            sqlx::query_as(&format!("{SELECT_COLUMNS} ORDER BY seq DESC LIMIT ?1"))
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;

        into_records(rows)
    }

    /// Atomically updates one record's status.
    ///
    /// ## Rules
    /// - `Synced` stamps `synced_at` and clears `last_error`
    /// - A failure (`Error`, or any status with an error message) increments
    ///   `attempts` and stamps `attempted_at`
    /// - A synced record is never moved back; such a call is a no-op
    /// - Unknown id → [`DbError::NotFound`]
    pub async fn mark(
        &self,
        id: &RecordId,
        status: RecordStatus,
        error: Option<&str>,
    ) -> DbResult<()> {
        let changed = mark_one(&self.pool, id, status, error, Utc::now()).await?;

        if changed == 0 {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM sync_outbox WHERE id = ?1)")
                    .bind(id.as_str())
                    .fetch_one(&self.pool)
                    .await?;

            if !exists {
                return Err(DbError::not_found("Record", id.as_str()));
            }

            debug!(id = %id, requested = %status, "Record already synced, mark ignored");
        }

        Ok(())
    }

    /// Applies the same status to many records in one transaction.
    ///
    /// Ids that no longer exist are skipped. Returns the number of rows that
    /// changed.
    pub async fn mark_batch(
        &self,
        ids: &[RecordId],
        status: RecordStatus,
        error: Option<&str>,
    ) -> DbResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let mut changed = 0;

        for id in ids {
            changed += mark_one(&mut *tx, id, status, error, now).await?;
        }

        tx.commit().await?;

        debug!(
            requested = ids.len(),
            changed,
            status = %status,
            "Marked batch"
        );

        Ok(changed)
    }

    /// Notes a failed delivery attempt without changing any status.
    ///
    /// Used when a whole batch fails: `last_error` and `attempts` change,
    /// pending rows stay pending, error rows stay error, synced rows are
    /// skipped. Returns the number of rows touched.
    pub async fn record_failure(&self, ids: &[RecordId], error: &str) -> DbResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let mut touched = 0;

        for id in ids {
            let result = sqlx::query(
                r#"
                UPDATE sync_outbox SET
                    last_error = ?2,
                    attempts = attempts + 1,
                    attempted_at = ?3
                WHERE id = ?1 AND status != 'synced'
                "#,
            )
            .bind(id.as_str())
            .bind(error)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            touched += result.rows_affected();
        }

        tx.commit().await?;
        Ok(touched)
    }

    /// Counts records per status.
    pub async fn count_by_status(&self) -> DbResult<StatusCounts> {
        let rows: Vec<(RecordStatus, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM sync_outbox GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        let mut counts = StatusCounts::default();
        for (status, n) in rows {
            match status {
                RecordStatus::Pending => counts.pending = n,
                RecordStatus::Synced => counts.synced = n,
                RecordStatus::Error => counts.error = n,
            }
        }

        Ok(counts)
    }

    /// Deletes synced records delivered more than `days_old` days ago.
    ///
    /// Never touches eligible records. Returns the number deleted.
    pub async fn prune_synced(&self, days_old: u32) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM sync_outbox
            WHERE status = 'synced'
              AND synced_at IS NOT NULL
              AND julianday(synced_at) < julianday('now', '-' || ?1 || ' days')
            "#,
        )
        .bind(days_old)
        .execute(&self.pool)
        .await?;

        debug!(days_old, deleted = result.rows_affected(), "Pruned synced records");

        Ok(result.rows_affected())
    }
}

/// Single-row status update shared by [`OutboxRepository::mark`] and
/// [`OutboxRepository::mark_batch`]. Returns rows changed (0 or 1).
async fn mark_one<'e, E>(
    executor: E,
    id: &RecordId,
    status: RecordStatus,
    error: Option<&str>,
    now: DateTime<Utc>,
) -> DbResult<u64>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let result = match status {
        RecordStatus::Synced => {
            sqlx::query(
                r#"
                UPDATE sync_outbox SET
                    status = 'synced',
                    last_error = NULL,
                    synced_at = ?2,
                    attempted_at = ?2
                WHERE id = ?1 AND status != 'synced'
                "#,
            )
            .bind(id.as_str())
            .bind(now)
            .execute(executor)
            .await?
        }
        RecordStatus::Pending | RecordStatus::Error => {
            let failed = status == RecordStatus::Error || error.is_some();
            sqlx::query(
                r#"
                UPDATE sync_outbox SET
                    status = ?2,
                    last_error = ?3,
                    attempts = attempts + ?4,
                    attempted_at = CASE WHEN ?4 > 0 THEN ?5 ELSE attempted_at END
                WHERE id = ?1 AND status != 'synced'
                "#,
            )
            .bind(id.as_str())
            .bind(status)
            .bind(error)
            .bind(i64::from(failed))
            .bind(now)
            .execute(executor)
            .await?
        }
    };

    Ok(result.rows_affected())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use chrono::{Duration, NaiveDate};

    async fn repo() -> OutboxRepository {
        Database::new(DbConfig::in_memory()).await.unwrap().outbox()
    }

    fn record(station: &str) -> QueuedRecord {
        QueuedRecord::new(LogSheet::new(
            station,
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let repo = repo().await;
        let rec = record("STN-1");

        repo.put(&rec).await.unwrap();

        let stored = repo.get(&rec.id).await.unwrap().unwrap();
        assert_eq!(stored.id, rec.id);
        assert_eq!(stored.payload, rec.payload);
        assert_eq!(stored.status, RecordStatus::Pending);
    }

    #[tokio::test]
    async fn test_put_is_idempotent() {
        let repo = repo().await;
        let rec = record("STN-1");

        repo.put(&rec).await.unwrap();
        repo.put(&rec).await.unwrap();

        let pending = repo.list_by_status(RecordStatus::Pending).await.unwrap();
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn test_put_rejects_payload_change() {
        let repo = repo().await;
        let rec = record("STN-1");
        repo.put(&rec).await.unwrap();

        let mut changed = rec.clone();
        changed.payload.notes = Some("edited".to_string());

        let err = repo.put(&changed).await.unwrap_err();
        assert!(matches!(err, DbError::ImmutablePayload { .. }));

        let stored = repo.get(&rec.id).await.unwrap().unwrap();
        assert!(stored.payload.notes.is_none());
    }

    #[tokio::test]
    async fn test_put_never_demotes_synced() {
        let repo = repo().await;
        let rec = record("STN-1");
        repo.put(&rec).await.unwrap();
        repo.mark(&rec.id, RecordStatus::Synced, None).await.unwrap();

        repo.put(&rec).await.unwrap();

        let stored = repo.get(&rec.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RecordStatus::Synced);
        assert!(stored.synced_at.is_some());
    }

    #[tokio::test]
    async fn test_list_by_status_is_fifo() {
        let repo = repo().await;
        let a = record("STN-A");
        let b = record("STN-B");
        let c = record("STN-C");
        for r in [&a, &b, &c] {
            repo.put(r).await.unwrap();
        }

        let ids: Vec<RecordId> = repo
            .list_by_status(RecordStatus::Pending)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![a.id, b.id, c.id]);
    }

    #[tokio::test]
    async fn test_reput_keeps_fifo_position() {
        let repo = repo().await;
        let a = record("STN-A");
        let b = record("STN-B");
        repo.put(&a).await.unwrap();
        repo.put(&b).await.unwrap();
        repo.put(&a).await.unwrap();

        let eligible = repo.list_eligible().await.unwrap();
        assert_eq!(eligible[0].id, a.id);
        assert_eq!(eligible[1].id, b.id);
    }

    #[tokio::test]
    async fn test_mark_failure_records_error_and_attempts() {
        let repo = repo().await;
        let rec = record("STN-1");
        repo.put(&rec).await.unwrap();

        repo.mark(&rec.id, RecordStatus::Pending, Some("timeout"))
            .await
            .unwrap();
        repo.mark(&rec.id, RecordStatus::Error, Some("rejected"))
            .await
            .unwrap();

        let stored = repo.get(&rec.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RecordStatus::Error);
        assert_eq!(stored.last_error.as_deref(), Some("rejected"));
        assert_eq!(stored.attempts, 2);
        assert!(stored.attempted_at.is_some());
    }

    #[tokio::test]
    async fn test_error_records_remain_eligible() {
        let repo = repo().await;
        let rec = record("STN-1");
        repo.put(&rec).await.unwrap();
        repo.mark(&rec.id, RecordStatus::Error, Some("bad")).await.unwrap();

        let eligible = repo.list_eligible().await.unwrap();
        assert_eq!(eligible.len(), 1);
        assert!(repo
            .list_by_status(RecordStatus::Pending)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_mark_synced_is_terminal() {
        let repo = repo().await;
        let rec = record("STN-1");
        repo.put(&rec).await.unwrap();
        repo.mark(&rec.id, RecordStatus::Synced, None).await.unwrap();

        repo.mark(&rec.id, RecordStatus::Pending, Some("late failure"))
            .await
            .unwrap();

        let stored = repo.get(&rec.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RecordStatus::Synced);
        assert!(stored.last_error.is_none());
        assert!(repo.list_eligible().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mark_unknown_id_is_not_found() {
        let repo = repo().await;
        let err = repo
            .mark(&RecordId::generate(), RecordStatus::Synced, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_mark_batch_skips_missing_ids() {
        let repo = repo().await;
        let a = record("STN-A");
        let b = record("STN-B");
        repo.put(&a).await.unwrap();
        repo.put(&b).await.unwrap();

        let changed = repo
            .mark_batch(
                &[a.id.clone(), RecordId::generate(), b.id.clone()],
                RecordStatus::Synced,
                None,
            )
            .await
            .unwrap();

        assert_eq!(changed, 2);
        let counts = repo.count_by_status().await.unwrap();
        assert_eq!(counts.synced, 2);
        assert_eq!(counts.eligible(), 0);
    }

    #[tokio::test]
    async fn test_record_failure_keeps_status() {
        let repo = repo().await;
        let a = record("STN-A");
        let b = record("STN-B");
        repo.put(&a).await.unwrap();
        repo.put(&b).await.unwrap();
        repo.mark(&b.id, RecordStatus::Error, Some("rejected")).await.unwrap();

        let touched = repo
            .record_failure(&[a.id.clone(), b.id.clone()], "connection refused")
            .await
            .unwrap();
        assert_eq!(touched, 2);

        let a = repo.get(&a.id).await.unwrap().unwrap();
        let b = repo.get(&b.id).await.unwrap().unwrap();
        assert_eq!(a.status, RecordStatus::Pending);
        assert_eq!(b.status, RecordStatus::Error);
        assert_eq!(a.last_error.as_deref(), Some("connection refused"));
        assert_eq!(a.attempts, 1);
        assert_eq!(b.attempts, 2);
    }

    #[tokio::test]
    async fn test_count_by_status() {
        let repo = repo().await;
        let a = record("STN-A");
        let b = record("STN-B");
        let c = record("STN-C");
        for r in [&a, &b, &c] {
            repo.put(r).await.unwrap();
        }
        repo.mark(&a.id, RecordStatus::Synced, None).await.unwrap();
        repo.mark(&b.id, RecordStatus::Error, Some("x")).await.unwrap();

        let counts = repo.count_by_status().await.unwrap();
        assert_eq!(
            counts,
            StatusCounts {
                pending: 1,
                synced: 1,
                error: 1
            }
        );
    }

    #[tokio::test]
    async fn test_prune_only_removes_old_synced() {
        let repo = repo().await;

        let mut old = record("STN-OLD");
        old.status = RecordStatus::Synced;
        old.synced_at = Some(Utc::now() - Duration::days(40));
        repo.put(&old).await.unwrap();

        let fresh = record("STN-NEW");
        repo.put(&fresh).await.unwrap();
        repo.mark(&fresh.id, RecordStatus::Synced, None).await.unwrap();

        let pending = record("STN-PENDING");
        repo.put(&pending).await.unwrap();

        let deleted = repo.prune_synced(30).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(repo.get(&old.id).await.unwrap().is_none());
        assert!(repo.get(&fresh.id).await.unwrap().is_some());
        assert!(repo.get(&pending.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_list_recent_is_newest_first() {
        let repo = repo().await;
        let a = record("STN-A");
        let b = record("STN-B");
        repo.put(&a).await.unwrap();
        repo.put(&b).await.unwrap();

        let recent = repo.list_recent(1).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, b.id);
    }
}
