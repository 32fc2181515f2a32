//! Database layer for the acceptor.
//!
//! Provides SQLite connectivity and the log sheet repository methods.

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::info;

use fieldlog_sync::WireRecord;

use crate::error::AcceptorError;

/// Database connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database file.
    pub async fn connect(path: &Path) -> Result<Self, AcceptorError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| AcceptorError::Database(e.to_string()))?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        info!(path = %path.display(), "Acceptor database opened");
        Ok(Database { pool })
    }

    /// Run database migrations.
    pub async fn run_migrations(&self) -> Result<(), AcceptorError> {
        sqlx::migrate!("../../migrations/acceptor")
            .run(&self.pool)
            .await?;
        Ok(())
    }

    /// Get the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // =========================================================================
    // Log Sheet Operations
    // =========================================================================

    /// Insert a log sheet unless its `client_uuid` is already stored.
    ///
    /// Returns `true` if a row was written, `false` for a duplicate.
    pub async fn insert_logsheet(
        &self,
        record: &WireRecord,
        device_id: Option<&str>,
    ) -> Result<bool, AcceptorError> {
        let sheet = &record.sheet;
        let result = sqlx::query(
            r#"
            INSERT INTO logsheets (
                client_uuid, station_code, visit_date, arrival_time, departure_time,
                weather_conditions, maintenance_performed, equipment_status, notes,
                device_id, received_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT (client_uuid) DO NOTHING
            "#,
        )
        .bind(record.client_uuid.as_str())
        .bind(sheet.station_code.trim())
        .bind(sheet.visit_date)
        .bind(sheet.arrival_time)
        .bind(sheet.departure_time)
        .bind(&sheet.weather_conditions)
        .bind(&sheet.maintenance_performed)
        .bind(sheet.equipment_status.map(|s| s.as_str()))
        .bind(&sheet.notes)
        .bind(device_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Get a stored log sheet by client id.
    pub async fn get_logsheet(
        &self,
        client_uuid: &str,
    ) -> Result<Option<StoredLogSheet>, AcceptorError> {
        let result = sqlx::query_as::<_, StoredLogSheet>(&format!(
            "SELECT {} FROM logsheets WHERE client_uuid = ?1",
            COLUMNS
        ))
        .bind(client_uuid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(result)
    }

    /// List stored log sheets, newest first, optionally for one station.
    pub async fn list_logsheets(
        &self,
        station_code: Option<&str>,
        limit: u32,
    ) -> Result<Vec<StoredLogSheet>, AcceptorError> {
        let result = sqlx::query_as::<_, StoredLogSheet>(&format!(
            r#"
            SELECT {} FROM logsheets
            WHERE (?1 IS NULL OR station_code = ?1)
            ORDER BY received_at DESC, client_uuid
            LIMIT ?2
            "#,
            COLUMNS
        ))
        .bind(station_code)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(result)
    }

    /// Total stored log sheets.
    pub async fn count_logsheets(&self) -> Result<i64, AcceptorError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM logsheets")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

const COLUMNS: &str = "client_uuid, station_code, visit_date, arrival_time, departure_time, \
     weather_conditions, maintenance_performed, equipment_status, notes, device_id, received_at";

// =============================================================================
// Record Types
// =============================================================================

/// A log sheet as stored by the acceptor.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StoredLogSheet {
    pub client_uuid: String,
    pub station_code: String,
    pub visit_date: NaiveDate,
    pub arrival_time: Option<DateTime<Utc>>,
    pub departure_time: Option<DateTime<Utc>>,
    pub weather_conditions: Option<String>,
    pub maintenance_performed: Option<String>,
    pub equipment_status: Option<String>,
    pub notes: Option<String>,
    pub device_id: Option<String>,
    pub received_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldlog_core::{EquipmentStatus, LogSheet, RecordId};
    use tempfile::TempDir;

    async fn open() -> (Database, TempDir) {
        let dir = TempDir::new().unwrap();
        let db = Database::connect(&dir.path().join("acceptor.db")).await.unwrap();
        db.run_migrations().await.unwrap();
        (db, dir)
    }

    fn record(station: &str) -> WireRecord {
        WireRecord {
            client_uuid: RecordId::generate(),
            sheet: LogSheet::new(station, NaiveDate::from_ymd_opt(2024, 3, 18).unwrap())
                .with_equipment_status(EquipmentStatus::Repaired),
        }
    }

    #[tokio::test]
    async fn test_insert_dedupes_on_client_uuid() {
        let (db, _dir) = open().await;
        let rec = record("STN-9");

        assert!(db.insert_logsheet(&rec, Some("dev-1")).await.unwrap());
        assert!(!db.insert_logsheet(&rec, Some("dev-1")).await.unwrap());
        assert_eq!(db.count_logsheets().await.unwrap(), 1);

        let stored = db.get_logsheet(rec.client_uuid.as_str()).await.unwrap().unwrap();
        assert_eq!(stored.station_code, "STN-9");
        assert_eq!(stored.equipment_status.as_deref(), Some("repaired"));
        assert_eq!(stored.device_id.as_deref(), Some("dev-1"));
    }

    #[tokio::test]
    async fn test_list_filters_by_station() {
        let (db, _dir) = open().await;
        db.insert_logsheet(&record("STN-1"), None).await.unwrap();
        db.insert_logsheet(&record("STN-1"), None).await.unwrap();
        db.insert_logsheet(&record("STN-2"), None).await.unwrap();

        assert_eq!(db.list_logsheets(None, 10).await.unwrap().len(), 3);
        assert_eq!(db.list_logsheets(Some("STN-1"), 10).await.unwrap().len(), 2);
        assert_eq!(db.list_logsheets(None, 1).await.unwrap().len(), 1);
    }
}
