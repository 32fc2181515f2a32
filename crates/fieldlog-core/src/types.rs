//! # Domain Types
//!
//! Core domain types shared by the outbox, the sync engine and the acceptor.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────────┐          ┌─────────────────────┐              │
//! │  │    QueuedRecord     │          │      LogSheet       │              │
//! │  │  ─────────────────  │ payload  │  ─────────────────  │              │
//! │  │  id (RecordId)      │─────────►│  station_code       │              │
//! │  │  status             │          │  visit_date         │              │
//! │  │  last_error         │          │  arrival/departure  │              │
//! │  │  attempts           │          │  free text fields   │              │
//! │  │  timestamps         │          │  equipment_status   │              │
//! │  └─────────────────────┘          └─────────────────────┘              │
//! │                                                                         │
//! │  ┌─────────────────────┐          ┌─────────────────────┐              │
//! │  │    RecordStatus     │          │   EquipmentStatus   │              │
//! │  │  Pending ──► Synced │          │  Ok                 │              │
//! │  │     │        ▲      │          │  IssueFound         │              │
//! │  │     ▼        │      │          │  Repaired           │              │
//! │  │   Error ─────┘      │          └─────────────────────┘              │
//! │  └─────────────────────┘                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Immutability
//! The payload of a queued record never changes after creation. The queue
//! only ever touches `status`, `last_error` and the bookkeeping fields.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreError;
use crate::id::RecordId;

// =============================================================================
// Equipment Status
// =============================================================================

/// Condition of the station equipment observed during the visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentStatus {
    /// Everything working.
    Ok,
    /// A problem was found and left for follow-up.
    IssueFound,
    /// A problem was found and fixed on site.
    Repaired,
}

impl EquipmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EquipmentStatus::Ok => "ok",
            EquipmentStatus::IssueFound => "issue_found",
            EquipmentStatus::Repaired => "repaired",
        }
    }
}

impl FromStr for EquipmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ok" => Ok(EquipmentStatus::Ok),
            "issue_found" => Ok(EquipmentStatus::IssueFound),
            "repaired" => Ok(EquipmentStatus::Repaired),
            other => Err(format!(
                "unknown equipment status '{other}' (expected ok, issue_found, repaired)"
            )),
        }
    }
}

// =============================================================================
// Log Sheet
// =============================================================================

/// A station-visit log sheet. Opaque to the queue; validated before queuing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LogSheet {
    /// Station identifier, e.g. `STN-042`.
    pub station_code: String,

    #[ts(as = "String")]
    pub visit_date: NaiveDate,

    #[ts(as = "Option<String>")]
    #[serde(default)]
    pub arrival_time: Option<DateTime<Utc>>,

    #[ts(as = "Option<String>")]
    #[serde(default)]
    pub departure_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub weather_conditions: Option<String>,

    #[serde(default)]
    pub maintenance_performed: Option<String>,

    #[serde(default)]
    pub equipment_status: Option<EquipmentStatus>,

    #[serde(default)]
    pub notes: Option<String>,
}

impl LogSheet {
    /// Creates a sheet with only the required fields set.
    pub fn new(station_code: impl Into<String>, visit_date: NaiveDate) -> Self {
        LogSheet {
            station_code: station_code.into(),
            visit_date,
            arrival_time: None,
            departure_time: None,
            weather_conditions: None,
            maintenance_performed: None,
            equipment_status: None,
            notes: None,
        }
    }

    pub fn with_times(
        mut self,
        arrival: Option<DateTime<Utc>>,
        departure: Option<DateTime<Utc>>,
    ) -> Self {
        self.arrival_time = arrival;
        self.departure_time = departure;
        self
    }

    pub fn with_equipment_status(mut self, status: EquipmentStatus) -> Self {
        self.equipment_status = Some(status);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

// =============================================================================
// Record Status
// =============================================================================

/// Lifecycle state of a queued record.
///
/// ## Transitions
/// ```text
/// created ──► Pending ──(acceptor confirms)──► Synced   (terminal)
///               │  ▲
///   (rejected)  ▼  │ (still eligible, retried like Pending)
///              Error
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Waiting for delivery.
    Pending,
    /// Confirmed by the acceptor. Never resubmitted.
    Synced,
    /// Last delivery attempt failed for this record. Diagnostic only.
    Error,
}

impl RecordStatus {
    pub const ALL: [RecordStatus; 3] = [
        RecordStatus::Pending,
        RecordStatus::Synced,
        RecordStatus::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Pending => "pending",
            RecordStatus::Synced => "synced",
            RecordStatus::Error => "error",
        }
    }

    /// Whether a record in this status is picked up by the next flush.
    #[inline]
    pub fn is_eligible(&self) -> bool {
        !matches!(self, RecordStatus::Synced)
    }
}

impl Default for RecordStatus {
    fn default() -> Self {
        RecordStatus::Pending
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RecordStatus::Pending),
            "synced" => Ok(RecordStatus::Synced),
            "error" => Ok(RecordStatus::Error),
            other => Err(CoreError::UnknownStatus(other.to_string())),
        }
    }
}

// =============================================================================
// Queued Record
// =============================================================================

/// An entry in the outbox.
///
/// `attempts`, `attempted_at` and `synced_at` are bookkeeping for operators;
/// no control flow depends on them.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct QueuedRecord {
    pub id: RecordId,
    pub payload: LogSheet,
    pub status: RecordStatus,
    /// Last delivery failure, if any.
    pub last_error: Option<String>,
    /// Number of failed delivery attempts.
    pub attempts: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub attempted_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub synced_at: Option<DateTime<Utc>>,
}

impl QueuedRecord {
    /// Wraps a payload in a fresh pending record with a newly generated id.
    pub fn new(payload: LogSheet) -> Self {
        QueuedRecord::with_id(RecordId::generate(), payload)
    }

    /// Wraps a payload under an id the caller already assigned.
    pub fn with_id(id: RecordId, payload: LogSheet) -> Self {
        QueuedRecord {
            id,
            payload,
            status: RecordStatus::Pending,
            last_error: None,
            attempts: 0,
            created_at: Utc::now(),
            attempted_at: None,
            synced_at: None,
        }
    }

    /// Serializes the payload the way the outbox stores it.
    pub fn payload_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string(&self.payload)?)
    }
}

// =============================================================================
// Status Counts
// =============================================================================

/// Number of outbox records in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StatusCounts {
    pub pending: i64,
    pub synced: i64,
    pub error: i64,
}

impl StatusCounts {
    /// Records the next flush would pick up.
    pub fn eligible(&self) -> i64 {
        self.pending + self.error
    }

    pub fn total(&self) -> i64 {
        self.pending + self.synced + self.error
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
