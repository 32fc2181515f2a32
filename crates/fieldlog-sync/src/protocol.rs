//! # Acceptor Wire Protocol
//!
//! JSON types exchanged with the remote acceptor.
//!
//! ## Protocol Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Batch Submission                                   │
//! │                                                                         │
//! │  DEVICE ───► POST /api/v1/logsheets                                    │
//! │              Authorization: Bearer <token>        (optional)           │
//! │              X-Device-Id: <device id>                                  │
//! │              [ { "client_uuid": "...", "station_code": "...", ... } ]  │
//! │                                                                         │
//! │  ACCEPTOR ◄── 2xx  [ { "client_uuid": "...",                           │
//! │                        "outcome": "accepted" | "duplicate"             │
//! │                                 | "rejected",                          │
//! │                        "detail": "..." } ]        per-record           │
//! │           ◄── 2xx  (empty body, stored rows, ...) blanket success      │
//! │           ◄── 401 / 403                           auth failure         │
//! │           ◄── 413                                 split and resend     │
//! │           ◄── anything else                       batch failure        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Idempotence
//! The acceptor dedupes on `client_uuid`. Resending an id it already holds
//! yields `duplicate`, which the device treats exactly like `accepted`.

use serde::{Deserialize, Serialize};

use fieldlog_core::{LogSheet, QueuedRecord, RecordId};

/// Batch endpoint path, relative to the acceptor base URL.
pub const LOGSHEETS_PATH: &str = "/api/v1/logsheets";

/// Header carrying the submitting device's id.
pub const DEVICE_ID_HEADER: &str = "x-device-id";

// =============================================================================
// Request
// =============================================================================

/// One record as it travels to the acceptor: the id plus the flattened
/// log sheet fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRecord {
    pub client_uuid: RecordId,

    #[serde(flatten)]
    pub sheet: LogSheet,
}

impl From<&QueuedRecord> for WireRecord {
    fn from(record: &QueuedRecord) -> Self {
        WireRecord {
            client_uuid: record.id.clone(),
            sheet: record.payload.clone(),
        }
    }
}

// =============================================================================
// Response
// =============================================================================

/// What the acceptor did with one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Stored for the first time.
    Accepted,
    /// Already stored under this id; nothing changed.
    Duplicate,
    /// Refused (e.g. failed server-side validation).
    Rejected,
}

impl Outcome {
    /// Whether the acceptor now holds the record.
    pub fn is_delivered(&self) -> bool {
        matches!(self, Outcome::Accepted | Outcome::Duplicate)
    }
}

/// Per-record result, aligned to the request by `client_uuid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordOutcome {
    pub client_uuid: RecordId,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl RecordOutcome {
    pub fn accepted(id: RecordId) -> Self {
        RecordOutcome {
            client_uuid: id,
            outcome: Outcome::Accepted,
            detail: None,
        }
    }

    pub fn duplicate(id: RecordId) -> Self {
        RecordOutcome {
            client_uuid: id,
            outcome: Outcome::Duplicate,
            detail: None,
        }
    }

    pub fn rejected(id: RecordId, detail: impl Into<String>) -> Self {
        RecordOutcome {
            client_uuid: id,
            outcome: Outcome::Rejected,
            detail: Some(detail.into()),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
