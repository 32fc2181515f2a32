//! # fieldlog-core: Record Types for the Field Log Outbox
//!
//! Everything the outbox, the sync engine and the acceptor agree on, with
//! zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Field Log Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                Producing UI (form / CLI)                        │   │
//! │  │        fill log sheet ──► submit ──► Delivered | Queued         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ fieldlog-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌────────────┐   ┌──────────────┐   ┌──────────────┐         │   │
//! │  │   │     id     │   │    types     │   │  validation  │         │   │
//! │  │   │  RecordId  │   │  LogSheet    │   │  log sheet   │         │   │
//! │  │   │  (UUID v4) │   │ QueuedRecord │   │    rules     │         │   │
//! │  │   └────────────┘   └──────────────┘   └──────────────┘         │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              fieldlog-db / fieldlog-sync                        │   │
//! │  │          durable outbox, connectivity, flush engine             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`id`] - Client-assigned record identifiers
//! - [`types`] - Log sheet payload and queued record
//! - [`error`] - Domain error types
//! - [`validation`] - Payload validation rules
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::NaiveDate;
//! use fieldlog_core::{LogSheet, QueuedRecord, RecordStatus};
//!
//! let sheet = LogSheet::new("STN-042", NaiveDate::from_ymd_opt(2024, 5, 3).unwrap());
//! let record = QueuedRecord::new(sheet);
//!
//! assert_eq!(record.status, RecordStatus::Pending);
//! assert!(record.status.is_eligible());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod id;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use id::RecordId;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum length of a station code.
pub const MAX_STATION_CODE_LEN: usize = 32;

/// Maximum length of the weather conditions field.
pub const MAX_WEATHER_LEN: usize = 500;

/// Maximum length of the maintenance performed field.
pub const MAX_MAINTENANCE_LEN: usize = 2000;

/// Maximum length of free-text notes.
pub const MAX_NOTES_LEN: usize = 4000;
