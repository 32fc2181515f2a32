//! # fieldlog-db: Durable Local Store
//!
//! Device-side persistence for the log sheet outbox. SQLite via sqlx, with
//! embedded migrations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Field Log Data Flow                              │
//! │                                                                         │
//! │  Submitter (put)      SyncEngine (snapshot / mark)     CLI (list)      │
//! │       │                        │                           │            │
//! │       ▼                        ▼                           ▼            │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    fieldlog-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌─────────────────┐   ┌──────────────┐  │   │
//! │  │   │   Database    │    │ OutboxRepository│   │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │◄───│   (outbox.rs)   │   │  (embedded)  │  │   │
//! │  │   │  SqlitePool   │    │ put / list /    │   │ 001_sync_    │  │   │
//! │  │   │  WAL + FULL   │    │ mark / prune    │   │  outbox.sql  │  │   │
//! │  │   └───────────────┘    └─────────────────┘   └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │        <data dir>/fieldlog/outbox.db                            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fieldlog_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("outbox.db")).await?;
//! db.outbox().put(&record).await?;
//! let pending = db.outbox().list_by_status(RecordStatus::Pending).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::outbox::OutboxRepository;
