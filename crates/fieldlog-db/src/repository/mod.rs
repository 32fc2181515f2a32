//! # Repository Module
//!
//! Database repository implementations for the device-side store.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Submitter / SyncEngine / CLI                                          │
//! │       │                                                                 │
//! │       │  db.outbox().list_eligible()                                   │
//! │       ▼                                                                 │
//! │  OutboxRepository                                                      │
//! │  ├── put(&self, record)                                                │
//! │  ├── list_by_status(&self, status)                                     │
//! │  ├── mark(&self, id, status, error)                                    │
//! │  └── mark_batch / count_by_status / prune_synced                       │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database (sync_outbox)                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`outbox::OutboxRepository`] - Durable sync queue

pub mod outbox;
