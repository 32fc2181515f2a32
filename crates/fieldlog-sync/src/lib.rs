//! # fieldlog-sync: Outbox Delivery for Field Log
//!
//! Gets queued log sheets from the device to the acceptor, whenever the
//! network allows.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Layer Architecture                          │
//! │                                                                         │
//! │   Producing UI                                                          │
//! │       │ submit(LogSheet)                                                │
//! │       ▼                                                                 │
//! │  ┌────────────────┐   put(pending)   ┌──────────────────────────────┐  │
//! │  │   Submitter    │ ───────────────► │  fieldlog-db: sync_outbox    │  │
//! │  │  (submit.rs)   │                  │  (durable local store)       │  │
//! │  └───────┬────────┘                  └──────────────▲───────────────┘  │
//! │          │ deliver_one (optimistic)                 │ list / mark      │
//! │          ▼                                          │                  │
//! │  ┌────────────────────────────────────────────────────────────────┐    │
//! │  │                     SyncEngine (engine.rs)                     │    │
//! │  │   snapshot eligible ──► chunk ──► acceptor ──► mark results   │    │
//! │  └───────────────▲─────────────────────────────────┬──────────────┘    │
//! │                  │ flush()                         │ submit(batch)     │
//! │  ┌───────────────┴────────────┐       ┌────────────▼──────────────┐    │
//! │  │    SyncAgent (agent.rs)    │       │ dyn RemoteAcceptor        │    │
//! │  │  BecameOnline, probe tick, │       │ HttpAcceptor (reqwest)    │    │
//! │  │  backoff retry, commands   │       │ POST /api/v1/logsheets    │    │
//! │  └───────────────▲────────────┘       └───────────────────────────┘    │
//! │                  │ events                                              │
//! │  ┌───────────────┴────────────┐                                        │
//! │  │ ConnectivityMonitor        │◄── TcpProbe / host reports             │
//! │  └────────────────────────────┘                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`acceptor`] - `RemoteAcceptor` trait and the HTTP client
//! - [`agent`] - Background trigger loop and its handle
//! - [`config`] - Sync configuration (device, acceptor, retry, store)
//! - [`connectivity`] - Online/offline state and transition events
//! - [`engine`] - Flush cycle
//! - [`error`] - Sync error types
//! - [`protocol`] - JSON wire types
//! - [`submit`] - Validate, persist, optimistically send
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fieldlog_sync::{
//!     ConnectivityMonitor, HttpAcceptor, SyncAgent, SyncConfig, SyncEngine, Submitter, TcpProbe,
//! };
//!
//! let config = SyncConfig::load_or_default(None);
//! let acceptor = Arc::new(HttpAcceptor::new(&config)?);
//! let engine = Arc::new(SyncEngine::new(db.clone(), acceptor, config.sync.batch_size));
//! let monitor = Arc::new(ConnectivityMonitor::new());
//! let probe = Arc::new(TcpProbe::new(config.probe_target()?, config.probe_timeout()));
//!
//! let (agent, handle) = SyncAgent::new(&config, engine.clone(), monitor.clone(), probe);
//! tokio::spawn(agent.run());
//!
//! let submitter = Submitter::new(db, engine, monitor, config.sync.optimistic_send);
//! let outcome = submitter.submit(sheet).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod acceptor;
pub mod agent;
pub mod config;
pub mod connectivity;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod submit;

// =============================================================================
// Re-exports
// =============================================================================

pub use acceptor::{BatchAck, HttpAcceptor, RemoteAcceptor};
pub use agent::{NoOpEmitter, SyncAgent, SyncAgentHandle, SyncEventEmitter, SyncStatus};
pub use config::SyncConfig;
pub use connectivity::{
    Connectivity, ConnectivityEvent, ConnectivityMonitor, ReachabilityProbe, TcpProbe,
};
pub use engine::{FlushOutcome, FlushReport, SyncEngine};
pub use error::{SyncError, SyncResult};
pub use protocol::{Outcome, RecordOutcome, WireRecord};
pub use submit::{SubmitError, SubmitOutcome, Submitter};
