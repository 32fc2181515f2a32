//! # Field Log Acceptor
//!
//! Reference server for log sheet batches sent by field devices.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Acceptor Routes                                 │
//! │                                                                         │
//! │  ┌──────────────────────────────┐  ┌──────────────────────────────────┐│
//! │  │  logsheets                   │  │  health                          ││
//! │  │                              │  │                                  ││
//! │  │ • POST /api/v1/logsheets     │  │ • GET /health                    ││
//! │  │ • GET  /api/v1/logsheets     │  │                                  ││
//! │  │ • GET  /api/v1/logsheets/:id │  │                                  ││
//! │  └──────────────────────────────┘  └──────────────────────────────────┘│
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Infrastructure: SQLite (client_uuid primary key) + bearer token │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables:
//! - `ACCEPTOR_BIND_ADDR` - Listen address (default: 0.0.0.0:8080)
//! - `ACCEPTOR_DATABASE_PATH` - SQLite file (default: acceptor.db)
//! - `ACCEPTOR_AUTH_TOKEN` - Required bearer token (default: none)
//! - `ACCEPTOR_MAX_BATCH_SIZE` - Records per request (default: 1000)

use std::sync::Arc;

use axum::routing::get;
use axum::Router;

use fieldlog_sync::protocol::LOGSHEETS_PATH;

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod services;

// Re-exports
pub use config::AcceptorConfig;
pub use db::Database;
pub use error::AcceptorError;

/// Shared application state.
pub struct AppState {
    pub db: Database,
    pub config: AcceptorConfig,
}

/// Builds the HTTP router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            LOGSHEETS_PATH,
            get(services::logsheets::list_logsheets).post(services::logsheets::submit_batch),
        )
        .route(
            &format!("{}/{{client_uuid}}", LOGSHEETS_PATH),
            get(services::logsheets::get_logsheet),
        )
        .route("/health", get(services::health::health))
        .with_state(state)
}
