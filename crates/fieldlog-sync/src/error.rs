//! # Sync Error Types
//!
//! Error types for delivery and configuration.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │  Acceptor Response      │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Connection     │  │  Unauthorized           │ │
//! │  │  MissingDeviceId│  │  Timeout        │  │  AcceptorRejected       │ │
//! │  │  InvalidUrl     │  │  Request        │  │  BatchTooLarge          │ │
//! │  │                 │  │                 │  │  InvalidResponse        │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │    Database     │  │    Internal     │                              │
//! │  │                 │  │                 │                              │
//! │  │  DatabaseError  │  │  ShuttingDown   │                              │
//! │  │                 │  │  ChannelError   │                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! None of these ever marks a record: a failed delivery leaves the snapshot
//! eligible and the next flush tries again.

use thiserror::Error;

use fieldlog_core::ValidationError;
use fieldlog_db::DbError;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering all possible sync failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Missing device ID (required for sync).
    #[error("Device ID not configured")]
    MissingDeviceId,

    /// Invalid acceptor URL.
    #[error("Invalid acceptor URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Could not reach the acceptor.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Connect or request timeout.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Any other HTTP client failure.
    #[error("Request failed: {0}")]
    Request(String),

    // =========================================================================
    // Acceptor Response Errors
    // =========================================================================
    /// 401/403 from the acceptor. Re-authentication happens elsewhere.
    #[error("Acceptor refused credentials (HTTP {0})")]
    Unauthorized(u16),

    /// Any other non-success status.
    #[error("Acceptor returned HTTP {status}: {body}")]
    AcceptorRejected { status: u16, body: String },

    /// 413: the batch exceeds what the acceptor takes in one request.
    #[error("Acceptor refused a batch of {size} records as too large")]
    BatchTooLarge { size: usize },

    /// Response body could not be read.
    #[error("Invalid acceptor response: {0}")]
    InvalidResponse(String),

    // =========================================================================
    // Local Errors
    // =========================================================================
    /// Outbox storage failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Payload rejected before queuing.
    #[error("Invalid log sheet: {0}")]
    Validation(#[from] ValidationError),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Agent is shutting down.
    #[error("Sync agent is shutting down")]
    ShuttingDown,

    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<DbError> for SyncError {
    fn from(err: DbError) -> Self {
        SyncError::DatabaseError(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncError::Timeout(err.to_string())
        } else if err.is_connect() {
            SyncError::ConnectionFailed(err.to_string())
        } else if err.is_decode() {
            SyncError::InvalidResponse(err.to_string())
        } else {
            SyncError::Request(err.to_string())
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl SyncError {
    /// Returns true if retrying the same batch later can succeed without
    /// anyone changing configuration or data.
    ///
    /// ## Retryable Errors
    /// - Connection failures, timeouts, other transport errors
    /// - Authentication failures (a fresh token may appear)
    /// - 5xx, 408 and 429 responses
    /// - Unreadable 2xx bodies
    ///
    /// ## Non-Retryable Errors
    /// - Configuration and validation errors
    /// - 413 for a batch that cannot be split further
    /// - Other 4xx responses
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::ConnectionFailed(_)
            | SyncError::Timeout(_)
            | SyncError::Request(_)
            | SyncError::Unauthorized(_)
            | SyncError::InvalidResponse(_) => true,
            SyncError::AcceptorRejected { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            _ => false,
        }
    }

    /// Returns true if the acceptor refused our credentials.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, SyncError::Unauthorized(_))
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::BatchTooLarge { .. }
                | SyncError::InvalidConfig(_)
                | SyncError::MissingDeviceId
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }
}
