//! # Error Types
//!
//! Domain-specific error types for fieldlog-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  fieldlog-core errors (this file)                                      │
//! │  ├── CoreError        - Record lifecycle / encoding errors             │
//! │  └── ValidationError  - Log sheet field failures                       │
//! │                                                                         │
//! │  fieldlog-db errors (separate crate)                                   │
//! │  └── DbError          - Outbox storage failures                        │
//! │                                                                         │
//! │  fieldlog-sync errors (separate crate)                                 │
//! │  ├── SyncError        - Delivery failures (mostly retryable)           │
//! │  └── SubmitError      - What the producing UI sees                     │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SubmitError → UI                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A status string read from storage or the wire is not a known status.
    #[error("Unknown record status: {0}")]
    UnknownStatus(String),

    /// A record id is empty or otherwise unusable as a key.
    #[error("Invalid record id: {0:?}")]
    InvalidRecordId(String),

    /// A payload could not be encoded or decoded.
    ///
    /// ## When This Occurs
    /// - A row written by an older build no longer matches [`crate::LogSheet`]
    /// - Someone edited the outbox database by hand
    #[error("Payload encoding error: {0}")]
    Payload(#[from] serde_json::Error),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Log sheet validation errors.
///
/// Raised before a record is ever persisted; an invalid sheet never enters
/// the outbox.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Invalid format (e.g., station code with spaces).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Two timestamps are in the wrong order.
    #[error("{later} must not be before {earlier}")]
    OutOfOrder { earlier: String, later: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "station_code".to_string(),
        };
        assert_eq!(err.to_string(), "station_code is required");

        let err = ValidationError::OutOfOrder {
            earlier: "arrival_time".to_string(),
            later: "departure_time".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "departure_time must not be before arrival_time"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "station_code".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
