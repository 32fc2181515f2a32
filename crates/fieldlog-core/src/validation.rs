//! # Validation Module
//!
//! Log sheet validation, run before a record is queued.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Form / CLI                                                   │
//! │  ├── Type validation (dates parse, enum values known)                  │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Submitter (Rust)                                             │
//! │  └── THIS MODULE: field rules, checked before put()                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Acceptor                                                     │
//! │  └── Same rules again; failures come back as per-record rejections    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A sheet that fails here is never queued, so the outbox only ever holds
//! records the acceptor is expected to take.
//!
//! ## Usage
//! ```rust
//! use chrono::NaiveDate;
//! use fieldlog_core::LogSheet;
//! use fieldlog_core::validation::validate_log_sheet;
//!
//! let sheet = LogSheet::new("STN-042", NaiveDate::from_ymd_opt(2024, 5, 3).unwrap());
//! assert!(validate_log_sheet(&sheet).is_ok());
//! ```

use crate::error::ValidationError;
use crate::types::LogSheet;
use crate::{MAX_MAINTENANCE_LEN, MAX_NOTES_LEN, MAX_STATION_CODE_LEN, MAX_WEATHER_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Field Validators
// =============================================================================

/// Validates a station code.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most [`MAX_STATION_CODE_LEN`] characters
/// - Letters, digits, hyphens and underscores only
///
/// ## Example
/// ```rust
/// use fieldlog_core::validation::validate_station_code;
///
/// assert!(validate_station_code("STN-042").is_ok());
/// assert!(validate_station_code("").is_err());
/// assert!(validate_station_code("STN 042").is_err());
/// ```
pub fn validate_station_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "station_code".to_string(),
        });
    }

    if code.chars().count() > MAX_STATION_CODE_LEN {
        return Err(ValidationError::TooLong {
            field: "station_code".to_string(),
            max: MAX_STATION_CODE_LEN,
        });
    }

    if !code
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "station_code".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates an optional free-text field against a length limit.
pub fn validate_text(field: &str, value: Option<&str>, max: usize) -> ValidationResult<()> {
    match value {
        Some(v) if v.chars().count() > max => Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        }),
        _ => Ok(()),
    }
}

// =============================================================================
// Sheet Validator
// =============================================================================

/// Validates a whole log sheet.
///
/// ## Rules
/// - `station_code` per [`validate_station_code`]
/// - `departure_time` not before `arrival_time` when both are present
/// - free-text fields within their length limits
///
/// ## Submission Flow
/// ```text
/// submit(sheet)
///      │
///      ▼
/// validate_log_sheet(&sheet) ← THIS FUNCTION
///      │
///      ├── Err → refused, nothing persisted
///      │
///      └── Ok → id assigned → put(pending) → optimistic send
/// ```
pub fn validate_log_sheet(sheet: &LogSheet) -> ValidationResult<()> {
    validate_station_code(&sheet.station_code)?;

    if let (Some(arrival), Some(departure)) = (sheet.arrival_time, sheet.departure_time) {
        if departure < arrival {
            return Err(ValidationError::OutOfOrder {
                earlier: "arrival_time".to_string(),
                later: "departure_time".to_string(),
            });
        }
    }

    validate_text(
        "weather_conditions",
        sheet.weather_conditions.as_deref(),
        MAX_WEATHER_LEN,
    )?;
    validate_text(
        "maintenance_performed",
        sheet.maintenance_performed.as_deref(),
        MAX_MAINTENANCE_LEN,
    )?;
    validate_text("notes", sheet.notes.as_deref(), MAX_NOTES_LEN)?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    fn sheet() -> LogSheet {
        LogSheet::new("STN-042", NaiveDate::from_ymd_opt(2024, 5, 3).unwrap())
    }

    #[test]
    fn test_validate_station_code() {
        assert!(validate_station_code("STN-042").is_ok());
        assert!(validate_station_code("north_ridge_7").is_ok());

        assert!(validate_station_code("").is_err());
        assert!(validate_station_code("   ").is_err());
        assert!(validate_station_code("has space").is_err());
        assert!(validate_station_code(&"A".repeat(33)).is_err());
    }

    #[test]
    fn test_departure_before_arrival_is_rejected() {
        let arrival = Utc.with_ymd_and_hms(2024, 5, 3, 9, 0, 0).unwrap();
        let bad = sheet().with_times(Some(arrival), Some(arrival - Duration::minutes(5)));
        assert!(matches!(
            validate_log_sheet(&bad),
            Err(ValidationError::OutOfOrder { .. })
        ));

        let good = sheet().with_times(Some(arrival), Some(arrival + Duration::hours(2)));
        assert!(validate_log_sheet(&good).is_ok());
    }

    #[test]
    fn test_single_timestamp_is_fine() {
        let arrival = Utc.with_ymd_and_hms(2024, 5, 3, 9, 0, 0).unwrap();
        assert!(validate_log_sheet(&sheet().with_times(Some(arrival), None)).is_ok());
        assert!(validate_log_sheet(&sheet().with_times(None, Some(arrival))).is_ok());
    }

    #[test]
    fn test_notes_length_limit() {
        let ok = sheet().with_notes("a".repeat(MAX_NOTES_LEN));
        assert!(validate_log_sheet(&ok).is_ok());

        let too_long = sheet().with_notes("a".repeat(MAX_NOTES_LEN + 1));
        assert!(matches!(
            validate_log_sheet(&too_long),
            Err(ValidationError::TooLong { .. })
        ));
    }
}
