//! # Record Identity
//!
//! Every log sheet gets its identifier on the device, once, before it is
//! ever persisted. The acceptor dedupes on that identifier, which is what
//! makes redelivery harmless.
//!
//! ```text
//!   form filled ──► RecordId::generate() ──► put(pending) ──► send ...
//!                        │
//!                        └── never regenerated, never reassigned
//! ```
//!
//! The id is opaque: callers compare and store it, nothing parses it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::CoreError;

/// Client-assigned, globally unique record identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export)]
pub struct RecordId(String);

impl RecordId {
    /// Generates a fresh identifier (UUID v4, no coordination needed).
    pub fn generate() -> Self {
        RecordId(Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the id, returning the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl FromStr for RecordId {
    type Err = CoreError;

    /// Wraps an existing identifier, e.g. one read back from storage.
    ///
    /// Only emptiness is rejected; ids from other producers need not be UUIDs.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidRecordId(s.to_string()));
        }
        Ok(RecordId(trimmed.to_string()))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RecordId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
