//! HTTP handlers.
//!
//! - [`logsheets`] - Batch intake plus read-back queries
//! - [`health`] - Liveness and database check

pub mod health;
pub mod logsheets;
