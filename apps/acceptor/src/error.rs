//! Error types for the acceptor.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

/// Acceptor errors.
#[derive(Debug, thiserror::Error)]
pub enum AcceptorError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Batch too large: {size} records (limit {limit})")]
    BatchTooLarge { size: usize, limit: usize },

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<sqlx::Error> for AcceptorError {
    fn from(e: sqlx::Error) -> Self {
        AcceptorError::Database(e.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for AcceptorError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        AcceptorError::Migration(e.to_string())
    }
}

impl AcceptorError {
    fn status(&self) -> StatusCode {
        match self {
            AcceptorError::Database(_) | AcceptorError::Migration(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AcceptorError::AuthFailed(_) => StatusCode::UNAUTHORIZED,
            AcceptorError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AcceptorError::BatchTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AcceptorError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for AcceptorError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
