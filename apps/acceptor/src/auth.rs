//! Bearer token check.
//!
//! The acceptor accepts a single static token. With no token configured,
//! every request is allowed.

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;

use crate::error::AcceptorError;

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Checks the request headers against the configured token.
pub fn authorize(headers: &HeaderMap, expected: Option<&str>) -> Result<(), AcceptorError> {
    let Some(expected) = expected else {
        return Ok(());
    };

    let header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AcceptorError::AuthFailed("Missing authorization header".into()))?;

    let token = extract_bearer_token(header)
        .ok_or_else(|| AcceptorError::AuthFailed("Invalid authorization header".into()))?;

    if constant_time_eq(token.as_bytes(), expected.as_bytes()) {
        Ok(())
    } else {
        Err(AcceptorError::AuthFailed("Invalid token".into()))
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
