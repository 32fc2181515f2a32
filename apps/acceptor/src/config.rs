//! Acceptor configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Acceptor configuration.
#[derive(Debug, Clone)]
pub struct AcceptorConfig {
    /// Address the HTTP server binds to
    pub bind_addr: SocketAddr,

    /// SQLite database file
    pub database_path: PathBuf,

    /// Static bearer token devices must present (optional)
    pub auth_token: Option<String>,

    /// Largest batch accepted in one request
    pub max_batch_size: usize,
}

impl Default for AcceptorConfig {
    fn default() -> Self {
        AcceptorConfig {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            database_path: PathBuf::from("acceptor.db"),
            auth_token: None,
            max_batch_size: 1000,
        }
    }
}

impl AcceptorConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AcceptorConfig::default();

        let bind_addr = match lookup("ACCEPTOR_BIND_ADDR") {
            Some(v) => v
                .parse()
                .map_err(|_| ConfigError::InvalidValue("ACCEPTOR_BIND_ADDR".to_string()))?,
            None => defaults.bind_addr,
        };

        let max_batch_size = match lookup("ACCEPTOR_MAX_BATCH_SIZE") {
            Some(v) => match v.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidValue(
                        "ACCEPTOR_MAX_BATCH_SIZE".to_string(),
                    ))
                }
            },
            None => defaults.max_batch_size,
        };

        Ok(AcceptorConfig {
            bind_addr,
            database_path: lookup("ACCEPTOR_DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            auth_token: lookup("ACCEPTOR_AUTH_TOKEN").filter(|t| !t.trim().is_empty()),
            max_batch_size,
        })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}
