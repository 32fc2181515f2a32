//! # Sync Configuration
//!
//! Configuration management for the outbox, the connectivity probe and the
//! acceptor client.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     FIELDLOG_ACCEPTOR_URL=https://ops.example.org                      │
//! │     FIELDLOG_DEVICE_ID=abc-123                                         │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/fieldlog/sync.toml (Linux)                               │
//! │     ~/Library/Application Support/org.fieldlog.fieldlog/sync.toml      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     localhost acceptor, auto-generated device_id                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # sync.toml
//! [device]
//! id = "550e8400-e29b-41d4-a716-446655440000"
//! name = "Tablet 7"
//!
//! [acceptor]
//! url = "https://ops.example.org"
//! auth_token = "..."
//! connect_timeout_secs = 10
//! request_timeout_secs = 30
//!
//! [sync]
//! batch_size = 100
//! probe_interval_secs = 15
//! initial_backoff_ms = 500
//! max_backoff_secs = 60
//! optimistic_send = true
//!
//! [connectivity]
//! probe_addr = "ops.example.org:443"   # defaults to the acceptor's host:port
//! probe_timeout_ms = 3000
//!
//! [store]
//! database_path = "/var/lib/fieldlog/outbox.db"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Device Configuration
// =============================================================================

/// Configuration for this device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Unique device identifier (UUID v4).
    /// Auto-generated on first run if not provided.
    pub id: String,

    /// Human-readable device name (e.g., "Tablet 7").
    #[serde(default = "default_device_name")]
    pub name: String,
}

fn default_device_name() -> String {
    "Field Device".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            id: Uuid::new_v4().to_string(),
            name: default_device_name(),
        }
    }
}

// =============================================================================
// Acceptor Settings
// =============================================================================

/// Where and how to deliver batches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptorSettings {
    /// Base URL; batches go to `{url}/api/v1/logsheets`.
    #[serde(default = "default_acceptor_url")]
    pub url: String,

    /// Bearer token. Obtaining and refreshing it is someone else's job.
    #[serde(default)]
    pub auth_token: Option<String>,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Whole-request timeout. A flush that loses connectivity mid-flight
    /// fails through this.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_acceptor_url() -> String {
    "http://127.0.0.1:8080".to_string()
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_request_timeout() -> u64 {
    30
}

impl Default for AcceptorSettings {
    fn default() -> Self {
        AcceptorSettings {
            url: default_acceptor_url(),
            auth_token: None,
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Flush and retry behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Maximum records per request. A larger snapshot is sent in FIFO chunks.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Interval between connectivity probes (seconds). Each probe that finds
    /// the device online also sweeps the outbox.
    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: u64,

    /// First retry delay after a failed flush (milliseconds).
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Retry delay cap (seconds).
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,

    /// Try to deliver a new record immediately when online.
    #[serde(default = "default_true")]
    pub optimistic_send: bool,
}

fn default_batch_size() -> usize {
    100
}
fn default_probe_interval() -> u64 {
    15
}
fn default_initial_backoff() -> u64 {
    500
}
fn default_max_backoff() -> u64 {
    60
}
fn default_true() -> bool {
    true
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            batch_size: default_batch_size(),
            probe_interval_secs: default_probe_interval(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
            optimistic_send: true,
        }
    }
}

// =============================================================================
// Connectivity Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivitySettings {
    /// `host:port` to probe. Defaults to the acceptor's host and port.
    #[serde(default)]
    pub probe_addr: Option<String>,

    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,
}

fn default_probe_timeout() -> u64 {
    3000
}

impl Default for ConnectivitySettings {
    fn default() -> Self {
        ConnectivitySettings {
            probe_addr: None,
            probe_timeout_ms: default_probe_timeout(),
        }
    }
}

// =============================================================================
// Store Settings
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Outbox database file. Defaults to the platform data directory.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete sync configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub acceptor: AcceptorSettings,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub connectivity: ConnectivitySettings,

    #[serde(default)]
    pub store: StoreSettings,
}

impl SyncConfig {
    /// Creates a new config with defaults and a generated device ID.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (sync.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading sync config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load sync config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Sync config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.device.id.trim().is_empty() {
            return Err(SyncError::MissingDeviceId);
        }

        let url = Url::parse(&self.acceptor.url)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(SyncError::InvalidUrl(format!(
                "Acceptor URL must start with http:// or https://, got: {}",
                self.acceptor.url
            )));
        }
        if url.host_str().is_none() {
            return Err(SyncError::InvalidUrl(format!(
                "Acceptor URL has no host: {}",
                self.acceptor.url
            )));
        }

        if self.sync.batch_size == 0 {
            return Err(SyncError::InvalidConfig(
                "batch_size must be greater than 0".into(),
            ));
        }

        if self.sync.probe_interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "probe_interval_secs must be greater than 0".into(),
            ));
        }

        if let Some(addr) = &self.connectivity.probe_addr {
            let valid = addr
                .rsplit_once(':')
                .map(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
                .unwrap_or(false);
            if !valid {
                return Err(SyncError::InvalidConfig(format!(
                    "probe_addr must be host:port, got: {}",
                    addr
                )));
            }
        }

        Ok(())
    }

    /// Applies `FIELDLOG_*` environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(id) = lookup("FIELDLOG_DEVICE_ID") {
            debug!(device_id = %id, "Overriding device ID from environment");
            self.device.id = id;
        }

        if let Some(name) = lookup("FIELDLOG_DEVICE_NAME") {
            self.device.name = name;
        }

        if let Some(url) = lookup("FIELDLOG_ACCEPTOR_URL") {
            debug!(url = %url, "Overriding acceptor URL from environment");
            self.acceptor.url = url;
        }

        if let Some(token) = lookup("FIELDLOG_AUTH_TOKEN") {
            self.acceptor.auth_token = Some(token).filter(|t| !t.is_empty());
        }

        if let Some(size) = lookup("FIELDLOG_BATCH_SIZE") {
            match size.parse::<usize>() {
                Ok(n) => self.sync.batch_size = n,
                Err(_) => warn!(value = %size, "Ignoring invalid FIELDLOG_BATCH_SIZE"),
            }
        }

        if let Some(secs) = lookup("FIELDLOG_PROBE_INTERVAL_SECS") {
            match secs.parse::<u64>() {
                Ok(n) => self.sync.probe_interval_secs = n,
                Err(_) => warn!(value = %secs, "Ignoring invalid FIELDLOG_PROBE_INTERVAL_SECS"),
            }
        }

        if let Some(flag) = lookup("FIELDLOG_OPTIMISTIC_SEND") {
            match flag.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.sync.optimistic_send = true,
                "0" | "false" | "no" | "off" => self.sync.optimistic_send = false,
                _ => warn!(value = %flag, "Ignoring invalid FIELDLOG_OPTIMISTIC_SEND"),
            }
        }

        if let Some(addr) = lookup("FIELDLOG_PROBE_ADDR") {
            self.connectivity.probe_addr = Some(addr);
        }

        if let Some(path) = lookup("FIELDLOG_DATABASE_PATH") {
            self.store.database_path = Some(PathBuf::from(path));
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("org", "fieldlog", "fieldlog")
            .map(|dirs| dirs.config_dir().join("sync.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn device_id(&self) -> &str {
        &self.device.id
    }

    /// Outbox database path: configured, else `<data dir>/outbox.db`, else
    /// `./fieldlog-outbox.db`.
    pub fn database_path(&self) -> PathBuf {
        self.store.database_path.clone().unwrap_or_else(|| {
            directories::ProjectDirs::from("org", "fieldlog", "fieldlog")
                .map(|dirs| dirs.data_dir().join("outbox.db"))
                .unwrap_or_else(|| PathBuf::from("fieldlog-outbox.db"))
        })
    }

    /// `host:port` the connectivity probe dials.
    pub fn probe_target(&self) -> SyncResult<String> {
        if let Some(addr) = &self.connectivity.probe_addr {
            return Ok(addr.clone());
        }

        let url = Url::parse(&self.acceptor.url)?;
        let host = url
            .host_str()
            .ok_or_else(|| SyncError::InvalidUrl(format!("no host in {}", self.acceptor.url)))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| SyncError::InvalidUrl(format!("no port for {}", self.acceptor.url)))?;

        Ok(format!("{}:{}", host, port))
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.sync.probe_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.connectivity.probe_timeout_ms)
    }
}
