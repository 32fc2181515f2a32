//! # Remote Acceptor Client
//!
//! The seam between the sync engine and the server that takes batches.
//!
//! ```text
//!   SyncEngine ──► dyn RemoteAcceptor ──┬──► HttpAcceptor (reqwest, production)
//!                                       └──► in-memory acceptors (tests)
//! ```
//!
//! An acceptor either confirms the whole batch ([`BatchAck::Accepted`]),
//! reports per record ([`BatchAck::PerRecord`]), or fails. A failure says
//! nothing about any individual record, so the engine marks none of them.
//!
//! ## Reading a 2xx Body
//! ```text
//!   empty                          ──► Accepted
//!   [{client_uuid, outcome, ..}]   ──► PerRecord
//!   anything else (stored rows)    ──► Accepted
//! ```
//! Acceptors that echo back the rows they stored carry no per-record
//! verdict; the success status alone confirms the batch.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, warn};
use url::Url;

use fieldlog_core::QueuedRecord;

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::protocol::{RecordOutcome, WireRecord, DEVICE_ID_HEADER, LOGSHEETS_PATH};

/// Longest response body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

// =============================================================================
// Acceptor Trait
// =============================================================================

/// Acknowledgement for a successfully submitted batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchAck {
    /// Every record in the batch is now held by the acceptor.
    Accepted,
    /// Individual outcomes, aligned by id. Ids missing from the list are
    /// treated as unknown.
    PerRecord(Vec<RecordOutcome>),
}

/// Anything that can take an ordered batch of records.
///
/// Implementations must be idempotent on record id: submitting an id the
/// acceptor already holds must not create a second copy.
#[async_trait]
pub trait RemoteAcceptor: Send + Sync {
    async fn submit(&self, batch: &[QueuedRecord]) -> SyncResult<BatchAck>;
}

// =============================================================================
// HTTP Acceptor
// =============================================================================

/// Production acceptor: JSON over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpAcceptor {
    client: reqwest::Client,
    endpoint: Url,
    auth_token: Option<String>,
    device_id: String,
}

impl HttpAcceptor {
    /// Builds a client from the `[acceptor]` and `[device]` config sections.
    pub fn new(config: &SyncConfig) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.acceptor.connect_timeout_secs))
            .timeout(Duration::from_secs(config.acceptor.request_timeout_secs))
            .user_agent(concat!("fieldlog/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SyncError::InvalidConfig(format!("HTTP client: {}", e)))?;

        let endpoint = endpoint_url(&config.acceptor.url)?;

        Ok(HttpAcceptor {
            client,
            endpoint,
            auth_token: config.acceptor.auth_token.clone(),
            device_id: config.device.id.clone(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

/// `{base}/api/v1/logsheets`, keeping any path prefix on the base.
fn endpoint_url(base: &str) -> SyncResult<Url> {
    let joined = format!("{}{}", base.trim_end_matches('/'), LOGSHEETS_PATH);
    Ok(Url::parse(&joined)?)
}

#[async_trait]
impl RemoteAcceptor for HttpAcceptor {
    async fn submit(&self, batch: &[QueuedRecord]) -> SyncResult<BatchAck> {
        let body: Vec<WireRecord> = batch.iter().map(WireRecord::from).collect();

        debug!(
            count = body.len(),
            endpoint = %self.endpoint,
            "Submitting batch to acceptor"
        );

        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header(DEVICE_ID_HEADER, &self.device_id)
            .json(&body);

        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!(status = status.as_u16(), "Acceptor refused credentials");
            return Err(SyncError::Unauthorized(status.as_u16()));
        }

        if status == StatusCode::PAYLOAD_TOO_LARGE {
            warn!(size = batch.len(), "Acceptor refused batch size");
            return Err(SyncError::BatchTooLarge { size: batch.len() });
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SyncError::AcceptorRejected {
                status: status.as_u16(),
                body: truncate(&text, MAX_ERROR_BODY),
            });
        }

        let bytes = response.bytes().await?;
        Ok(parse_ack(&bytes))
    }
}

/// Interprets the body of a 2xx batch response.
fn parse_ack(body: &[u8]) -> BatchAck {
    if body.iter().all(u8::is_ascii_whitespace) {
        return BatchAck::Accepted;
    }

    match serde_json::from_slice::<Vec<RecordOutcome>>(body) {
        Ok(outcomes) => BatchAck::PerRecord(outcomes),
        Err(e) => {
            debug!(error = %e, "No per-record outcomes in response, batch accepted");
            BatchAck::Accepted
        }
    }
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
