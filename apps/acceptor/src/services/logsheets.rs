//! Log sheet intake and queries.
//!
//! Intake answers per record, so one bad sheet never blocks its batch:
//!
//! ```text
//!   for each element of the JSON array:
//!     no usable client_uuid  ──► skipped (cannot be addressed)
//!     malformed fields       ──► rejected { detail }
//!     fails validation       ──► rejected { detail }
//!     new client_uuid        ──► stored,  accepted
//!     known client_uuid      ──► nothing, duplicate
//! ```
//!
//! A storage failure aborts the request with a 500; rows written before it
//! stay, and the device's resend comes back as `duplicate` for those.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use fieldlog_core::validation::validate_log_sheet;
use fieldlog_core::RecordId;
use fieldlog_sync::protocol::DEVICE_ID_HEADER;
use fieldlog_sync::{RecordOutcome, WireRecord};

use crate::auth::authorize;
use crate::db::StoredLogSheet;
use crate::error::AcceptorError;
use crate::AppState;

const DEFAULT_LIST_LIMIT: u32 = 100;
const MAX_LIST_LIMIT: u32 = 1000;

/// `POST /api/v1/logsheets`
pub async fn submit_batch(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Vec<RecordOutcome>>, AcceptorError> {
    authorize(&headers, state.config.auth_token.as_deref())?;

    let device_id = headers
        .get(DEVICE_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let batch: Vec<Value> = serde_json::from_slice(&body)
        .map_err(|e| AcceptorError::InvalidRequest(format!("expected a JSON array: {}", e)))?;

    if batch.len() > state.config.max_batch_size {
        return Err(AcceptorError::BatchTooLarge {
            size: batch.len(),
            limit: state.config.max_batch_size,
        });
    }

    info!(
        device_id = device_id.as_deref().unwrap_or("unknown"),
        count = batch.len(),
        "Processing batch"
    );

    let mut outcomes = Vec::with_capacity(batch.len());
    for value in batch {
        let id = match client_uuid(&value) {
            Some(id) => id,
            None => {
                warn!("Skipping record without client_uuid");
                continue;
            }
        };

        let record: WireRecord = match serde_json::from_value(value) {
            Ok(record) => record,
            Err(e) => {
                outcomes.push(RecordOutcome::rejected(id, format!("malformed record: {}", e)));
                continue;
            }
        };

        if let Err(e) = validate_log_sheet(&record.sheet) {
            outcomes.push(RecordOutcome::rejected(id, e.to_string()));
            continue;
        }

        if state
            .db
            .insert_logsheet(&record, device_id.as_deref())
            .await?
        {
            outcomes.push(RecordOutcome::accepted(id));
        } else {
            debug!(id = %id, "Duplicate record");
            outcomes.push(RecordOutcome::duplicate(id));
        }
    }

    Ok(Json(outcomes))
}

fn client_uuid(value: &Value) -> Option<RecordId> {
    value
        .get("client_uuid")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
}

/// Query string for the list endpoint.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub station_code: Option<String>,
    pub limit: Option<u32>,
}

/// `GET /api/v1/logsheets?station_code=&limit=`
pub async fn list_logsheets(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<StoredLogSheet>>, AcceptorError> {
    authorize(&headers, state.config.auth_token.as_deref())?;

    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);

    let sheets = state
        .db
        .list_logsheets(params.station_code.as_deref(), limit)
        .await?;

    Ok(Json(sheets))
}

/// `GET /api/v1/logsheets/{client_uuid}`
pub async fn get_logsheet(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(client_uuid): Path<String>,
) -> Result<Json<StoredLogSheet>, AcceptorError> {
    authorize(&headers, state.config.auth_token.as_deref())?;

    state
        .db
        .get_logsheet(&client_uuid)
        .await?
        .map(Json)
        .ok_or_else(|| AcceptorError::NotFound(format!("log sheet {}", client_uuid)))
}
