// Copyright (c) 2026 Space Data Network
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]

//! Publish endpoints: single record and length-prefixed batch.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;
use tracing::debug;

use crate::core::record::{batch, BatchError, StoreError};
use crate::core::routing::PublishOptions;

use super::AppState;

/// `POST /api/v1/data/publish/:schema`
pub async fn publish_one(
    State(state): State<Arc<AppState>>,
    Path(schema): Path<String>,
    body: Bytes,
) -> Response {
    if body.len() > state.max_payload_bytes {
        return error_response(StatusCode::PAYLOAD_TOO_LARGE, "payload too large");
    }
    if body.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "empty payload");
    }

    let writer = state.own_peer_id.clone();
    match state.store.store(&schema, &body, &writer, None) {
        Ok(cid) => {
            state.metrics.records_stored_total.inc();
            // Offer the record to the overlay and local subscribers.
            if let Err(e) = state
                .router
                .publish(&schema, &body, PublishOptions::default())
                .await
            {
                debug!(err = ?e, "overlay publish failed; record stored");
            }
            state.manager.on_message(&schema, &writer, &body, None);

            (
                StatusCode::CREATED,
                Json(json!({
                    "cid": cid.to_string(),
                    "schema": schema,
                    "storedAt": Utc::now().to_rfc3339(),
                    "bytes": body.len(),
                })),
            )
                .into_response()
        }
        Err(err) => store_error_response(&state, err),
    }
}

/// `POST /api/v1/data/publish/batch/:schema`
pub async fn publish_batch(
    State(state): State<Arc<AppState>>,
    Path(schema): Path<String>,
    body: Bytes,
) -> Response {
    let writer = state.own_peer_id.clone();
    match batch::publish_batch(&state.store, &schema, &writer, &body, state.max_payload_bytes) {
        Ok(results) => {
            let stored = results.iter().filter(|r| r.cid.is_some()).count();
            state.metrics.records_stored_total.inc_by(stored as u64);
            (
                StatusCode::CREATED,
                Json(json!({
                    "schema": schema,
                    "results": results,
                })),
            )
                .into_response()
        }
        Err(BatchError::Malformed) => error_response(StatusCode::BAD_REQUEST, "malformed batch stream"),
        Err(BatchError::RecordTooLarge) => {
            error_response(StatusCode::PAYLOAD_TOO_LARGE, "batch record too large")
        }
        Err(BatchError::Store(err)) => store_error_response(&state, err),
    }
}

fn store_error_response(state: &AppState, err: StoreError) -> Response {
    match err {
        StoreError::InvalidSchema => error_response(StatusCode::BAD_REQUEST, "invalid schema"),
        StoreError::InvalidPayload => error_response(StatusCode::BAD_REQUEST, "invalid payload"),
        StoreError::QuotaExceeded => {
            state.metrics.records_quota_rejected_total.inc();
            error_response(StatusCode::FORBIDDEN, "quota exceeded")
        }
        StoreError::NotFound => error_response(StatusCode::NOT_FOUND, "not found"),
        StoreError::Db | StoreError::Codec => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "storage error")
        }
    }
}

pub(super) fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
