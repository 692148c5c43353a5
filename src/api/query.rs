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

//! Query endpoint with conditional reads and tiered cache headers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use subtle::ConstantTimeEq;

use crate::core::record::{conditional_meta, encode_batch, IndexQuery, Record, StoreError};
use crate::core::value::decode_object;

use super::publish::error_response;
use super::AppState;

const CACHE_RECENT: &str = "public, max-age=30, s-maxage=120, stale-while-revalidate=300";
const CACHE_OLD: &str = "public, max-age=300, s-maxage=86400, stale-while-revalidate=86400";

/// Query string for `GET /api/v1/data/query/:schema`.
#[derive(Debug, Deserialize)]
pub struct QueryParams {
    /// `YYYY-MM-DD` day cell.
    pub day: Option<String>,
    /// Entity key cell.
    pub entity_id: Option<String>,
    /// Numeric key cell.
    pub numeric_key: Option<i64>,
    /// Page size; zero or negative selects the server default.
    pub limit: Option<i64>,
    /// Page offset; negative clamps to zero.
    pub offset: Option<i64>,
    /// `json` (default) or `flatbuffers`.
    pub format: Option<String>,
}

/// `GET /api/v1/data/query/:schema`
pub async fn query_schema(
    State(state): State<Arc<AppState>>,
    Path(schema): Path<String>,
    Query(params): Query<QueryParams>,
    headers: HeaderMap,
) -> Response {
    let day = match params.day.as_deref().filter(|d| !d.is_empty()) {
        None => None,
        Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(parsed) => Some((raw.to_string(), parsed)),
            Err(_) => return error_response(StatusCode::BAD_REQUEST, "invalid day"),
        },
    };

    let query = IndexQuery {
        day: day.as_ref().map(|(raw, _)| raw.clone()),
        numeric_key: params.numeric_key,
        entity_key: params.entity_id.clone(),
        limit: params.limit.map_or(0, |l| l.max(0) as usize),
        offset: params.offset.map_or(0, |o| o.max(0) as usize),
    };

    let records = match state.store.query_by_indexed_fields(&schema, &query) {
        Ok(records) => records,
        Err(StoreError::InvalidSchema) => {
            return error_response(StatusCode::BAD_REQUEST, "invalid schema")
        }
        Err(_) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, "storage error"),
    };

    let meta = conditional_meta(&records);
    let etag = format!("\"{}\"", meta.etag);
    let cache_control = cache_rule(day.as_ref().map(|(_, parsed)| *parsed));

    if client_has_current(&headers, &etag) {
        let mut response = StatusCode::NOT_MODIFIED.into_response();
        set_common_headers(&mut response, &etag, &meta.last_modified, cache_control);
        return response;
    }

    let format = params.format.as_deref().unwrap_or("json");
    let mut response = match format {
        "flatbuffers" => {
            let body = encode_batch(records.iter().map(|r| r.payload.as_slice()));
            let mut response = (StatusCode::OK, body).into_response();
            let headers = response.headers_mut();
            headers.insert(
                header::CONTENT_TYPE,
                header::HeaderValue::from_static("application/x-flatbuffers"),
            );
            headers.insert(
                "X-Stream-Format",
                header::HeaderValue::from_static("length-prefixed-u32be"),
            );
            response
        }
        "json" => {
            let rows: Vec<serde_json::Value> = records.iter().map(record_json).collect();
            Json(json!({ "records": rows, "count": records.len() })).into_response()
        }
        _ => return error_response(StatusCode::BAD_REQUEST, "invalid format"),
    };

    if let Ok(count) = header::HeaderValue::from_str(&records.len().to_string()) {
        response.headers_mut().insert("X-Record-Count", count);
    }
    set_common_headers(&mut response, &etag, &meta.last_modified, cache_control);
    response
}

fn record_json(record: &Record) -> serde_json::Value {
    let payload = match decode_object(&record.payload) {
        Some(value) => value,
        None => json!({ "hex": hex::encode(&record.payload) }),
    };
    json!({
        "cid": record.cid.to_string(),
        "schema": record.schema,
        "writer": record.writer,
        "receivedAt": record.received_at_ms,
        "day": record.day,
        "numericKey": record.numeric_key,
        "entityKey": record.entity_key,
        "payload": payload,
    })
}

/// Recent days get a short public TTL; anything older than a day is safe to
/// cache aggressively. A missing day follows the recent rule.
fn cache_rule(day: Option<NaiveDate>) -> &'static str {
    match day {
        Some(day) => {
            let age_days = (Utc::now().date_naive() - day).num_days();
            if age_days > 1 {
                CACHE_OLD
            } else {
                CACHE_RECENT
            }
        }
        None => CACHE_RECENT,
    }
}

fn client_has_current(headers: &HeaderMap, etag: &str) -> bool {
    let Some(candidate) = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };
    candidate
        .split(',')
        .map(str::trim)
        .any(|c| c == "*" || etag_eq(c, etag))
}

fn etag_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

fn set_common_headers(
    response: &mut Response,
    etag: &str,
    last_modified: &Option<String>,
    cache_control: &'static str,
) {
    let headers = response.headers_mut();
    if let Ok(value) = header::HeaderValue::from_str(etag) {
        headers.insert(header::ETAG, value);
    }
    if let Some(date) = last_modified {
        if let Ok(value) = header::HeaderValue::from_str(date) {
            headers.insert(header::LAST_MODIFIED, value);
        }
    }
    headers.insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static(cache_control),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_rule_tiers() {
        let today = Utc::now().date_naive();
        assert_eq!(cache_rule(Some(today)), CACHE_RECENT);
        assert_eq!(cache_rule(Some(today - chrono::Days::new(1))), CACHE_RECENT);
        assert_eq!(cache_rule(Some(today - chrono::Days::new(3))), CACHE_OLD);
        // Future days and missing days use the recent rule.
        assert_eq!(cache_rule(Some(today + chrono::Days::new(7))), CACHE_RECENT);
        assert_eq!(cache_rule(None), CACHE_RECENT);
    }

    #[test]
    fn if_none_match_handles_lists_and_wildcard() {
        let mut headers = HeaderMap::new();
        headers.insert(header::IF_NONE_MATCH, "\"abc\", \"def\"".parse().unwrap());
        assert!(client_has_current(&headers, "\"def\""));
        assert!(!client_has_current(&headers, "\"zzz\""));

        let mut headers = HeaderMap::new();
        headers.insert(header::IF_NONE_MATCH, "*".parse().unwrap());
        assert!(client_has_current(&headers, "\"anything\""));
    }
}
