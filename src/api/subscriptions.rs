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

//! Subscription endpoints: CRUD, pause/resume, topic set, stats.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::core::routing::TopicMatcher;
use crate::core::subscription::{SubscriptionConfig, SubscriptionError};

use super::publish::error_response;
use super::AppState;

fn subscription_error_response(err: SubscriptionError) -> Response {
    match err {
        SubscriptionError::InvalidConfig(reason) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": reason }))).into_response()
        }
        SubscriptionError::NotFound => error_response(StatusCode::NOT_FOUND, "not found"),
    }
}

/// `GET /api/v1/subscriptions`
pub async fn list(State(state): State<Arc<AppState>>) -> Response {
    Json(state.manager.list()).into_response()
}

/// `POST /api/v1/subscriptions`
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(config): Json<SubscriptionConfig>,
) -> Response {
    match state.manager.create(config) {
        Ok(sub) => (StatusCode::CREATED, Json(sub)).into_response(),
        Err(err) => subscription_error_response(err),
    }
}

/// `GET /api/v1/subscriptions/:id`
pub async fn get(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.manager.get(&id) {
        Ok(sub) => Json(sub).into_response(),
        Err(err) => subscription_error_response(err),
    }
}

/// `PUT /api/v1/subscriptions/:id`
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(config): Json<SubscriptionConfig>,
) -> Response {
    match state.manager.update(&id, config) {
        Ok(sub) => Json(sub).into_response(),
        Err(err) => subscription_error_response(err),
    }
}

/// `DELETE /api/v1/subscriptions/:id`
pub async fn delete(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.manager.delete(&id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => subscription_error_response(err),
    }
}

/// `POST /api/v1/subscriptions/:id/pause`
pub async fn pause(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.manager.pause(&id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => subscription_error_response(err),
    }
}

/// `POST /api/v1/subscriptions/:id/resume`
pub async fn resume(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.manager.resume(&id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => subscription_error_response(err),
    }
}

/// `GET /api/v1/subscriptions/topics` — the deterministic required set.
pub async fn topics(State(state): State<Arc<AppState>>) -> Response {
    let schemas = state.manager.active_schemas();
    let matcher = TopicMatcher::build(&state.own_peer_id, schemas.iter().map(String::as_str));
    Json(json!({ "topics": matcher.required_topics() })).into_response()
}

/// `GET /api/v1/subscriptions/stats`
pub async fn stats(State(state): State<Arc<AppState>>) -> Response {
    let subs = state.manager.list();
    let rows: Vec<serde_json::Value> = subs
        .iter()
        .map(|s| {
            json!({
                "id": s.id,
                "status": s.status,
                "message_count": s.message_count,
                "last_message_at_ms": s.last_message_at_ms,
            })
        })
        .collect();
    Json(json!({ "subscriptions": rows, "count": rows.len() })).into_response()
}
