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

//! Admin endpoints: peers, groups, blocklist, settings, registry
//! export/import, quotas, record purge.
//!
//! The HTTP listener is bound to the operator's loopback by default; the
//! local operator acts at Admin level.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::core::record::{Cid, StoreError};
use crate::core::registry::{
    PeerGroup, RegistryDocument, RegistryError, TrustLevel, TrustedPeer,
};

use super::publish::error_response;
use super::AppState;

fn registry_error_response(err: RegistryError) -> Response {
    match err {
        RegistryError::NotFound => error_response(StatusCode::NOT_FOUND, "not found"),
        RegistryError::AlreadyExists => error_response(StatusCode::CONFLICT, "already exists"),
        RegistryError::InvalidTrustLevel => {
            error_response(StatusCode::BAD_REQUEST, "invalid trust level")
        }
        RegistryError::Persist | RegistryError::Load => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "registry persistence")
        }
    }
}

// ---- peers ----

/// `GET /api/v1/admin/peers`
pub async fn list_peers(State(state): State<Arc<AppState>>) -> Response {
    Json(state.registry.list_peers()).into_response()
}

/// `POST /api/v1/admin/peers`
pub async fn add_peer(
    State(state): State<Arc<AppState>>,
    Json(peer): Json<TrustedPeer>,
) -> Response {
    if peer.peer_id.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "empty peer id");
    }
    match state.registry.add_peer(peer) {
        Ok(()) => StatusCode::CREATED.into_response(),
        Err(err) => registry_error_response(err),
    }
}

/// `GET /api/v1/admin/peers/:id`
pub async fn get_peer(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.registry.get_peer(&id) {
        Some(peer) => Json(peer).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "not found"),
    }
}

/// `DELETE /api/v1/admin/peers/:id`
pub async fn remove_peer(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.registry.remove_peer(&id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => registry_error_response(err),
    }
}

/// Body for the trust-level update.
#[derive(Debug, Deserialize)]
pub struct TrustBody {
    /// New level.
    pub trust_level: TrustLevel,
}

/// `PUT /api/v1/admin/peers/:id/trust`
pub async fn set_trust(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<TrustBody>,
) -> Response {
    match state.registry.set_trust_level(&id, body.trust_level) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => registry_error_response(err),
    }
}

// ---- groups ----

/// `GET /api/v1/admin/groups`
pub async fn list_groups(State(state): State<Arc<AppState>>) -> Response {
    Json(state.registry.list_groups()).into_response()
}

/// `POST /api/v1/admin/groups`
pub async fn add_group(
    State(state): State<Arc<AppState>>,
    Json(group): Json<PeerGroup>,
) -> Response {
    if group.name.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "empty group name");
    }
    match state.registry.add_group(group, TrustLevel::Admin) {
        Ok(()) => StatusCode::CREATED.into_response(),
        Err(err) => registry_error_response(err),
    }
}

/// `GET /api/v1/admin/groups/:name`
pub async fn get_group(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> Response {
    match state.registry.get_group(&name) {
        Some(group) => Json(group).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "not found"),
    }
}

/// `DELETE /api/v1/admin/groups/:name`
pub async fn remove_group(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Response {
    match state.registry.remove_group(&name) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => registry_error_response(err),
    }
}

/// Body naming a peer.
#[derive(Debug, Deserialize)]
pub struct PeerBody {
    /// Base58 peer id.
    pub peer_id: String,
}

/// `POST /api/v1/admin/groups/:name/peers`
pub async fn add_group_peer(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(body): Json<PeerBody>,
) -> Response {
    match state.registry.add_peer_to_group(&name, &body.peer_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => registry_error_response(err),
    }
}

/// `DELETE /api/v1/admin/groups/:name/peers/:id`
pub async fn remove_group_peer(
    State(state): State<Arc<AppState>>,
    Path((name, id)): Path<(String, String)>,
) -> Response {
    match state.registry.remove_peer_from_group(&name, &id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => registry_error_response(err),
    }
}

// ---- blocklist ----

/// `GET /api/v1/admin/blocklist`
pub async fn list_blocked(State(state): State<Arc<AppState>>) -> Response {
    Json(state.gate.blocked()).into_response()
}

/// `POST /api/v1/admin/blocklist`
pub async fn block_peer(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PeerBody>,
) -> Response {
    if body.peer_id.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "empty peer id");
    }
    match state.gate.block(&body.peer_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(_) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "blocklist persistence"),
    }
}

/// `DELETE /api/v1/admin/blocklist/:id`
pub async fn unblock_peer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.gate.unblock(&id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(_) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "blocklist persistence"),
    }
}

// ---- settings ----

/// Settings body.
#[derive(Debug, Deserialize)]
pub struct SettingsBody {
    /// Strict-mode toggle.
    pub strict_mode: bool,
}

/// `GET /api/v1/admin/settings`
pub async fn get_settings(State(state): State<Arc<AppState>>) -> Response {
    Json(json!({ "strict_mode": state.registry.strict_mode() })).into_response()
}

/// `PUT /api/v1/admin/settings`
pub async fn put_settings(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SettingsBody>,
) -> Response {
    match state.registry.set_strict_mode(body.strict_mode) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => registry_error_response(err),
    }
}

// ---- export / import ----

/// `GET /api/v1/admin/registry/export`
pub async fn export_registry(State(state): State<Arc<AppState>>) -> Response {
    Json(state.registry.export()).into_response()
}

/// Import query string.
#[derive(Debug, Default, Deserialize)]
pub struct ImportParams {
    /// Keep existing entries when set.
    #[serde(default)]
    pub merge: bool,
}

/// `POST /api/v1/admin/registry/import?merge=true`
pub async fn import_registry(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ImportParams>,
    Json(doc): Json<RegistryDocument>,
) -> Response {
    match state.registry.import(doc, params.merge) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => registry_error_response(err),
    }
}

// ---- quotas & purge ----

/// Quota body.
#[derive(Debug, Deserialize)]
pub struct QuotaBody {
    /// New quota in bytes.
    pub bytes_quota: u64,
}

/// `GET /api/v1/admin/quota/:writer`
pub async fn get_quota(State(state): State<Arc<AppState>>, Path(writer): Path<String>) -> Response {
    let stored = state.store.peer_storage_bytes(&writer);
    let quota = state.store.peer_quota_bytes(&writer);
    match (stored, quota) {
        (Ok(stored), Ok(quota)) => Json(json!({
            "writer": writer,
            "bytes_stored": stored,
            "bytes_quota": quota,
        }))
        .into_response(),
        _ => error_response(StatusCode::INTERNAL_SERVER_ERROR, "storage error"),
    }
}

/// `PUT /api/v1/admin/quota/:writer`
pub async fn put_quota(
    State(state): State<Arc<AppState>>,
    Path(writer): Path<String>,
    Json(body): Json<QuotaBody>,
) -> Response {
    match state.store.set_peer_quota(&writer, body.bytes_quota) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(_) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "storage error"),
    }
}

/// `DELETE /api/v1/admin/records/:cid`
pub async fn purge_record(
    State(state): State<Arc<AppState>>,
    Path(cid): Path<String>,
) -> Response {
    let Ok(cid) = Cid::parse(&cid) else {
        return error_response(StatusCode::BAD_REQUEST, "malformed cid");
    };
    match state.store.delete(&cid) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(StoreError::NotFound) => error_response(StatusCode::NOT_FOUND, "not found"),
        Err(_) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "storage error"),
    }
}
