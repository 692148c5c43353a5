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
#![warn(missing_docs)]

//! HTTP surface: publish, query, admin, subscriptions, metrics.

mod admin;
mod publish;
mod query;
mod subscriptions;

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Router as HttpRouter,
};
use prometheus::{Encoder, TextEncoder};
use std::time::Duration;
use thiserror::Error;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

use crate::core::record::RecordStore;
use crate::core::registry::{ConnectionGate, TrustRegistry};
use crate::core::routing::Router;
use crate::core::subscription::SubscriptionManager;
use crate::monitoring::metrics::Metrics;

/// API server errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Listener could not bind.
    #[error("bind")]
    Bind,
    /// Serve loop failed.
    #[error("serve")]
    Serve,
}

/// Shared state handed to every handler.
pub struct AppState {
    /// Record store.
    pub store: Arc<RecordStore>,
    /// Trusted peer registry.
    pub registry: Arc<TrustRegistry>,
    /// Connection gate (blocklist admin).
    pub gate: Arc<ConnectionGate>,
    /// Subscription manager.
    pub manager: SubscriptionManager,
    /// Gossip router for publish fan-out.
    pub router: Arc<Router>,
    /// Metrics container.
    pub metrics: Arc<Metrics>,
    /// This node's peer id (the writer for locally published records).
    pub own_peer_id: String,
    /// Max accepted publish body.
    pub max_payload_bytes: usize,
}

/// Assemble the HTTP router.
pub fn build_router(state: Arc<AppState>) -> HttpRouter {
    let body_limit = state.max_payload_bytes.saturating_add(4096);
    HttpRouter::new()
        // data plane
        .route("/api/v1/data/publish/:schema", post(publish::publish_one))
        .route(
            "/api/v1/data/publish/batch/:schema",
            post(publish::publish_batch),
        )
        .route("/api/v1/data/query/:schema", get(query::query_schema))
        // subscriptions
        .route(
            "/api/v1/subscriptions",
            get(subscriptions::list).post(subscriptions::create),
        )
        .route("/api/v1/subscriptions/topics", get(subscriptions::topics))
        .route("/api/v1/subscriptions/stats", get(subscriptions::stats))
        .route(
            "/api/v1/subscriptions/:id",
            get(subscriptions::get)
                .put(subscriptions::update)
                .delete(subscriptions::delete),
        )
        .route("/api/v1/subscriptions/:id/pause", post(subscriptions::pause))
        .route(
            "/api/v1/subscriptions/:id/resume",
            post(subscriptions::resume),
        )
        // admin
        .route(
            "/api/v1/admin/peers",
            get(admin::list_peers).post(admin::add_peer),
        )
        .route(
            "/api/v1/admin/peers/:id",
            get(admin::get_peer).delete(admin::remove_peer),
        )
        .route("/api/v1/admin/peers/:id/trust", put(admin::set_trust))
        .route(
            "/api/v1/admin/groups",
            get(admin::list_groups).post(admin::add_group),
        )
        .route(
            "/api/v1/admin/groups/:name",
            get(admin::get_group).delete(admin::remove_group),
        )
        .route(
            "/api/v1/admin/groups/:name/peers",
            post(admin::add_group_peer),
        )
        .route(
            "/api/v1/admin/groups/:name/peers/:id",
            delete(admin::remove_group_peer),
        )
        .route(
            "/api/v1/admin/blocklist",
            get(admin::list_blocked).post(admin::block_peer),
        )
        .route("/api/v1/admin/blocklist/:id", delete(admin::unblock_peer))
        .route(
            "/api/v1/admin/settings",
            get(admin::get_settings).put(admin::put_settings),
        )
        .route(
            "/api/v1/admin/registry/export",
            get(admin::export_registry),
        )
        .route(
            "/api/v1/admin/registry/import",
            post(admin::import_registry),
        )
        .route(
            "/api/v1/admin/quota/:writer",
            get(admin::get_quota).put(admin::put_quota),
        )
        .route("/api/v1/admin/records/:cid", delete(admin::purge_record))
        // observability
        .route("/metrics", get(metrics_text))
        .route("/healthz", get(|| async { "ok" }))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn serve(state: Arc<AppState>, listen_addr: &str) -> Result<(), ApiError> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .map_err(|_| ApiError::Bind)?;
    info!(addr = %listen_addr, "http api listening");
    axum::serve(listener, app).await.map_err(|_| ApiError::Serve)
}

async fn metrics_text(State(state): State<Arc<AppState>>) -> Response {
    let encoder = TextEncoder::new();
    let families = state.metrics.registry.gather();
    let mut buf = Vec::new();
    if encoder.encode(&families, &mut buf).is_err() {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buf,
    )
        .into_response()
}
