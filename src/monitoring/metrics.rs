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

use prometheus::{IntCounter, IntGauge, Registry};
use thiserror::Error;

/// Metrics errors.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus")]
    Prom,
}

/// Metrics container.
#[derive(Clone)]
pub struct Metrics {
    /// Registry.
    pub registry: Registry,

    /// Connected peers gauge.
    pub p2p_peers: IntGauge,
    /// Connections denied by the gate.
    pub gate_denied_total: IntCounter,

    /// Inbound messages whose routing header failed to parse.
    pub router_parse_failed_total: IntCounter,
    /// Messages relayed onward with a decremented TTL.
    pub router_forwarded_total: IntCounter,
    /// Messages delivered to the local subscription fabric.
    pub router_delivered_total: IntCounter,
    /// Messages dropped for an exhausted hop budget.
    pub router_ttl_dropped_total: IntCounter,

    /// Records accepted by the store.
    pub records_stored_total: IntCounter,
    /// Writes rejected by the quota ledger.
    pub records_quota_rejected_total: IntCounter,

    /// Profile exchanges answered.
    pub profile_served_total: IntCounter,
    /// Profile exchange protocol errors.
    pub profile_errors_total: IntCounter,
}

impl Metrics {
    /// Create and register metrics.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let p2p_peers =
            IntGauge::new("sdn_p2p_peers", "Connected peers").map_err(|_| MetricsError::Prom)?;
        let gate_denied_total =
            IntCounter::new("sdn_gate_denied_total", "Connections denied by the gate")
                .map_err(|_| MetricsError::Prom)?;

        let router_parse_failed_total = IntCounter::new(
            "sdn_router_parse_failed_total",
            "Inbound messages with unparseable routing headers",
        )
        .map_err(|_| MetricsError::Prom)?;
        let router_forwarded_total = IntCounter::new(
            "sdn_router_forwarded_total",
            "Messages relayed with decremented TTL",
        )
        .map_err(|_| MetricsError::Prom)?;
        let router_delivered_total = IntCounter::new(
            "sdn_router_delivered_total",
            "Messages delivered to the subscription fabric",
        )
        .map_err(|_| MetricsError::Prom)?;
        let router_ttl_dropped_total = IntCounter::new(
            "sdn_router_ttl_dropped_total",
            "Messages dropped for exhausted TTL",
        )
        .map_err(|_| MetricsError::Prom)?;

        let records_stored_total =
            IntCounter::new("sdn_records_stored_total", "Records accepted by the store")
                .map_err(|_| MetricsError::Prom)?;
        let records_quota_rejected_total = IntCounter::new(
            "sdn_records_quota_rejected_total",
            "Writes rejected by the quota ledger",
        )
        .map_err(|_| MetricsError::Prom)?;

        let profile_served_total =
            IntCounter::new("sdn_profile_served_total", "Profile exchanges answered")
                .map_err(|_| MetricsError::Prom)?;
        let profile_errors_total = IntCounter::new(
            "sdn_profile_errors_total",
            "Profile exchange protocol errors",
        )
        .map_err(|_| MetricsError::Prom)?;

        registry
            .register(Box::new(p2p_peers.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(gate_denied_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(router_parse_failed_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(router_forwarded_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(router_delivered_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(router_ttl_dropped_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(records_stored_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(records_quota_rejected_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(profile_served_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(profile_errors_total.clone()))
            .map_err(|_| MetricsError::Prom)?;

        Ok(Self {
            registry,
            p2p_peers,
            gate_denied_total,
            router_parse_failed_total,
            router_forwarded_total,
            router_delivered_total,
            router_ttl_dropped_total,
            records_stored_total,
            records_quota_rejected_total,
            profile_served_total,
            profile_errors_total,
        })
    }
}
