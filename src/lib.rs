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

//! Space Data Network node - peer-to-peer space-data exchange.
//!
//! This crate provides:
//! - Deterministic identity derivation from a recovery phrase (SLIP-10)
//! - A trusted peer registry with graded trust levels and a connection gate
//! - A content-addressed record store with per-writer quotas
//! - A filterable subscription fabric over a gossipsub overlay with relay
//!   forwarding and TTL decrement
//! - A signed profile-exchange stream protocol
//! - HTTP APIs for publishing, querying, administration, and subscriptions
//! - Monitoring via Prometheus metrics and structured logging

/// HTTP surface (publish, query, admin, subscriptions, metrics).
pub mod api;
/// Core subsystems (identity, registry, records, subscriptions, routing).
pub mod core;
/// Observability (metrics container).
pub mod monitoring;
/// P2P networking stack (libp2p transport, gossip, profile exchange).
pub mod networking;
