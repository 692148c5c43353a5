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

//! Wire-level forwarding: local delivery, relay decisions, TTL decrement.
//!
//! The router sits between the gossip overlay and the subscription fabric.
//! It never blocks on handler execution (the manager dispatches sinks on
//! their own tasks) and only awaits the overlay send channel.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::core::subscription::SubscriptionManager;
use crate::monitoring::metrics::Metrics;

use super::header::{EncryptionMode, HeaderError, RoutingHeader, DEFAULT_TTL};
use super::topics::derive_topic;

/// A message bound for the gossip overlay.
#[derive(Clone, Debug)]
pub struct OutboundMessage {
    /// Topic to emit on.
    pub topic: String,
    /// Full wire bytes (header ‖ payload).
    pub data: Vec<u8>,
}

/// Router behaviour knobs.
#[derive(Clone, Copy, Debug)]
pub struct RouterConfig {
    /// Whether this node re-emits messages for others.
    pub relay_mode: bool,
    /// TTL stamped on locally published messages.
    pub default_ttl: u8,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            relay_mode: true,
            default_ttl: DEFAULT_TTL,
        }
    }
}

/// Publisher-side options for one message.
#[derive(Clone, Debug, Default)]
pub struct PublishOptions {
    /// Destination peers; empty broadcasts.
    pub destinations: Vec<String>,
    /// Mark the payload encrypted.
    pub encrypted: bool,
    /// Encryption scheme selector.
    pub encryption_mode: EncryptionMode,
    /// Session key id for the session-key mode.
    pub session_key_id: Option<String>,
    /// Relay priority hint.
    pub priority: u8,
    /// Per-message TTL override.
    pub ttl: Option<u8>,
    /// Explicit topic override.
    pub topic_override: Option<String>,
}

/// Router errors.
#[derive(Debug, Error)]
pub enum RouterError {
    /// Overlay send channel closed.
    #[error("overlay unavailable")]
    Overlay,
    /// Header construction failed.
    #[error(transparent)]
    Header(#[from] HeaderError),
}

/// Forwarding and delivery engine.
pub struct Router {
    own_peer_id: String,
    config: RouterConfig,
    manager: SubscriptionManager,
    outbound: mpsc::Sender<OutboundMessage>,
    metrics: Arc<Metrics>,
    sequence: AtomicU64,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

impl Router {
    /// Build a router emitting onto `outbound`.
    pub fn new(
        own_peer_id: impl Into<String>,
        config: RouterConfig,
        manager: SubscriptionManager,
        outbound: mpsc::Sender<OutboundMessage>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            own_peer_id: own_peer_id.into(),
            config,
            manager,
            outbound,
            metrics,
            sequence: AtomicU64::new(0),
        }
    }

    /// This node's peer id.
    pub fn own_peer_id(&self) -> &str {
        &self.own_peer_id
    }

    /// Publish a payload from this node. Stamps source, sequence, and
    /// timestamp, then emits on the derived topic.
    pub async fn publish(
        &self,
        schema: &str,
        payload: &[u8],
        opts: PublishOptions,
    ) -> Result<(), RouterError> {
        let header = RoutingHeader {
            schema: schema.to_string(),
            destinations: opts.destinations,
            ttl: opts.ttl.unwrap_or(self.config.default_ttl),
            priority: opts.priority,
            encrypted: opts.encrypted,
            encryption_mode: opts.encryption_mode,
            session_key_id: opts.session_key_id,
            source: self.own_peer_id.clone(),
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed) + 1,
            timestamp_ms: now_ms(),
            topic_override: opts.topic_override,
            signature: None,
        };
        let topic = derive_topic(&header);
        let data = header.encode_message(payload)?;
        self.outbound
            .send(OutboundMessage { topic, data })
            .await
            .map_err(|_| RouterError::Overlay)
    }

    /// Handle a message received from the overlay. `sender` is the peer the
    /// bytes physically arrived from (not necessarily the source).
    pub async fn handle_inbound(&self, sender: &str, data: &[u8]) {
        let (mut header, payload) = match RoutingHeader::decode_message(data) {
            Ok(parts) => parts,
            Err(err) => {
                debug!(%sender, ?err, "dropping message with unparseable header");
                self.metrics.router_parse_failed_total.inc();
                return;
            }
        };

        let is_for_us = header.destinations.is_empty()
            || header.destinations.iter().any(|d| d == &self.own_peer_id);
        if is_for_us {
            self.metrics.router_delivered_total.inc();
            let delivered = self.manager.on_message(
                &header.schema,
                &header.source,
                payload,
                Some(header.encrypted),
            );
            trace!(schema = %header.schema, source = %header.source, delivered, "local delivery");
        }

        if !self.config.relay_mode {
            return;
        }
        if header.ttl <= 1 {
            self.metrics.router_ttl_dropped_total.inc();
            return;
        }
        // Remaining destinations once we are served; a message addressed
        // solely to this node is never re-emitted.
        if !header.destinations.is_empty() {
            let remaining: Vec<&String> = header
                .destinations
                .iter()
                .filter(|d| *d != &self.own_peer_id)
                .collect();
            if remaining.is_empty() {
                return;
            }
            // Simple loop-break: never hand the message straight back.
            if remaining.iter().all(|d| d.as_str() == sender) {
                return;
            }
        }

        header.ttl -= 1;
        let topic = derive_topic(&header);
        let data = match header.encode_message(payload) {
            Ok(data) => data,
            Err(err) => {
                debug!(?err, "re-encode failed, dropping relay");
                self.metrics.router_parse_failed_total.inc();
                return;
            }
        };
        if self
            .outbound
            .send(OutboundMessage { topic, data })
            .await
            .is_ok()
        {
            self.metrics.router_forwarded_total.inc();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::subscription::{SubscriptionConfig, SOURCE_WILDCARD};

    fn router(relay: bool) -> (Router, mpsc::Receiver<OutboundMessage>) {
        let (tx, rx) = mpsc::channel(16);
        let router = Router::new(
            "peerL",
            RouterConfig {
                relay_mode: relay,
                default_ttl: 8,
            },
            SubscriptionManager::new(),
            tx,
            Arc::new(Metrics::new().unwrap()),
        );
        (router, rx)
    }

    fn wire(header: &RoutingHeader, payload: &[u8]) -> Vec<u8> {
        header.encode_message(payload).unwrap()
    }

    #[tokio::test]
    async fn relay_decrements_ttl_onto_peer_topic() {
        let (router, mut rx) = router(true);
        let mut header = RoutingHeader::new("OMM", "peerS");
        header.destinations = vec!["peerX".into()];
        header.ttl = 3;

        router.handle_inbound("peerS", &wire(&header, b"p")).await;

        let out = rx.recv().await.unwrap();
        assert_eq!(out.topic, "/sdn/peer/peerX");
        let (forwarded, payload) = RoutingHeader::decode_message(&out.data).unwrap();
        assert_eq!(forwarded.ttl, 2);
        assert_eq!(payload, b"p");
    }

    #[tokio::test]
    async fn ttl_one_is_never_forwarded() {
        let (router, mut rx) = router(true);
        let mut header = RoutingHeader::new("OMM", "peerS");
        header.destinations = vec!["peerX".into()];
        header.ttl = 1;

        router.handle_inbound("peerS", &wire(&header, b"p")).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn message_solely_for_us_is_consumed_not_relayed() {
        let (router, mut rx) = router(true);
        let mut header = RoutingHeader::new("OMM", "peerS");
        header.destinations = vec!["peerL".into()];
        header.ttl = 5;

        router.handle_inbound("peerS", &wire(&header, b"p")).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_is_relayed_and_delivered() {
        let (router, mut rx) = router(true);
        let mut header = RoutingHeader::new("OMM", "peerS");
        header.ttl = 4;

        router.handle_inbound("peerR", &wire(&header, b"p")).await;
        let out = rx.recv().await.unwrap();
        assert_eq!(out.topic, "/sdn/data/OMM");
        let (forwarded, _) = RoutingHeader::decode_message(&out.data).unwrap();
        assert_eq!(forwarded.ttl, 3);
    }

    #[tokio::test]
    async fn never_forwards_straight_back_to_sender() {
        let (router, mut rx) = router(true);
        let mut header = RoutingHeader::new("OMM", "peerS");
        header.destinations = vec!["peerS".into(), "peerL".into()];
        header.ttl = 5;

        router.handle_inbound("peerS", &wire(&header, b"p")).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn relay_mode_off_never_emits() {
        let (router, mut rx) = router(false);
        let mut header = RoutingHeader::new("OMM", "peerS");
        header.destinations = vec!["peerX".into()];
        header.ttl = 5;

        router.handle_inbound("peerS", &wire(&header, b"p")).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn garbage_is_dropped() {
        let (router, mut rx) = router(true);
        router.handle_inbound("peerS", &[0xde, 0xad]).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn delivery_feeds_matching_subscriptions() {
        let (tx, _rx) = mpsc::channel(16);
        let manager = SubscriptionManager::new();
        manager
            .create(SubscriptionConfig {
                schemas: vec!["OMM".into()],
                sources: vec![SOURCE_WILDCARD.into()],
                ..SubscriptionConfig::default()
            })
            .unwrap();
        let router = Router::new(
            "peerL",
            RouterConfig::default(),
            manager.clone(),
            tx,
            Arc::new(Metrics::new().unwrap()),
        );

        let header = RoutingHeader::new("OMM", "peerS");
        router.handle_inbound("peerS", &wire(&header, b"{}")).await;
        assert_eq!(manager.list()[0].message_count, 1);
    }

    #[tokio::test]
    async fn publish_stamps_sequence_and_source() {
        let (router, mut rx) = router(true);
        router
            .publish("OMM", b"{}", PublishOptions::default())
            .await
            .unwrap();
        router
            .publish("OMM", b"{}", PublishOptions::default())
            .await
            .unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        let (h1, _) = RoutingHeader::decode_message(&first.data).unwrap();
        let (h2, _) = RoutingHeader::decode_message(&second.data).unwrap();
        assert_eq!(h1.source, "peerL");
        assert_eq!(h1.sequence + 1, h2.sequence);
        assert_eq!(first.topic, "/sdn/data/OMM");
    }
}
