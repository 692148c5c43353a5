#![forbid(unsafe_code)]

use std::sync::Arc;

use tokio::sync::mpsc;

use sdn_node::core::routing::{
    PublishOptions, Router, RouterConfig, RoutingHeader, TopicMatcher,
};
use sdn_node::core::subscription::SubscriptionManager;
use sdn_node::monitoring::metrics::Metrics;

fn local_router() -> (Router, mpsc::Receiver<sdn_node::core::routing::OutboundMessage>) {
    let (tx, rx) = mpsc::channel(8);
    let router = Router::new(
        "L",
        RouterConfig::default(),
        SubscriptionManager::new(),
        tx,
        Arc::new(Metrics::new().expect("metrics")),
    );
    (router, rx)
}

#[tokio::test]
async fn relay_decrements_ttl_and_targets_peer_topic() {
    let (router, mut rx) = local_router();

    let mut header = RoutingHeader::new("OMM", "S");
    header.destinations = vec!["X".into()];
    header.ttl = 3;
    let wire = header.encode_message(b"payload").expect("encode");

    router.handle_inbound("S", &wire).await;

    let out = rx.recv().await.expect("forwarded copy");
    assert_eq!(out.topic, "/sdn/peer/X");
    let (forwarded, payload) = RoutingHeader::decode_message(&out.data).expect("decode");
    assert_eq!(forwarded.ttl, 2);
    assert_eq!(forwarded.destinations, vec!["X".to_string()]);
    assert_eq!(payload, b"payload");
}

#[tokio::test]
async fn ttl_of_one_emits_no_forwarded_copy() {
    let (router, mut rx) = local_router();

    let mut header = RoutingHeader::new("OMM", "S");
    header.destinations = vec!["X".into()];
    header.ttl = 1;
    router
        .handle_inbound("S", &header.encode_message(b"p").expect("encode"))
        .await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn publish_then_relay_chain_preserves_payload() {
    // L publishes; a second router R relays what L emitted.
    let (router_l, mut rx_l) = local_router();
    router_l
        .publish(
            "OMM",
            br#"{"OBJECT_NAME":"ISS"}"#,
            PublishOptions {
                destinations: vec!["X".into(), "Y".into()],
                ..PublishOptions::default()
            },
        )
        .await
        .expect("publish");
    let emitted = rx_l.recv().await.expect("emitted");
    assert_eq!(emitted.topic, "/sdn/data/OMM");

    let (tx, mut rx_r) = mpsc::channel(8);
    let router_r = Router::new(
        "R",
        RouterConfig::default(),
        SubscriptionManager::new(),
        tx,
        Arc::new(Metrics::new().expect("metrics")),
    );
    router_r.handle_inbound("L", &emitted.data).await;

    let relayed = rx_r.recv().await.expect("relayed");
    let (header, payload) = RoutingHeader::decode_message(&relayed.data).expect("decode");
    assert_eq!(header.source, "L");
    assert_eq!(payload, br#"{"OBJECT_NAME":"ISS"}"#);
}

#[test]
fn topic_matcher_covers_required_set() {
    let matcher = TopicMatcher::build("L", ["OMM", "CDM.fbs"]);
    let topics = matcher.required_topics();
    assert!(topics.contains(&"/sdn/data/OMM".to_string()));
    assert!(topics.contains(&"/sdn/data/CDM".to_string()));
    assert!(topics.contains(&"/spacedatanetwork/sds/CDM.fbs".to_string()));
    assert!(topics.contains(&"/sdn/peer/L".to_string()));
}
