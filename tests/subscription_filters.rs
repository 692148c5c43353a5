#![forbid(unsafe_code)]

use std::sync::Arc;

use serde_json::json;

use sdn_node::core::subscription::{
    Delivery, Filter, FilterOp, SubscriptionConfig, SubscriptionManager, SOURCE_WILDCARD,
};

fn iss_filter_config() -> SubscriptionConfig {
    SubscriptionConfig {
        schemas: vec!["OMM".into()],
        sources: vec![SOURCE_WILDCARD.into()],
        filters: vec![Filter {
            field: "OBJECT_NAME".into(),
            op: FilterOp::Eq,
            value: json!("ISS"),
        }],
        ..SubscriptionConfig::default()
    }
}

#[tokio::test]
async fn object_name_filter_selects_exactly_matching_records() {
    let mgr = SubscriptionManager::new();
    mgr.create(iss_filter_config()).expect("create");

    assert_eq!(
        mgr.on_message("OMM", "peer", br#"{"OBJECT_NAME":"ISS"}"#, None),
        1
    );
    assert_eq!(
        mgr.on_message("OMM", "peer", br#"{"OBJECT_NAME":"HST"}"#, None),
        0
    );
    // A record without the field does not match eq.
    assert_eq!(
        mgr.on_message("OMM", "peer", br#"{"NORAD_CAT_ID":25544}"#, None),
        0
    );
}

#[tokio::test]
async fn deliveries_reach_attached_handlers_in_order() {
    let mgr = SubscriptionManager::new();
    let sub = mgr.create(iss_filter_config()).expect("create");

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    mgr.add_handler(
        &sub.id,
        Arc::new(move |delivery: &Delivery| {
            let _ = tx.send(String::from_utf8_lossy(&delivery.payload).into_owned());
        }),
    )
    .expect("handler");

    mgr.on_message("OMM", "peer", br#"{"OBJECT_NAME":"ISS","N":1}"#, None);
    mgr.on_message("OMM", "peer", br#"{"OBJECT_NAME":"ISS","N":2}"#, None);

    let first = rx.recv().await.expect("first");
    let second = rx.recv().await.expect("second");
    assert!(first.contains("\"N\":1"));
    assert!(second.contains("\"N\":2"));
}

#[tokio::test]
async fn global_handlers_observe_all_subscriptions() {
    let mgr = SubscriptionManager::new();
    mgr.create(SubscriptionConfig {
        schemas: vec!["OMM".into()],
        sources: vec![SOURCE_WILDCARD.into()],
        ..SubscriptionConfig::default()
    })
    .expect("omm");
    mgr.create(SubscriptionConfig {
        schemas: vec!["CDM".into()],
        sources: vec![SOURCE_WILDCARD.into()],
        ..SubscriptionConfig::default()
    })
    .expect("cdm");

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    mgr.add_global_handler(Arc::new(move |delivery: &Delivery| {
        let _ = tx.send(delivery.schema.clone());
    }));

    mgr.on_message("OMM", "p", b"{}", None);
    mgr.on_message("CDM", "p", b"{}", None);

    let mut seen = vec![rx.recv().await.expect("a"), rx.recv().await.expect("b")];
    seen.sort();
    assert_eq!(seen, vec!["CDM".to_string(), "OMM".to_string()]);
}

#[tokio::test]
async fn rate_limit_bounds_deliveries_per_window() {
    let mgr = SubscriptionManager::new();
    let mut cfg = iss_filter_config();
    cfg.rate_limit = 2;
    mgr.create(cfg).expect("create");

    let mut delivered = 0;
    for _ in 0..5 {
        delivered += mgr.on_message("OMM", "peer", br#"{"OBJECT_NAME":"ISS"}"#, None);
    }
    assert_eq!(delivered, 2);
}
