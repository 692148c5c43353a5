#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Space Data Network node entrypoint (systemd-friendly).
//! Wires identity, registry, store, router, swarm, and the HTTP API.

use std::path::Path;
use std::sync::Arc;

use fs2::FileExt;
use tokio::sync::mpsc;
use tracing::{info, warn};

use sdn_node::api::{self, AppState};
use sdn_node::core::config::NodeConfig;
use sdn_node::core::identity::load_or_create_identity;
use sdn_node::core::record::RecordStore;
use sdn_node::core::registry::{ConnectionGate, TrustRegistry};
use sdn_node::core::routing::Router;
use sdn_node::core::subscription::SubscriptionManager;
use sdn_node::monitoring::metrics::Metrics;
use sdn_node::networking::p2p::{spawn_p2p, P2pConfig, P2pDeps};
use sdn_node::networking::profile::build_profile;

fn env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Hold an exclusive lock on the data dir so two nodes never share state.
fn lock_data_dir(data_dir: &str) -> Option<std::fs::File> {
    let path = Path::new(data_dir).join(".lock");
    let file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&path)
        .ok()?;
    file.try_lock_exclusive().ok()?;
    Some(file)
}

#[tokio::main]
async fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .try_init();

    let config_path = env("SDN_CONFIG", "./sdn.toml");
    let config = if Path::new(&config_path).exists() {
        match NodeConfig::load(&config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("config load failed ({config_path}): {e}");
                std::process::exit(1);
            }
        }
    } else {
        NodeConfig::default()
    };

    let data_dir = config.node.data_dir.clone();
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        eprintln!("cannot create data dir {data_dir}: {e}");
        std::process::exit(1);
    }
    let Some(_dir_lock) = lock_data_dir(&data_dir) else {
        eprintln!("data dir {data_dir} is locked by another node");
        std::process::exit(1);
    };

    // Identity: derived from the persisted seed (or a fresh phrase).
    let stored = match load_or_create_identity(&data_dir, config.node.account_index) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("identity init failed: {e}");
            std::process::exit(1);
        }
    };
    if let Some(phrase) = &stored.fresh_phrase {
        // Shown exactly once; the phrase is never persisted.
        warn!("new identity created; record this recovery phrase now: {phrase}");
    }
    let identity = stored.identity;
    let own_peer_id = identity.peer_id.to_base58();
    info!(peer_id = %own_peer_id, account = config.node.account_index, "identity ready");

    let metrics = Arc::new(match Metrics::new() {
        Ok(m) => m,
        Err(e) => {
            eprintln!("metrics init failed: {e}");
            std::process::exit(1);
        }
    });

    // Registry + gate.
    let registry_path = Path::new(&data_dir).join("registry.json");
    let registry = match TrustRegistry::open(&registry_path) {
        Ok(r) => Arc::new(r),
        Err(e) => {
            eprintln!("registry open failed: {e}");
            std::process::exit(1);
        }
    };
    let blocklist_path = Path::new(&data_dir).join("blocklist.json");
    let gate = match ConnectionGate::open(registry.clone(), &blocklist_path) {
        Ok(g) => Arc::new(g),
        Err(e) => {
            eprintln!("gate open failed: {e}");
            std::process::exit(1);
        }
    };

    // Record store.
    let db = match sled::open(Path::new(&data_dir).join("records")) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("sled open failed: {e}");
            std::process::exit(1);
        }
    };
    let store = match RecordStore::open(&db, config.storage.store_config()) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            eprintln!("record store open failed: {e}");
            std::process::exit(1);
        }
    };

    // Subscription fabric + router.
    let manager = SubscriptionManager::new();
    let (outbound_tx, outbound_rx) = mpsc::channel(1024);
    let router = Arc::new(Router::new(
        own_peer_id.clone(),
        config.p2p.router_config(),
        manager.clone(),
        outbound_tx,
        metrics.clone(),
    ));

    // Signed profile advertised to peers.
    let own_profile = match build_profile(
        &identity,
        &config.node.name,
        &config.node.organization,
        &[config.p2p.listen_addr.clone()],
    ) {
        Ok(blob) => blob,
        Err(e) => {
            eprintln!("profile build failed: {e}");
            std::process::exit(1);
        }
    };

    let keypair = match identity.libp2p_keypair() {
        Ok(kp) => kp,
        Err(e) => {
            eprintln!("transport keypair failed: {e}");
            std::process::exit(1);
        }
    };

    let p2p_cfg = P2pConfig {
        listen_addr: config.p2p.listen_addr.clone(),
        bootstrap: config.p2p.bootstrap.clone(),
        agent_version: format!("sdn-node/{}", env!("CARGO_PKG_VERSION")),
    };
    let deps = P2pDeps {
        keypair,
        own_profile,
        gate: gate.clone(),
        registry: registry.clone(),
        router: router.clone(),
        manager: manager.clone(),
        outbound_rx,
        metrics: metrics.clone(),
    };

    let (mut ev_rx, p2p_handle) = match spawn_p2p(p2p_cfg, deps) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("P2P start failed: {e}");
            std::process::exit(1);
        }
    };

    let ev_task = tokio::spawn(async move {
        while let Some(ev) = ev_rx.recv().await {
            info!(?ev, "p2p event");
        }
        warn!("p2p event channel closed");
    });

    // HTTP API.
    let state = Arc::new(AppState {
        store,
        registry,
        gate,
        manager,
        router,
        metrics,
        own_peer_id,
        max_payload_bytes: config.http.max_payload_bytes,
    });
    let http_addr = config.http.listen_addr.clone();
    let http_task = tokio::spawn(async move {
        if let Err(e) = api::serve(state, &http_addr).await {
            warn!(err = ?e, "http api stopped");
        }
    });

    info!(name = %config.node.name, "sdn node started");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("shutdown signal"),
        _ = p2p_handle => warn!("p2p loop exited"),
        _ = http_task => warn!("http task exited"),
    }
    ev_task.abort();
}
