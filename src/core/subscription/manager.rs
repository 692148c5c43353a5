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

//! Subscription CRUD, matching, rate limiting, and handler fan-out.
//!
//! The subscription map sits behind one reader-writer lock; each
//! subscription's mutable runtime state (status, counters, rate window) has
//! its own mutex so the matcher never needs the write lock. Handlers are
//! message sinks, each backed by its own channel and consumer task: delivery
//! to one sink stays ordered, a slow sink never blocks the matcher, and a
//! panicking sink flips its subscription to `Error` without touching the
//! process. Delivery order across sinks is unspecified.

use std::{
    collections::{BTreeMap, BTreeSet},
    panic::AssertUnwindSafe,
    sync::{Arc, Mutex, RwLock, Weak},
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use rand::Rng;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::core::value::decode_object;

use super::filter::all_match;
use super::types::{Subscription, SubscriptionConfig, SubscriptionStatus};

const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Subscription manager errors.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// Configuration failed validation.
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
    /// No such subscription.
    #[error("not found")]
    NotFound,
}

/// A matched message handed to a sink.
#[derive(Clone, Debug)]
pub struct Delivery {
    /// Matching subscription.
    pub subscription_id: String,
    /// Schema tag of the message.
    pub schema: String,
    /// Publishing peer id (base58).
    pub source: String,
    /// Payload bytes, shared across sinks.
    pub payload: Arc<Vec<u8>>,
}

/// A message sink callback.
pub type Handler = Arc<dyn Fn(&Delivery) + Send + Sync>;

/// A registered sink: its channel sender; the consumer task owns the
/// receiver and the callback.
struct Sink {
    tx: mpsc::UnboundedSender<Delivery>,
}

struct SubState {
    status: SubscriptionStatus,
    message_count: u64,
    last_message_at_ms: Option<u64>,
    window_start: Instant,
    window_count: u32,
}

struct SubEntry {
    config: SubscriptionConfig,
    created_at_ms: u64,
    sinks: Vec<Sink>,
    state: Mutex<SubState>,
}

struct Inner {
    subs: RwLock<BTreeMap<String, SubEntry>>,
    globals: RwLock<Vec<Sink>>,
}

/// Owner of all subscriptions.
#[derive(Clone)]
pub struct SubscriptionManager {
    inner: Arc<Inner>,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionManager {
    /// Empty manager.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                subs: RwLock::new(BTreeMap::new()),
                globals: RwLock::new(Vec::new()),
            }),
        }
    }

    // ---- CRUD ----

    /// Validate and register a subscription.
    pub fn create(&self, config: SubscriptionConfig) -> Result<Subscription, SubscriptionError> {
        config.validate()?;
        let mut subs = write(&self.inner.subs);
        let id = loop {
            let candidate = format!("sub-{}", hex::encode(rand::thread_rng().gen::<[u8; 8]>()));
            if !subs.contains_key(&candidate) {
                break candidate;
            }
        };
        let entry = SubEntry {
            config,
            created_at_ms: now_ms(),
            sinks: Vec::new(),
            state: Mutex::new(SubState {
                status: SubscriptionStatus::Active,
                message_count: 0,
                last_message_at_ms: None,
                window_start: Instant::now(),
                window_count: 0,
            }),
        };
        let snapshot = snapshot(&id, &entry);
        subs.insert(id, entry);
        Ok(snapshot)
    }

    /// Fetch a snapshot.
    pub fn get(&self, id: &str) -> Result<Subscription, SubscriptionError> {
        let subs = read(&self.inner.subs);
        let entry = subs.get(id).ok_or(SubscriptionError::NotFound)?;
        Ok(snapshot(id, entry))
    }

    /// Snapshots of every subscription, ordered by id.
    pub fn list(&self) -> Vec<Subscription> {
        let subs = read(&self.inner.subs);
        subs.iter().map(|(id, entry)| snapshot(id, entry)).collect()
    }

    /// Replace a subscription's configuration; state and sinks persist.
    pub fn update(
        &self,
        id: &str,
        config: SubscriptionConfig,
    ) -> Result<Subscription, SubscriptionError> {
        config.validate()?;
        let mut subs = write(&self.inner.subs);
        let entry = subs.get_mut(id).ok_or(SubscriptionError::NotFound)?;
        entry.config = config;
        Ok(snapshot(id, entry))
    }

    /// Remove a subscription; its sink tasks wind down with their channels.
    pub fn delete(&self, id: &str) -> Result<(), SubscriptionError> {
        let mut subs = write(&self.inner.subs);
        subs.remove(id)
            .map(|_| ())
            .ok_or(SubscriptionError::NotFound)
    }

    /// Stop matching without losing the subscription.
    pub fn pause(&self, id: &str) -> Result<(), SubscriptionError> {
        self.set_status(id, SubscriptionStatus::Paused)
    }

    /// Restore matching; also clears the `Error` state.
    pub fn resume(&self, id: &str) -> Result<(), SubscriptionError> {
        self.set_status(id, SubscriptionStatus::Active)
    }

    fn set_status(&self, id: &str, status: SubscriptionStatus) -> Result<(), SubscriptionError> {
        let subs = read(&self.inner.subs);
        let entry = subs.get(id).ok_or(SubscriptionError::NotFound)?;
        lock(&entry.state).status = status;
        Ok(())
    }

    // ---- sinks ----

    /// Attach a sink to one subscription.
    pub fn add_handler(&self, id: &str, handler: Handler) -> Result<(), SubscriptionError> {
        let sink = spawn_sink(Arc::downgrade(&self.inner), handler);
        let mut subs = write(&self.inner.subs);
        let entry = subs.get_mut(id).ok_or(SubscriptionError::NotFound)?;
        entry.sinks.push(sink);
        Ok(())
    }

    /// Attach a sink invoked for every match of every subscription.
    pub fn add_global_handler(&self, handler: Handler) {
        let sink = spawn_sink(Arc::downgrade(&self.inner), handler);
        write(&self.inner.globals).push(sink);
    }

    // ---- matching ----

    /// Offer a message to every subscription. Returns the number of
    /// subscriptions it was delivered to. `header_encrypted` carries the
    /// routing header's flag when one was present.
    pub fn on_message(
        &self,
        schema: &str,
        source: &str,
        payload: &[u8],
        header_encrypted: Option<bool>,
    ) -> usize {
        let decoded = decode_object(payload);
        let payload: Arc<Vec<u8>> = Arc::new(payload.to_vec());
        let mut delivered = 0usize;

        let subs = read(&self.inner.subs);
        let globals = read(&self.inner.globals);

        for (id, entry) in subs.iter() {
            if !entry.config.schemas.iter().any(|s| s == schema) {
                continue;
            }
            if !entry.config.wildcard_source()
                && !entry.config.sources.iter().any(|s| s == source)
            {
                continue;
            }
            if let Some(encrypted) = header_encrypted {
                if encrypted != entry.config.encrypted {
                    continue;
                }
            }
            if !all_match(&entry.config.filters, decoded.as_ref()) {
                continue;
            }

            let mut state = lock(&entry.state);
            if state.status != SubscriptionStatus::Active {
                continue;
            }
            // Window resets are deferred until the next match.
            if state.window_start.elapsed() >= RATE_WINDOW {
                state.window_start = Instant::now();
                state.window_count = 0;
            }
            state.window_count = state.window_count.saturating_add(1);
            if entry.config.rate_limit > 0 && state.window_count > entry.config.rate_limit {
                debug!(subscription = %id, "rate limit hit, dropping delivery");
                continue;
            }
            state.message_count += 1;
            state.last_message_at_ms = Some(now_ms());
            drop(state);

            delivered += 1;
            let delivery = Delivery {
                subscription_id: id.clone(),
                schema: schema.to_string(),
                source: source.to_string(),
                payload: payload.clone(),
            };
            // Sends are non-blocking; the sink tasks drain in order.
            for sink in entry.sinks.iter().chain(globals.iter()) {
                let _ = sink.tx.send(delivery.clone());
            }
        }

        delivered
    }

    /// Schema tags across active subscriptions, sorted and deduplicated.
    pub fn active_schemas(&self) -> BTreeSet<String> {
        let subs = read(&self.inner.subs);
        let mut out = BTreeSet::new();
        for entry in subs.values() {
            if lock(&entry.state).status == SubscriptionStatus::Active {
                out.extend(entry.config.schemas.iter().cloned());
            }
        }
        out
    }
}

/// One consumer task per sink: ordered per-sink delivery, panic isolation.
fn spawn_sink(inner: Weak<Inner>, handler: Handler) -> Sink {
    let (tx, mut rx) = mpsc::unbounded_channel::<Delivery>();
    tokio::spawn(async move {
        while let Some(delivery) = rx.recv().await {
            let id = delivery.subscription_id.clone();
            if std::panic::catch_unwind(AssertUnwindSafe(|| handler(&delivery))).is_err() {
                warn!(subscription = %id, "handler panicked, marking subscription in error");
                if let Some(inner) = inner.upgrade() {
                    let subs = read(&inner.subs);
                    if let Some(entry) = subs.get(&id) {
                        lock(&entry.state).status = SubscriptionStatus::Error;
                    }
                }
            }
        }
    });
    Sink { tx }
}

fn snapshot(id: &str, entry: &SubEntry) -> Subscription {
    let state = lock(&entry.state);
    Subscription {
        id: id.to_string(),
        config: entry.config.clone(),
        status: state.status,
        message_count: state.message_count,
        last_message_at_ms: state.last_message_at_ms,
        created_at_ms: entry.created_at_ms,
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::subscription::types::{Filter, FilterOp, SOURCE_WILDCARD};
    use serde_json::json;

    fn config(schemas: &[&str], sources: &[&str]) -> SubscriptionConfig {
        SubscriptionConfig {
            schemas: schemas.iter().map(|s| s.to_string()).collect(),
            sources: sources.iter().map(|s| s.to_string()).collect(),
            ..SubscriptionConfig::default()
        }
    }

    #[tokio::test]
    async fn matches_schema_and_source() {
        let mgr = SubscriptionManager::new();
        mgr.create(config(&["OMM"], &["peerA"])).unwrap();

        assert_eq!(mgr.on_message("OMM", "peerA", b"{}", None), 1);
        assert_eq!(mgr.on_message("OMM", "peerB", b"{}", None), 0);
        assert_eq!(mgr.on_message("CDM", "peerA", b"{}", None), 0);
    }

    #[tokio::test]
    async fn wildcard_accepts_any_source() {
        let mgr = SubscriptionManager::new();
        mgr.create(config(&["OMM"], &[SOURCE_WILDCARD])).unwrap();
        assert_eq!(mgr.on_message("OMM", "anyone", b"{}", None), 1);
    }

    #[tokio::test]
    async fn filters_gate_delivery() {
        let mgr = SubscriptionManager::new();
        let mut cfg = config(&["OMM"], &[SOURCE_WILDCARD]);
        cfg.filters.push(Filter {
            field: "OBJECT_NAME".into(),
            op: FilterOp::Eq,
            value: json!("ISS"),
        });
        mgr.create(cfg).unwrap();

        assert_eq!(
            mgr.on_message("OMM", "p", br#"{"OBJECT_NAME":"ISS"}"#, None),
            1
        );
        assert_eq!(
            mgr.on_message("OMM", "p", br#"{"OBJECT_NAME":"HST"}"#, None),
            0
        );
        assert_eq!(mgr.on_message("OMM", "p", br#"{"OTHER":1}"#, None), 0);
    }

    #[tokio::test]
    async fn encrypted_flag_must_agree_when_header_present() {
        let mgr = SubscriptionManager::new();
        let mut cfg = config(&["OMM"], &[SOURCE_WILDCARD]);
        cfg.encrypted = true;
        mgr.create(cfg).unwrap();

        assert_eq!(mgr.on_message("OMM", "p", b"{}", Some(false)), 0);
        assert_eq!(mgr.on_message("OMM", "p", b"{}", Some(true)), 1);
        // No header: the flag is not consulted.
        assert_eq!(mgr.on_message("OMM", "p", b"{}", None), 1);
    }

    #[tokio::test]
    async fn pause_and_resume() {
        let mgr = SubscriptionManager::new();
        let sub = mgr.create(config(&["OMM"], &[SOURCE_WILDCARD])).unwrap();

        mgr.pause(&sub.id).unwrap();
        assert_eq!(mgr.on_message("OMM", "p", b"{}", None), 0);
        assert_eq!(mgr.get(&sub.id).unwrap().status, SubscriptionStatus::Paused);

        mgr.resume(&sub.id).unwrap();
        assert_eq!(mgr.on_message("OMM", "p", b"{}", None), 1);
    }

    #[tokio::test]
    async fn rate_limit_caps_a_window() {
        let mgr = SubscriptionManager::new();
        let mut cfg = config(&["OMM"], &[SOURCE_WILDCARD]);
        cfg.rate_limit = 3;
        mgr.create(cfg).unwrap();

        let mut delivered = 0;
        for _ in 0..10 {
            delivered += mgr.on_message("OMM", "p", b"{}", None);
        }
        assert_eq!(delivered, 3);

        // Zero means unlimited.
        let mgr = SubscriptionManager::new();
        mgr.create(config(&["OMM"], &[SOURCE_WILDCARD])).unwrap();
        let mut delivered = 0;
        for _ in 0..10 {
            delivered += mgr.on_message("OMM", "p", b"{}", None);
        }
        assert_eq!(delivered, 10);
    }

    #[tokio::test]
    async fn handlers_receive_matches_in_order() {
        let mgr = SubscriptionManager::new();
        let sub = mgr.create(config(&["OMM"], &[SOURCE_WILDCARD])).unwrap();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        mgr.add_handler(
            &sub.id,
            Arc::new(move |delivery: &Delivery| {
                let _ = tx.send(delivery.payload.as_ref().clone());
            }),
        )
        .unwrap();

        mgr.on_message("OMM", "p", br#"{"N":1}"#, None);
        mgr.on_message("OMM", "p", br#"{"N":2}"#, None);
        mgr.on_message("OMM", "p", br#"{"N":3}"#, None);

        for expected in [br#"{"N":1}"#, br#"{"N":2}"#, br#"{"N":3}"#] {
            let got = rx.recv().await.unwrap();
            assert_eq!(got, expected.to_vec());
        }
    }

    #[tokio::test]
    async fn panicking_handler_marks_error() {
        let mgr = SubscriptionManager::new();
        let sub = mgr.create(config(&["OMM"], &[SOURCE_WILDCARD])).unwrap();
        mgr.add_handler(&sub.id, Arc::new(|_| panic!("boom"))).unwrap();

        mgr.on_message("OMM", "p", b"{}", None);
        // Let the sink task run.
        for _ in 0..100 {
            tokio::task::yield_now().await;
            if mgr.get(&sub.id).unwrap().status == SubscriptionStatus::Error {
                break;
            }
        }
        assert_eq!(mgr.get(&sub.id).unwrap().status, SubscriptionStatus::Error);
    }

    #[tokio::test]
    async fn crud_and_validation() {
        let mgr = SubscriptionManager::new();
        assert!(matches!(
            mgr.create(SubscriptionConfig::default()),
            Err(SubscriptionError::InvalidConfig(_))
        ));

        let sub = mgr.create(config(&["OMM"], &[SOURCE_WILDCARD])).unwrap();
        assert_eq!(mgr.list().len(), 1);

        let updated = mgr.update(&sub.id, config(&["CDM"], &["peerX"])).unwrap();
        assert_eq!(updated.config.schemas, vec!["CDM".to_string()]);

        mgr.delete(&sub.id).unwrap();
        assert!(matches!(mgr.get(&sub.id), Err(SubscriptionError::NotFound)));
    }

    #[tokio::test]
    async fn active_schemas_excludes_paused() {
        let mgr = SubscriptionManager::new();
        mgr.create(config(&["OMM", "CDM"], &[SOURCE_WILDCARD])).unwrap();
        let paused = mgr.create(config(&["EOP"], &[SOURCE_WILDCARD])).unwrap();
        mgr.pause(&paused.id).unwrap();

        let schemas: Vec<String> = mgr.active_schemas().into_iter().collect();
        assert_eq!(schemas, vec!["CDM".to_string(), "OMM".to_string()]);
    }
}
