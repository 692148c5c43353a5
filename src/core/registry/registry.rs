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

//! Single source of truth for known peers and their capabilities.
//!
//! The registry is persisted as a JSON document atomically rewritten on every
//! mutation. Canonical group membership lives on the group side; each peer's
//! `groups` list is denormalised and reconciled on load.

use std::{
    collections::BTreeMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use rand::Rng;
use thiserror::Error;
use tracing::warn;

use super::types::{PeerGroup, RegistryDocument, RegistrySettings, TrustLevel, TrustedPeer};

/// Registry errors. Categorical; persistence failures are never swallowed.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Peer or group not present.
    #[error("not found")]
    NotFound,
    /// Peer or group already present.
    #[error("already exists")]
    AlreadyExists,
    /// Requested level exceeds what the caller may grant.
    #[error("invalid trust level")]
    InvalidTrustLevel,
    /// Persisting the document failed after a retry.
    #[error("registry persist")]
    Persist,
    /// Loading the document failed.
    #[error("registry load")]
    Load,
}

#[derive(Default)]
struct Inner {
    peers: BTreeMap<String, TrustedPeer>,
    groups: BTreeMap<String, PeerGroup>,
    settings: RegistrySettings,
}

/// Thread-safe trusted-peer registry.
pub struct TrustRegistry {
    inner: RwLock<Inner>,
    path: Option<PathBuf>,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

impl TrustRegistry {
    /// Open (or initialise) a registry persisted at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref().to_path_buf();
        let mut inner = Inner::default();
        if path.exists() {
            let raw = fs::read(&path).map_err(|_| RegistryError::Load)?;
            let doc: RegistryDocument =
                serde_json::from_slice(&raw).map_err(|_| RegistryError::Load)?;
            inner = Inner::from_document(doc);
        }
        inner.reconcile_groups();
        Ok(Self {
            inner: RwLock::new(inner),
            path: Some(path),
        })
    }

    /// Volatile registry (tests, ephemeral nodes).
    pub fn in_memory() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            path: None,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        match self.inner.read() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        match self.inner.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    // ---- peers ----

    /// Insert a new peer. Stamps `added_at_ms`.
    pub fn add_peer(&self, mut peer: TrustedPeer) -> Result<(), RegistryError> {
        let mut inner = self.write();
        if inner.peers.contains_key(&peer.peer_id) {
            return Err(RegistryError::AlreadyExists);
        }
        peer.added_at_ms = now_ms();
        peer.last_seen_ms = peer.added_at_ms;
        inner.peers.insert(peer.peer_id.clone(), peer);
        self.persist(&inner)
    }

    /// Remove a peer and scrub it from all groups.
    pub fn remove_peer(&self, peer_id: &str) -> Result<(), RegistryError> {
        let mut inner = self.write();
        if inner.peers.remove(peer_id).is_none() {
            return Err(RegistryError::NotFound);
        }
        for group in inner.groups.values_mut() {
            group.peers.retain(|p| p != peer_id);
        }
        self.persist(&inner)
    }

    /// Admin-gated trust assignment.
    pub fn set_trust_level(&self, peer_id: &str, level: TrustLevel) -> Result<(), RegistryError> {
        let mut inner = self.write();
        let peer = inner
            .peers
            .get_mut(peer_id)
            .ok_or(RegistryError::NotFound)?;
        peer.trust_level = level;
        self.persist(&inner)
    }

    /// Resolve a peer's trust level. Unknown peers fall back to `Untrusted`
    /// in strict mode and `Standard` otherwise.
    pub fn trust_level_of(&self, peer_id: &str) -> TrustLevel {
        let inner = self.read();
        match inner.peers.get(peer_id) {
            Some(peer) => peer.trust_level,
            None if inner.settings.strict_mode => TrustLevel::Untrusted,
            None => TrustLevel::Standard,
        }
    }

    /// Whether the peer may interact at all.
    pub fn allow(&self, peer_id: &str) -> bool {
        self.trust_level_of(peer_id) > TrustLevel::Untrusted
    }

    /// Bump connection counter and `last_seen` for a known peer.
    pub fn record_connection(&self, peer_id: &str) -> Result<(), RegistryError> {
        let mut inner = self.write();
        let Some(peer) = inner.peers.get_mut(peer_id) else {
            return Ok(());
        };
        peer.counters.connections = peer.counters.connections.saturating_add(1);
        peer.last_seen_ms = now_ms();
        self.persist(&inner)
    }

    /// Bump message/byte counters and `last_seen` for a known peer.
    pub fn record_message(
        &self,
        peer_id: &str,
        bytes_in: u64,
        bytes_out: u64,
    ) -> Result<(), RegistryError> {
        let mut inner = self.write();
        let Some(peer) = inner.peers.get_mut(peer_id) else {
            return Ok(());
        };
        peer.counters.messages = peer.counters.messages.saturating_add(1);
        peer.counters.bytes_in = peer.counters.bytes_in.saturating_add(bytes_in);
        peer.counters.bytes_out = peer.counters.bytes_out.saturating_add(bytes_out);
        peer.last_seen_ms = now_ms();
        self.persist(&inner)
    }

    /// Fetch a peer record.
    pub fn get_peer(&self, peer_id: &str) -> Option<TrustedPeer> {
        self.read().peers.get(peer_id).cloned()
    }

    /// All peers, ordered by id.
    pub fn list_peers(&self) -> Vec<TrustedPeer> {
        self.read().peers.values().cloned().collect()
    }

    /// Stored profile blob for a peer, if any.
    pub fn profile_of(&self, peer_id: &str) -> Option<Vec<u8>> {
        self.read().peers.get(peer_id).and_then(|p| p.profile.clone())
    }

    /// Apply a verified profile: auto-inserts unknown peers at `Standard`
    /// and refreshes display attributes, addresses, and the stored blob.
    pub fn upsert_from_profile(
        &self,
        peer_id: &str,
        display_name: &str,
        organization: &str,
        addresses: &[String],
        profile: Vec<u8>,
    ) -> Result<(), RegistryError> {
        let mut inner = self.write();
        let now = now_ms();
        let peer = inner
            .peers
            .entry(peer_id.to_string())
            .or_insert_with(|| {
                let mut p = TrustedPeer::new(peer_id, TrustLevel::Standard);
                p.added_at_ms = now;
                p
            });
        peer.display_name = display_name.to_string();
        peer.organization = organization.to_string();
        peer.addresses = addresses.to_vec();
        peer.profile = Some(profile);
        peer.last_seen_ms = now;
        self.persist(&inner)
    }

    // ---- groups ----

    /// Create a group. The default level must not exceed the caller's.
    pub fn add_group(&self, group: PeerGroup, caller: TrustLevel) -> Result<(), RegistryError> {
        if group.default_trust_level > caller {
            return Err(RegistryError::InvalidTrustLevel);
        }
        let mut inner = self.write();
        if inner.groups.contains_key(&group.name) {
            return Err(RegistryError::AlreadyExists);
        }
        let members: Vec<String> = group.peers.clone();
        let name = group.name.clone();
        inner.groups.insert(name.clone(), group);
        for member in members {
            if let Some(peer) = inner.peers.get_mut(&member) {
                if !peer.groups.contains(&name) {
                    peer.groups.push(name.clone());
                }
            }
        }
        self.persist(&inner)
    }

    /// Delete a group; member peers keep their records.
    pub fn remove_group(&self, name: &str) -> Result<(), RegistryError> {
        let mut inner = self.write();
        if inner.groups.remove(name).is_none() {
            return Err(RegistryError::NotFound);
        }
        for peer in inner.peers.values_mut() {
            peer.groups.retain(|g| g != name);
        }
        self.persist(&inner)
    }

    /// Fetch a group.
    pub fn get_group(&self, name: &str) -> Option<PeerGroup> {
        self.read().groups.get(name).cloned()
    }

    /// All groups, ordered by name.
    pub fn list_groups(&self) -> Vec<PeerGroup> {
        self.read().groups.values().cloned().collect()
    }

    /// Add a peer to a group, auto-inserting unknown peers at the group's
    /// default level.
    pub fn add_peer_to_group(&self, name: &str, peer_id: &str) -> Result<(), RegistryError> {
        let mut inner = self.write();
        let group = inner.groups.get_mut(name).ok_or(RegistryError::NotFound)?;
        if !group.peers.iter().any(|p| p == peer_id) {
            group.peers.push(peer_id.to_string());
        }
        let default_level = group.default_trust_level;
        let now = now_ms();
        let peer = inner
            .peers
            .entry(peer_id.to_string())
            .or_insert_with(|| {
                let mut p = TrustedPeer::new(peer_id, default_level);
                p.added_at_ms = now;
                p.last_seen_ms = now;
                p
            });
        if !peer.groups.iter().any(|g| g == name) {
            peer.groups.push(name.to_string());
        }
        self.persist(&inner)
    }

    /// Remove a peer from a group.
    pub fn remove_peer_from_group(&self, name: &str, peer_id: &str) -> Result<(), RegistryError> {
        let mut inner = self.write();
        let group = inner.groups.get_mut(name).ok_or(RegistryError::NotFound)?;
        let before = group.peers.len();
        group.peers.retain(|p| p != peer_id);
        if group.peers.len() == before {
            return Err(RegistryError::NotFound);
        }
        if let Some(peer) = inner.peers.get_mut(peer_id) {
            peer.groups.retain(|g| g != name);
        }
        self.persist(&inner)
    }

    // ---- settings ----

    /// Whether strict mode is on.
    pub fn strict_mode(&self) -> bool {
        self.read().settings.strict_mode
    }

    /// Toggle strict mode.
    pub fn set_strict_mode(&self, on: bool) -> Result<(), RegistryError> {
        let mut inner = self.write();
        inner.settings.strict_mode = on;
        self.persist(&inner)
    }

    // ---- export / import ----

    /// Snapshot the full document.
    pub fn export(&self) -> RegistryDocument {
        self.read().to_document()
    }

    /// Replace or merge the document. With `merge`, existing ids win and
    /// the call is idempotent.
    pub fn import(&self, doc: RegistryDocument, merge: bool) -> Result<(), RegistryError> {
        let mut inner = self.write();
        if merge {
            for peer in doc.peers {
                inner.peers.entry(peer.peer_id.clone()).or_insert(peer);
            }
            for group in doc.groups {
                inner.groups.entry(group.name.clone()).or_insert(group);
            }
        } else {
            *inner = Inner::from_document(doc);
        }
        inner.reconcile_groups();
        self.persist(&inner)
    }

    fn persist(&self, inner: &Inner) -> Result<(), RegistryError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let doc = inner.to_document();
        let json = serde_json::to_vec_pretty(&doc).map_err(|_| RegistryError::Persist)?;
        if atomic_write(path, &json).is_ok() {
            return Ok(());
        }
        // One retry with jitter before surfacing a persistence error.
        let jitter = rand::thread_rng().gen_range(10..50);
        std::thread::sleep(Duration::from_millis(jitter));
        atomic_write(path, &json).map_err(|_| {
            warn!(path = %path.display(), "registry persist failed after retry");
            RegistryError::Persist
        })
    }
}

impl Inner {
    fn from_document(doc: RegistryDocument) -> Self {
        let mut inner = Inner {
            settings: doc.settings,
            ..Inner::default()
        };
        for peer in doc.peers {
            inner.peers.insert(peer.peer_id.clone(), peer);
        }
        for group in doc.groups {
            inner.groups.insert(group.name.clone(), group);
        }
        inner
    }

    fn to_document(&self) -> RegistryDocument {
        RegistryDocument {
            peers: self.peers.values().cloned().collect(),
            groups: self.groups.values().cloned().collect(),
            settings: self.settings,
        }
    }

    /// Rebuild each peer's denormalised group list from the canonical side.
    fn reconcile_groups(&mut self) {
        for peer in self.peers.values_mut() {
            peer.groups.clear();
        }
        let memberships: Vec<(String, Vec<String>)> = self
            .groups
            .values()
            .map(|g| (g.name.clone(), g.peers.clone()))
            .collect();
        for (name, members) in memberships {
            for member in members {
                if let Some(peer) = self.peers.get_mut(&member) {
                    peer.groups.push(name.clone());
                }
            }
        }
    }
}

fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp = path.to_path_buf();
    tmp.set_extension("tmp");
    {
        let mut f = fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&tmp)?;
        f.write_all(bytes)?;
        let _ = f.sync_all();
    }
    fs::rename(&tmp, path)
}
