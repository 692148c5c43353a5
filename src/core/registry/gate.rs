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

//! Connection gate: registry trust plus an independent blocklist.
//!
//! The blocklist persists separately from the registry so a revoked peer
//! stays denied even if its registry record is pruned. Unblocking restores
//! whatever trust level the registry still holds.

use std::{
    collections::BTreeSet,
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

use thiserror::Error;
use tracing::info;

use super::registry::TrustRegistry;

/// Gate errors.
#[derive(Debug, Error)]
pub enum GateError {
    /// Blocklist file could not be read.
    #[error("blocklist load")]
    Load,
    /// Blocklist file could not be written.
    #[error("blocklist persist")]
    Persist,
}

/// Gate verdict for a dial or accept.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Proceed with the connection.
    Allow,
    /// Refuse / disconnect.
    Deny,
}

/// Consulted before the transport dials or accepts.
pub struct ConnectionGate {
    registry: Arc<TrustRegistry>,
    blocklist: RwLock<BTreeSet<String>>,
    path: Option<PathBuf>,
}

impl ConnectionGate {
    /// Gate persisting its blocklist at `path`.
    pub fn open(registry: Arc<TrustRegistry>, path: impl AsRef<Path>) -> Result<Self, GateError> {
        let path = path.as_ref().to_path_buf();
        let mut blocklist = BTreeSet::new();
        if path.exists() {
            let raw = fs::read(&path).map_err(|_| GateError::Load)?;
            let ids: Vec<String> = serde_json::from_slice(&raw).map_err(|_| GateError::Load)?;
            blocklist.extend(ids);
        }
        Ok(Self {
            registry,
            blocklist: RwLock::new(blocklist),
            path: Some(path),
        })
    }

    /// Volatile gate (tests).
    pub fn in_memory(registry: Arc<TrustRegistry>) -> Self {
        Self {
            registry,
            blocklist: RwLock::new(BTreeSet::new()),
            path: None,
        }
    }

    /// Decide whether `peer_id` may connect.
    pub fn check(&self, peer_id: &str) -> Verdict {
        let blocked = match self.blocklist.read() {
            Ok(g) => g.contains(peer_id),
            Err(poisoned) => poisoned.into_inner().contains(peer_id),
        };
        if blocked {
            return Verdict::Deny;
        }
        if self.registry.allow(peer_id) {
            Verdict::Allow
        } else {
            Verdict::Deny
        }
    }

    /// Add a peer to the blocklist.
    pub fn block(&self, peer_id: &str) -> Result<(), GateError> {
        let mut guard = match self.blocklist.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.insert(peer_id.to_string()) {
            info!(peer = %peer_id, "peer blocklisted");
        }
        self.persist(&guard)
    }

    /// Remove a peer from the blocklist; its registry trust level applies
    /// again unchanged.
    pub fn unblock(&self, peer_id: &str) -> Result<(), GateError> {
        let mut guard = match self.blocklist.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.remove(peer_id);
        self.persist(&guard)
    }

    /// Whether the peer is currently blocklisted.
    pub fn is_blocked(&self, peer_id: &str) -> bool {
        match self.blocklist.read() {
            Ok(g) => g.contains(peer_id),
            Err(poisoned) => poisoned.into_inner().contains(peer_id),
        }
    }

    /// Blocklist snapshot, sorted.
    pub fn blocked(&self) -> Vec<String> {
        match self.blocklist.read() {
            Ok(g) => g.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    fn persist(&self, set: &BTreeSet<String>) -> Result<(), GateError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let ids: Vec<&String> = set.iter().collect();
        let json = serde_json::to_vec_pretty(&ids).map_err(|_| GateError::Persist)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|_| GateError::Persist)?;
        }
        let mut tmp = path.to_path_buf();
        tmp.set_extension("tmp");
        {
            let mut f = fs::OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(&tmp)
                .map_err(|_| GateError::Persist)?;
            f.write_all(&json).map_err(|_| GateError::Persist)?;
            let _ = f.sync_all();
        }
        fs::rename(&tmp, path).map_err(|_| GateError::Persist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::{TrustLevel, TrustedPeer};

    #[test]
    fn blocklist_overrides_trust() {
        let registry = Arc::new(TrustRegistry::in_memory());
        registry
            .add_peer(TrustedPeer::new("p1", TrustLevel::Trusted))
            .unwrap();
        let gate = ConnectionGate::in_memory(registry);

        assert_eq!(gate.check("p1"), Verdict::Allow);
        gate.block("p1").unwrap();
        assert_eq!(gate.check("p1"), Verdict::Deny);
        gate.unblock("p1").unwrap();
        // Unblocking returns the peer to its stored level.
        assert_eq!(gate.check("p1"), Verdict::Allow);
    }

    #[test]
    fn block_survives_registry_prune() {
        let registry = Arc::new(TrustRegistry::in_memory());
        registry
            .add_peer(TrustedPeer::new("p1", TrustLevel::Standard))
            .unwrap();
        let gate = ConnectionGate::in_memory(registry.clone());
        gate.block("p1").unwrap();
        registry.remove_peer("p1").unwrap();
        assert_eq!(gate.check("p1"), Verdict::Deny);
    }

    #[test]
    fn blocklist_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blocklist.json");
        let registry = Arc::new(TrustRegistry::in_memory());
        {
            let gate = ConnectionGate::open(registry.clone(), &path).unwrap();
            gate.block("p1").unwrap();
        }
        let gate = ConnectionGate::open(registry, &path).unwrap();
        assert!(gate.is_blocked("p1"));
    }
}
