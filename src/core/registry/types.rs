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

//! Registry data model: trust levels, trusted peers, peer groups.

use serde::{Deserialize, Serialize};

/// Capability grade for a known peer. Variant order is the comparison order.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TrustLevel {
    /// Known but denied all capabilities.
    Untrusted,
    /// Read-mostly access.
    Limited,
    /// Ordinary peer.
    #[default]
    Standard,
    /// Elevated forwarding/storage rights.
    Trusted,
    /// Registry administration.
    Admin,
}

impl TrustLevel {
    /// All levels in ascending order.
    pub const ALL: [TrustLevel; 5] = [
        TrustLevel::Untrusted,
        TrustLevel::Limited,
        TrustLevel::Standard,
        TrustLevel::Trusted,
        TrustLevel::Admin,
    ];
}

/// Traffic counters kept per peer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerCounters {
    /// Completed connections.
    pub connections: u64,
    /// Messages exchanged.
    pub messages: u64,
    /// Bytes received from the peer.
    pub bytes_in: u64,
    /// Bytes sent to the peer.
    pub bytes_out: u64,
}

/// A peer the registry knows about.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrustedPeer {
    /// Base58 peer id (self-certifying).
    pub peer_id: String,
    /// Human-readable name.
    #[serde(default)]
    pub display_name: String,
    /// Operating organisation.
    #[serde(default)]
    pub organization: String,
    /// Known multiaddrs, in preference order.
    #[serde(default)]
    pub addresses: Vec<String>,
    /// Assigned trust level.
    #[serde(default)]
    pub trust_level: TrustLevel,
    /// Denormalised group names; canonical membership lives on the group.
    #[serde(default)]
    pub groups: Vec<String>,
    /// Traffic counters.
    #[serde(default)]
    pub counters: PeerCounters,
    /// Latest verified profile blob (hex), if any.
    #[serde(default, with = "opt_hex")]
    pub profile: Option<Vec<u8>>,
    /// Insertion time, ms since UNIX epoch.
    #[serde(default)]
    pub added_at_ms: u64,
    /// Last activity time, ms since UNIX epoch.
    #[serde(default)]
    pub last_seen_ms: u64,
}

impl TrustedPeer {
    /// Minimal peer record at the given level.
    pub fn new(peer_id: impl Into<String>, trust_level: TrustLevel) -> Self {
        Self {
            peer_id: peer_id.into(),
            display_name: String::new(),
            organization: String::new(),
            addresses: Vec::new(),
            trust_level,
            groups: Vec::new(),
            counters: PeerCounters::default(),
            profile: None,
            added_at_ms: 0,
            last_seen_ms: 0,
        }
    }
}

/// A named aggregation of peers sharing a default trust level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeerGroup {
    /// Unique group name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Level applied to peers added through this group.
    #[serde(default)]
    pub default_trust_level: TrustLevel,
    /// Canonical member list (base58 peer ids, insertion order).
    #[serde(default)]
    pub peers: Vec<String>,
}

/// Registry-wide settings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySettings {
    /// In strict mode unknown peers resolve to [`TrustLevel::Untrusted`].
    #[serde(default)]
    pub strict_mode: bool,
}

/// The persisted registry document, also the export/import payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryDocument {
    /// Known peers.
    #[serde(default)]
    pub peers: Vec<TrustedPeer>,
    /// Peer groups.
    #[serde(default)]
    pub groups: Vec<PeerGroup>,
    /// Settings (absent in exports produced by older nodes).
    #[serde(default)]
    pub settings: RegistrySettings,
}

mod opt_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(bytes) => s.serialize_some(&hex::encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        match raw {
            Some(text) => hex::decode(text.trim())
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trust_levels_are_totally_ordered() {
        for pair in TrustLevel::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        assert!(TrustLevel::Admin > TrustLevel::Untrusted);
    }

    #[test]
    fn profile_round_trips_as_hex() {
        let mut peer = TrustedPeer::new("12D3KooWTest", TrustLevel::Standard);
        peer.profile = Some(vec![0xde, 0xad, 0xbe, 0xef]);
        let json = serde_json::to_string(&peer).unwrap();
        assert!(json.contains("deadbeef"));
        let back: TrustedPeer = serde_json::from_str(&json).unwrap();
        assert_eq!(back.profile, peer.profile);
    }
}
