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

//! Node configuration root (TOML file plus defaults).

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::core::record::StoreConfig;
use crate::core::routing::{RouterConfig, DEFAULT_TTL};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("config read")]
    Read,
    /// TOML failed to parse.
    #[error("config parse")]
    Parse,
}

/// Node configuration root.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node settings.
    #[serde(default)]
    pub node: NodeSettings,
    /// HTTP endpoints.
    #[serde(default)]
    pub http: HttpSettings,
    /// P2P settings.
    #[serde(default)]
    pub p2p: P2pSettings,
    /// Record store settings.
    #[serde(default)]
    pub storage: StorageSettings,
}

/// Node settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeSettings {
    /// Human-readable name.
    pub name: String,
    /// Operating organisation advertised in the node profile.
    #[serde(default)]
    pub organization: String,
    /// Data directory (db + keys + registry).
    pub data_dir: String,
    /// Identity account index.
    #[serde(default)]
    pub account_index: u32,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            name: "sdn-node".to_string(),
            organization: String::new(),
            data_dir: "./data".to_string(),
            account_index: 0,
        }
    }
}

/// HTTP config.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Listen address, e.g. 0.0.0.0:9090.
    pub listen_addr: String,
    /// Max accepted publish body in bytes.
    #[serde(default = "default_max_payload")]
    pub max_payload_bytes: usize,
}

fn default_max_payload() -> usize {
    4 * 1024 * 1024
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:9090".to_string(),
            max_payload_bytes: default_max_payload(),
        }
    }
}

/// P2P settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct P2pSettings {
    /// Listen multiaddr.
    pub listen_addr: String,
    /// Bootstrap peers to dial at startup.
    #[serde(default)]
    pub bootstrap: Vec<String>,
    /// Whether this node relays messages for others.
    #[serde(default = "default_true")]
    pub relay_mode: bool,
    /// TTL stamped on locally published messages.
    #[serde(default = "default_ttl")]
    pub default_ttl: u8,
}

fn default_true() -> bool {
    true
}

fn default_ttl() -> u8 {
    DEFAULT_TTL
}

impl Default for P2pSettings {
    fn default() -> Self {
        Self {
            listen_addr: "/ip4/0.0.0.0/tcp/4001".to_string(),
            bootstrap: Vec::new(),
            relay_mode: true,
            default_ttl: DEFAULT_TTL,
        }
    }
}

impl P2pSettings {
    /// Router view of these settings.
    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            relay_mode: self.relay_mode,
            default_ttl: self.default_ttl,
        }
    }
}

/// Record store settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Ledger quota applied to writers without an override.
    #[serde(default = "default_quota")]
    pub default_quota_bytes: u64,
    /// Query limit used when the caller passes none.
    #[serde(default = "default_limit")]
    pub default_query_limit: usize,
    /// Upper clamp for query limits.
    #[serde(default = "default_max_limit")]
    pub max_query_limit: usize,
    /// Hard ceiling for query offsets.
    #[serde(default = "default_max_offset")]
    pub max_query_offset: usize,
}

fn default_quota() -> u64 {
    512 * 1024 * 1024
}
fn default_limit() -> usize {
    100
}
fn default_max_limit() -> usize {
    1_000
}
fn default_max_offset() -> usize {
    100_000
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            default_quota_bytes: default_quota(),
            default_query_limit: default_limit(),
            max_query_limit: default_max_limit(),
            max_query_offset: default_max_offset(),
        }
    }
}

impl StorageSettings {
    /// Store view of these settings.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            default_quota_bytes: self.default_quota_bytes,
            default_query_limit: self.default_query_limit,
            max_query_limit: self.max_query_limit,
            max_query_offset: self.max_query_offset,
        }
    }
}

impl NodeConfig {
    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::Read)?;
        toml::from_str(&raw).map_err(|_| ConfigError::Parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_sections() {
        let cfg: NodeConfig = toml::from_str("").unwrap();
        assert!(cfg.p2p.relay_mode);
        assert_eq!(cfg.p2p.default_ttl, DEFAULT_TTL);
        assert_eq!(cfg.storage.max_query_limit, 1_000);
    }

    #[test]
    fn partial_file_parses() {
        let cfg: NodeConfig = toml::from_str(
            r#"
            [node]
            name = "relay-1"
            data_dir = "/srv/sdn/data"

            [p2p]
            listen_addr = "/ip4/0.0.0.0/tcp/4002"
            relay_mode = false
            "#,
        )
        .unwrap();
        assert_eq!(cfg.node.name, "relay-1");
        assert!(!cfg.p2p.relay_mode);
        assert_eq!(cfg.http.listen_addr, "127.0.0.1:9090");
    }
}
