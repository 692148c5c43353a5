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

//! Gossip topic derivation and the membership oracle used to build
//! subscribe lists.

use std::collections::BTreeSet;

use super::header::RoutingHeader;

const DATA_PREFIX: &str = "/sdn/data/";
const PEER_PREFIX: &str = "/sdn/peer/";
const LEGACY_PREFIX: &str = "/spacedatanetwork/sds/";

/// Schema tag with any trailing extension stripped (`OMM.fbs` → `OMM`).
pub fn strip_extension(schema: &str) -> &str {
    match schema.rfind('.') {
        Some(idx) if idx > 0 => &schema[..idx],
        _ => schema,
    }
}

/// Broadcast topic for a schema.
pub fn data_topic(schema: &str) -> String {
    format!("{DATA_PREFIX}{}", strip_extension(schema))
}

/// Targeted-delivery topic for one peer.
pub fn peer_topic(peer_id: &str) -> String {
    format!("{PEER_PREFIX}{peer_id}")
}

/// Compatibility topic older nodes still publish on.
pub fn legacy_topic(schema: &str) -> String {
    format!("{LEGACY_PREFIX}{}.fbs", strip_extension(schema))
}

/// Topic a message is emitted on. Precedence: explicit override, then the
/// single-destination peer topic, then the schema data topic.
pub fn derive_topic(header: &RoutingHeader) -> String {
    if let Some(topic) = &header.topic_override {
        return topic.clone();
    }
    if header.destinations.len() == 1 {
        return peer_topic(&header.destinations[0]);
    }
    data_topic(&header.schema)
}

/// Exact-match membership oracle over the topics this node must listen on.
#[derive(Clone, Debug, Default)]
pub struct TopicMatcher {
    topics: BTreeSet<String>,
}

impl TopicMatcher {
    /// Build the required set: data + legacy topics for each schema, plus
    /// the node's own peer topic.
    pub fn build<'a>(own_peer_id: &str, schemas: impl IntoIterator<Item = &'a str>) -> Self {
        let mut topics = BTreeSet::new();
        for schema in schemas {
            topics.insert(data_topic(schema));
            topics.insert(legacy_topic(schema));
        }
        topics.insert(peer_topic(own_peer_id));
        Self { topics }
    }

    /// Exact-string membership test.
    pub fn matches(&self, topic: &str) -> bool {
        self.topics.contains(topic)
    }

    /// Deterministic sorted list of all required topics.
    pub fn required_topics(&self) -> Vec<String> {
        self.topics.iter().cloned().collect()
    }

    /// Topics in `self` missing from `other`, and vice versa.
    pub fn diff(&self, other: &TopicMatcher) -> (Vec<String>, Vec<String>) {
        let added = self.topics.difference(&other.topics).cloned().collect();
        let removed = other.topics.difference(&self.topics).cloned().collect();
        (added, removed)
    }
}
