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

//! Subscription configuration and lifecycle types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::SubscriptionError;

/// Source sentinel accepting every publisher.
pub const SOURCE_WILDCARD: &str = "all";

/// Filter comparison operators. The fixed enum; anything else is rejected
/// at create time by serde.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOp {
    /// String-normalised equality.
    Eq,
    /// String-normalised inequality (matches missing fields).
    Ne,
    /// Numeric greater-than.
    Gt,
    /// Numeric greater-or-equal.
    Gte,
    /// Numeric less-than.
    Lt,
    /// Numeric less-or-equal.
    Lte,
    /// Substring containment over a string operand.
    Contains,
    /// Prefix test over a string operand.
    StartsWith,
    /// Suffix test over a string operand.
    EndsWith,
    /// Literal membership in an array operand.
    In,
    /// Literal absence from an array operand (matches missing fields).
    NotIn,
}

/// One predicate over a decoded payload field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Dot-separated path into the decoded payload.
    pub field: String,
    /// Comparison operator.
    pub op: FilterOp,
    /// Literal to compare against.
    pub value: Value,
}

/// Lifecycle state of a subscription.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    /// Matching and delivering.
    #[default]
    Active,
    /// Matcher short-circuits.
    Paused,
    /// A handler failed; operator attention required.
    Error,
}

/// Caller-supplied subscription definition.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionConfig {
    /// Schema tags to match (at least one).
    pub schemas: Vec<String>,
    /// Source peer ids, or the [`SOURCE_WILDCARD`] sentinel (at least one).
    pub sources: Vec<String>,
    /// Only match messages whose routing header carries this encrypted flag.
    #[serde(default)]
    pub encrypted: bool,
    /// Deliver continuously rather than on demand.
    #[serde(default)]
    pub streaming: bool,
    /// Conjunctive filters over the decoded payload.
    #[serde(default)]
    pub filters: Vec<Filter>,
    /// Max deliveries per 60 s window (0 = unlimited).
    #[serde(default)]
    pub rate_limit: u32,
    /// Message lifetime hint forwarded to publishers.
    #[serde(default)]
    pub ttl_ms: u64,
}

impl SubscriptionConfig {
    /// Validate per the create/update contract.
    pub fn validate(&self) -> Result<(), SubscriptionError> {
        if self.schemas.is_empty() {
            return Err(SubscriptionError::InvalidConfig("at least one schema tag"));
        }
        if self.schemas.iter().any(|s| s.trim().is_empty()) {
            return Err(SubscriptionError::InvalidConfig("empty schema tag"));
        }
        if self.sources.is_empty() {
            return Err(SubscriptionError::InvalidConfig(
                "at least one source peer or wildcard",
            ));
        }
        if self.sources.iter().any(|s| s.trim().is_empty()) {
            return Err(SubscriptionError::InvalidConfig("empty source peer"));
        }
        if self.filters.iter().any(|f| f.field.trim().is_empty()) {
            return Err(SubscriptionError::InvalidConfig("empty filter field"));
        }
        Ok(())
    }

    /// Whether this subscription accepts messages from any source.
    pub fn wildcard_source(&self) -> bool {
        self.sources.iter().any(|s| s == SOURCE_WILDCARD)
    }
}

/// A subscription snapshot as returned by the manager.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    /// Manager-assigned identifier.
    pub id: String,
    /// The validated configuration.
    pub config: SubscriptionConfig,
    /// Current lifecycle state.
    pub status: SubscriptionStatus,
    /// Messages delivered so far.
    pub message_count: u64,
    /// Time of last delivery, ms since UNIX epoch.
    pub last_message_at_ms: Option<u64>,
    /// Creation time, ms since UNIX epoch.
    pub created_at_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> SubscriptionConfig {
        SubscriptionConfig {
            schemas: vec!["OMM".into()],
            sources: vec![SOURCE_WILDCARD.into()],
            ..SubscriptionConfig::default()
        }
    }

    #[test]
    fn accepts_minimal_config() {
        base().validate().unwrap();
    }

    #[test]
    fn rejects_empty_collections() {
        let mut cfg = base();
        cfg.schemas.clear();
        assert!(cfg.validate().is_err());

        let mut cfg = base();
        cfg.sources.clear();
        assert!(cfg.validate().is_err());

        let mut cfg = base();
        cfg.filters.push(Filter {
            field: " ".into(),
            op: FilterOp::Eq,
            value: json!("x"),
        });
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_operator_fails_deserialisation() {
        let raw = r#"{"field":"A","op":"matches","value":1}"#;
        assert!(serde_json::from_str::<Filter>(raw).is_err());
    }

    #[test]
    fn operators_use_wire_names() {
        let f: Filter = serde_json::from_str(r#"{"field":"A","op":"startsWith","value":"x"}"#).unwrap();
        assert_eq!(f.op, FilterOp::StartsWith);
        let f: Filter = serde_json::from_str(r#"{"field":"A","op":"notIn","value":[1]}"#).unwrap();
        assert_eq!(f.op, FilterOp::NotIn);
    }
}
