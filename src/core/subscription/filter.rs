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

//! Filter evaluation over decoded payloads.
//!
//! Operators pattern-match on the tagged JSON value; there is no dynamic
//! typing anywhere else. A missing field satisfies only `ne` and `notIn`.

use serde_json::Value;

use crate::core::value::{as_number, lookup_path, normalise};

use super::types::{Filter, FilterOp};

/// Evaluate one filter against a decoded payload (`None` when the payload
/// did not decode as an object).
pub fn filter_matches(filter: &Filter, decoded: Option<&Value>) -> bool {
    let operand = decoded.and_then(|root| lookup_path(root, &filter.field));

    let Some(operand) = operand else {
        return matches!(filter.op, FilterOp::Ne | FilterOp::NotIn);
    };

    match filter.op {
        FilterOp::Eq => normalise(operand) == normalise(&filter.value),
        FilterOp::Ne => normalise(operand) != normalise(&filter.value),
        FilterOp::Gt => numeric(operand, &filter.value).is_some_and(|(a, b)| a > b),
        FilterOp::Gte => numeric(operand, &filter.value).is_some_and(|(a, b)| a >= b),
        FilterOp::Lt => numeric(operand, &filter.value).is_some_and(|(a, b)| a < b),
        FilterOp::Lte => numeric(operand, &filter.value).is_some_and(|(a, b)| a <= b),
        FilterOp::Contains => string_pair(operand, &filter.value)
            .is_some_and(|(hay, needle)| hay.contains(&needle)),
        FilterOp::StartsWith => string_pair(operand, &filter.value)
            .is_some_and(|(hay, needle)| hay.starts_with(&needle)),
        FilterOp::EndsWith => string_pair(operand, &filter.value)
            .is_some_and(|(hay, needle)| hay.ends_with(&needle)),
        FilterOp::In => array_contains(operand, &filter.value) == Some(true),
        FilterOp::NotIn => array_contains(operand, &filter.value) == Some(false),
    }
}

/// Evaluate a conjunction of filters.
pub fn all_match(filters: &[Filter], decoded: Option<&Value>) -> bool {
    filters.iter().all(|f| filter_matches(f, decoded))
}

fn numeric(operand: &Value, literal: &Value) -> Option<(f64, f64)> {
    Some((as_number(operand)?, as_number(literal)?))
}

fn string_pair(operand: &Value, literal: &Value) -> Option<(String, String)> {
    let hay = operand.as_str()?.to_string();
    Some((hay, normalise(literal)))
}

/// Membership of the literal in an array operand. `None` for non-arrays so
/// that both `in` and `notIn` fail on them.
fn array_contains(operand: &Value, literal: &Value) -> Option<bool> {
    let items = operand.as_array()?;
    let needle = normalise(literal);
    Some(items.iter().any(|item| normalise(item) == needle))
}
