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
#![warn(missing_docs)]

//! Dot-path access into decoded payload values.
//!
//! Record payloads that decode as JSON objects feed both the projection
//! extractor and the subscription filter engine through this walk.

use serde_json::Value;

/// Decode a payload as a JSON object, if it is one.
pub fn decode_object(payload: &[u8]) -> Option<Value> {
    match serde_json::from_slice::<Value>(payload) {
        Ok(v @ Value::Object(_)) => Some(v),
        _ => None,
    }
}

/// Walk `path` ("A.B.C") into `root`. Array segments are not addressable;
/// a missing segment yields `None`.
pub fn lookup_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        if segment.is_empty() {
            return None;
        }
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Coerce a value to the numeric domain used by range operators.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// String-normalised rendering used by equality operators.
pub fn normalise(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn walks_nested_paths() {
        let v = json!({"a": {"b": {"c": 42}}});
        assert_eq!(lookup_path(&v, "a.b.c"), Some(&json!(42)));
        assert_eq!(lookup_path(&v, "a.b.missing"), None);
        assert_eq!(lookup_path(&v, ""), None);
    }

    #[test]
    fn numbers_coerce_from_strings() {
        assert_eq!(as_number(&json!("3.5")), Some(3.5));
        assert_eq!(as_number(&json!(7)), Some(7.0));
        assert_eq!(as_number(&json!(true)), None);
    }

    #[test]
    fn normalises_scalars() {
        assert_eq!(normalise(&json!("ISS")), "ISS");
        assert_eq!(normalise(&json!(25544)), "25544");
        assert_eq!(normalise(&json!(true)), "true");
    }
}
