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

//! Deterministic conditional-read metadata for query results.
//!
//! The validator is a SHA-256 over the ordered `(CID, received_at)` tuples,
//! so identical result sets always produce identical tags regardless of
//! which node computed them.

use chrono::{TimeZone, Utc};
use sha2::{Digest, Sha256};

use super::store::Record;

/// Strong validator plus modification date for a result set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConditionalMeta {
    /// SHA-256 hex over the ordered `(cid, received_at)` tuples.
    pub etag: String,
    /// RFC-1123 date of the newest record, when the set is non-empty.
    pub last_modified: Option<String>,
}

/// Compute the conditional metadata for `records` in result order.
pub fn conditional_meta(records: &[Record]) -> ConditionalMeta {
    let mut hasher = Sha256::new();
    let mut newest: Option<u64> = None;
    for record in records {
        hasher.update(record.cid.as_str().as_bytes());
        hasher.update(record.received_at_ms.to_be_bytes());
        newest = Some(newest.map_or(record.received_at_ms, |n| n.max(record.received_at_ms)));
    }
    ConditionalMeta {
        etag: hex::encode(hasher.finalize()),
        last_modified: newest.map(http_date),
    }
}

/// RFC-1123 date for a millisecond UNIX timestamp.
pub fn http_date(ms: u64) -> String {
    let secs = (ms / 1000) as i64;
    let dt = Utc
        .timestamp_opt(secs, 0)
        .single()
        .unwrap_or_else(|| Utc.timestamp_opt(0, 0).single().unwrap_or_default());
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::cid::Cid;

    fn record(payload: &[u8], received_at_ms: u64) -> Record {
        Record {
            cid: Cid::compute("OMM", payload),
            schema: "OMM".into(),
            writer: "w".into(),
            signature: None,
            payload: payload.to_vec(),
            received_at_ms,
            day: None,
            numeric_key: None,
            entity_key: None,
        }
    }

    #[test]
    fn same_inputs_same_tag() {
        let rows = vec![record(b"a", 1_700_000_000_000), record(b"b", 1_700_000_060_000)];
        assert_eq!(conditional_meta(&rows), conditional_meta(&rows));
    }

    #[test]
    fn order_and_content_change_the_tag() {
        let a = record(b"a", 1);
        let b = record(b"b", 2);
        let fwd = conditional_meta(&[a.clone(), b.clone()]);
        let rev = conditional_meta(&[b, a]);
        assert_ne!(fwd.etag, rev.etag);
        // Last-modified tracks the max regardless of order.
        assert_eq!(fwd.last_modified, rev.last_modified);
    }

    #[test]
    fn empty_set_has_no_date() {
        let meta = conditional_meta(&[]);
        assert!(meta.last_modified.is_none());
        assert_eq!(meta.etag.len(), 64);
    }

    #[test]
    fn http_date_shape() {
        assert_eq!(http_date(0), "Thu, 01 Jan 1970 00:00:00 GMT");
    }
}
