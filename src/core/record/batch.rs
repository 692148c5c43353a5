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

//! Batch publish protocol.
//!
//! A batch body is `repeat { u32-BE length ; length bytes }`. Records are
//! validated and quota-checked in order; a per-record failure is reported
//! inline and the batch continues, but the first quota rejection stops it.

use serde::Serialize;
use thiserror::Error;

use super::store::{RecordStore, StoreError};

/// Envelope-level batch failures. Per-record failures live in the results.
#[derive(Debug, Error)]
pub enum BatchError {
    /// Framing damage: truncated length prefix or short payload.
    #[error("malformed batch stream")]
    Malformed,
    /// A single framed record exceeds the configured payload cap.
    #[error("record too large")]
    RecordTooLarge,
    /// Underlying store failure unrelated to any one record.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome for one framed record, in input order.
#[derive(Clone, Debug, Serialize)]
pub struct BatchOutcome {
    /// Position in the input stream.
    pub index: usize,
    /// Assigned CID on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
    /// Categorical error on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Framed payload size.
    pub bytes: usize,
}

/// Split a length-prefixed batch body into payload slices.
pub fn split_batch(body: &[u8], max_record_bytes: usize) -> Result<Vec<&[u8]>, BatchError> {
    let mut out = Vec::new();
    let mut cursor = 0usize;
    while cursor < body.len() {
        let Some(prefix) = body.get(cursor..cursor + 4) else {
            return Err(BatchError::Malformed);
        };
        let len = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
        if len > max_record_bytes {
            return Err(BatchError::RecordTooLarge);
        }
        cursor += 4;
        let Some(payload) = body.get(cursor..cursor + len) else {
            return Err(BatchError::Malformed);
        };
        out.push(payload);
        cursor += len;
    }
    Ok(out)
}

/// Frame payloads into a batch body (client side and binary query streams).
pub fn encode_batch<'a>(payloads: impl IntoIterator<Item = &'a [u8]>) -> Vec<u8> {
    let mut out = Vec::new();
    for payload in payloads {
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(payload);
    }
    out
}

/// Publish a framed batch under one schema for one writer.
pub fn publish_batch(
    store: &RecordStore,
    schema: &str,
    writer: &str,
    body: &[u8],
    max_record_bytes: usize,
) -> Result<Vec<BatchOutcome>, BatchError> {
    let payloads = split_batch(body, max_record_bytes)?;
    let mut results = Vec::with_capacity(payloads.len());

    for (index, payload) in payloads.into_iter().enumerate() {
        match store.store(schema, payload, writer, None) {
            Ok(cid) => results.push(BatchOutcome {
                index,
                cid: Some(cid.to_string()),
                error: None,
                bytes: payload.len(),
            }),
            Err(StoreError::QuotaExceeded) => {
                results.push(BatchOutcome {
                    index,
                    cid: None,
                    error: Some("quota_exceeded".into()),
                    bytes: payload.len(),
                });
                break;
            }
            Err(err) => results.push(BatchOutcome {
                index,
                cid: None,
                error: Some(error_label(&err).into()),
                bytes: payload.len(),
            }),
        }
    }
    Ok(results)
}

fn error_label(err: &StoreError) -> &'static str {
    match err {
        StoreError::InvalidSchema => "invalid_schema",
        StoreError::InvalidPayload => "invalid_payload",
        StoreError::QuotaExceeded => "quota_exceeded",
        StoreError::NotFound => "not_found",
        StoreError::Db => "storage_error",
        StoreError::Codec => "storage_error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::store::StoreConfig;

    fn open_store(quota: u64) -> (tempfile::TempDir, RecordStore) {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();
        let store = RecordStore::open(
            &db,
            StoreConfig {
                default_quota_bytes: quota,
                ..StoreConfig::default()
            },
        )
        .unwrap();
        (dir, store)
    }

    #[test]
    fn frame_round_trip() {
        let body = encode_batch([b"one".as_slice(), b"".as_slice(), b"three".as_slice()]);
        let parts = split_batch(&body, 1024).unwrap();
        assert_eq!(parts, vec![b"one".as_slice(), b"".as_slice(), b"three".as_slice()]);
    }

    #[test]
    fn truncated_frames_are_rejected() {
        assert!(matches!(split_batch(&[0, 0], 1024), Err(BatchError::Malformed)));
        let mut body = encode_batch([b"abc".as_slice()]);
        body.pop();
        assert!(matches!(split_batch(&body, 1024), Err(BatchError::Malformed)));
    }

    #[test]
    fn per_record_errors_continue_the_batch() {
        let (_dir, store) = open_store(1 << 20);
        // Middle record violates the EOP required-day rule.
        let body = encode_batch([
            br#"{"DATE":"2026-01-01"}"#.as_slice(),
            br#"{"X_POLE":1.0}"#.as_slice(),
            br#"{"DATE":"2026-01-02"}"#.as_slice(),
        ]);
        let results = publish_batch(&store, "EOP", "writer1", &body, 1024).unwrap();
        assert_eq!(results.len(), 3);
        assert!(results[0].cid.is_some());
        assert_eq!(results[1].error.as_deref(), Some("invalid_payload"));
        assert!(results[2].cid.is_some());
    }

    #[test]
    fn quota_exceed_stops_the_batch() {
        let (_dir, store) = open_store(40);
        let body = encode_batch([
            [1u8; 30].as_slice(),
            [2u8; 30].as_slice(),
            [3u8; 5].as_slice(),
        ]);
        let results = publish_batch(&store, "CAT", "writer1", &body, 1024).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].cid.is_some());
        assert_eq!(results[1].error.as_deref(), Some("quota_exceeded"));
    }
}
