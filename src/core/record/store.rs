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

//! Durable, append-only record storage over sled.
//!
//! Everything lives in one on-disk table with role-prefixed keys:
//! `r‖schema‖cid` blob rows, `c‖cid` the cid→schema lookup, `i‖schema‖day‖cid`
//! index rows carrying the projection cells, and `l‖writer` the quota ledger.
//! One write mutex keeps write-and-bump atomic; the row inserts themselves go
//! through a sled transaction so a crash never leaves a partial record.

use std::{
    sync::Mutex,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use rand::Rng;
use serde::{Deserialize, Serialize};
use sled::transaction::ConflictableTransactionError;
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::codec::{decode_canonical_limited, encode_canonical};
use crate::core::record::cid::Cid;
use crate::core::record::schema::{self, ProjectionError};

const SEP: u8 = 0x00;
const ROLE_RECORD: u8 = b'r';
const ROLE_CID: u8 = b'c';
const ROLE_INDEX: u8 = b'i';
const ROLE_LEDGER: u8 = b'l';
const ROW_MAX_BYTES: usize = 64 * 1024 * 1024;

/// Store errors; categorical per the error-handling design.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Schema tag not in the allow-list.
    #[error("schema not allowed")]
    InvalidSchema,
    /// A required projection could not be decoded.
    #[error("invalid payload")]
    InvalidPayload,
    /// Writer would exceed its byte quota.
    #[error("quota exceeded")]
    QuotaExceeded,
    /// No such record.
    #[error("not found")]
    NotFound,
    /// Persistence failed after one retry.
    #[error("db io")]
    Db,
    /// Stored row failed to decode.
    #[error("row codec")]
    Codec,
}

/// Store tuning knobs.
#[derive(Clone, Copy, Debug)]
pub struct StoreConfig {
    /// Ledger quota applied to writers without an override.
    pub default_quota_bytes: u64,
    /// Query limit used when the caller passes 0.
    pub default_query_limit: usize,
    /// Upper clamp for query limits.
    pub max_query_limit: usize,
    /// Hard ceiling for query offsets.
    pub max_query_offset: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_quota_bytes: 512 * 1024 * 1024,
            default_query_limit: 100,
            max_query_limit: 1_000,
            max_query_offset: 100_000,
        }
    }
}

/// A stored record with its identifying metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    /// Content identifier.
    pub cid: Cid,
    /// Schema tag.
    pub schema: String,
    /// Writer peer id (base58).
    pub writer: String,
    /// Writer signature over the payload, if supplied.
    pub signature: Option<Vec<u8>>,
    /// Opaque payload bytes.
    pub payload: Vec<u8>,
    /// Arrival time, ms since UNIX epoch.
    pub received_at_ms: u64,
    /// Projected day cell.
    pub day: Option<String>,
    /// Projected numeric cell.
    pub numeric_key: Option<i64>,
    /// Projected entity cell.
    pub entity_key: Option<String>,
}

/// Query over the indexed projections.
#[derive(Clone, Debug, Default)]
pub struct IndexQuery {
    /// Restrict to one day cell.
    pub day: Option<String>,
    /// Restrict to one numeric cell.
    pub numeric_key: Option<i64>,
    /// Restrict to one entity cell.
    pub entity_key: Option<String>,
    /// Page size (0 = store default, clamped to the configured maximum).
    pub limit: usize,
    /// Page offset (clamped to the configured ceiling).
    pub offset: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct RecordRow {
    writer: String,
    signature: Option<Vec<u8>>,
    payload: Vec<u8>,
    received_at_ms: u64,
    day: Option<String>,
    numeric_key: Option<i64>,
    entity_key: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexRow {
    cid: String,
    received_at_ms: u64,
    numeric_key: Option<i64>,
    entity_key: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerRow {
    bytes_stored: u64,
    bytes_quota: Option<u64>,
}

/// The content-addressed record store.
pub struct RecordStore {
    tree: sled::Tree,
    write_lock: Mutex<()>,
    config: StoreConfig,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn record_key(schema: &str, cid: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(2 + schema.len() + 1 + cid.len());
    key.push(ROLE_RECORD);
    key.push(SEP);
    key.extend_from_slice(schema.as_bytes());
    key.push(SEP);
    key.extend_from_slice(cid.as_bytes());
    key
}

fn cid_key(cid: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(2 + cid.len());
    key.push(ROLE_CID);
    key.push(SEP);
    key.extend_from_slice(cid.as_bytes());
    key
}

fn index_key(schema: &str, day: Option<&str>, cid: &str) -> Vec<u8> {
    let day = day.unwrap_or("");
    let mut key = Vec::with_capacity(2 + schema.len() + day.len() + 2 + cid.len());
    key.push(ROLE_INDEX);
    key.push(SEP);
    key.extend_from_slice(schema.as_bytes());
    key.push(SEP);
    key.extend_from_slice(day.as_bytes());
    key.push(SEP);
    key.extend_from_slice(cid.as_bytes());
    key
}

fn index_prefix(schema: &str, day: Option<&str>) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(2 + schema.len() + 12);
    prefix.push(ROLE_INDEX);
    prefix.push(SEP);
    prefix.extend_from_slice(schema.as_bytes());
    prefix.push(SEP);
    if let Some(day) = day {
        prefix.extend_from_slice(day.as_bytes());
        prefix.push(SEP);
    }
    prefix
}

fn ledger_key(writer: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(2 + writer.len());
    key.push(ROLE_LEDGER);
    key.push(SEP);
    key.extend_from_slice(writer.as_bytes());
    key
}

impl RecordStore {
    /// Open the store inside `db`.
    pub fn open(db: &sled::Db, config: StoreConfig) -> Result<Self, StoreError> {
        Ok(Self {
            tree: db.open_tree("records").map_err(|_| StoreError::Db)?,
            write_lock: Mutex::new(()),
            config,
        })
    }

    /// Store configuration in effect.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Append a record. Idempotent for identical bytes: the existing row is
    /// kept and the ledger is unchanged.
    pub fn store(
        &self,
        schema_tag: &str,
        payload: &[u8],
        writer: &str,
        signature: Option<Vec<u8>>,
    ) -> Result<Cid, StoreError> {
        let def = schema::lookup(schema_tag).ok_or(StoreError::InvalidSchema)?;
        let projections = schema::extract(def, payload).map_err(|e| match e {
            ProjectionError::MissingRequired => StoreError::InvalidPayload,
        })?;
        let cid = Cid::compute(schema_tag, payload);

        let _guard = match self.write_lock.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };

        let rec_key = record_key(schema_tag, cid.as_str());
        if self
            .tree
            .contains_key(&rec_key)
            .map_err(|_| StoreError::Db)?
        {
            debug!(cid = %cid, schema = schema_tag, "duplicate write, keeping existing row");
            return Ok(cid);
        }

        self.check_quota(writer, payload.len() as u64)?;

        let row = RecordRow {
            writer: writer.to_string(),
            signature,
            payload: payload.to_vec(),
            received_at_ms: now_ms(),
            day: projections.day.clone(),
            numeric_key: projections.numeric_key,
            entity_key: projections.entity_key.clone(),
        };
        let row_bytes = encode_canonical(&row).map_err(|_| StoreError::Codec)?;
        let idx_bytes = encode_canonical(&IndexRow {
            cid: cid.as_str().to_string(),
            received_at_ms: row.received_at_ms,
            numeric_key: row.numeric_key,
            entity_key: row.entity_key.clone(),
        })
        .map_err(|_| StoreError::Codec)?;
        let idx_key = index_key(schema_tag, projections.day.as_deref(), cid.as_str());
        let ckey = cid_key(cid.as_str());
        let lkey = ledger_key(writer);
        let ledger_bytes = {
            let mut entry = self.ledger_row(writer)?;
            entry.bytes_stored = entry.bytes_stored.saturating_add(payload.len() as u64);
            encode_canonical(&entry).map_err(|_| StoreError::Codec)?
        };

        self.with_retry(|| {
            self.tree.transaction(|t| {
                t.insert(rec_key.as_slice(), row_bytes.as_slice())?;
                t.insert(ckey.as_slice(), schema_tag.as_bytes())?;
                t.insert(idx_key.as_slice(), idx_bytes.as_slice())?;
                t.insert(lkey.as_slice(), ledger_bytes.as_slice())?;
                Ok::<(), ConflictableTransactionError<()>>(())
            })
        })?;

        Ok(cid)
    }

    /// Fetch a record by CID.
    pub fn query_by_cid(&self, cid: &Cid) -> Result<Record, StoreError> {
        let schema_bytes = self
            .tree
            .get(cid_key(cid.as_str()))
            .map_err(|_| StoreError::Db)?
            .ok_or(StoreError::NotFound)?;
        let schema_tag = String::from_utf8(schema_bytes.to_vec()).map_err(|_| StoreError::Codec)?;
        let row_bytes = self
            .tree
            .get(record_key(&schema_tag, cid.as_str()))
            .map_err(|_| StoreError::Db)?
            .ok_or(StoreError::NotFound)?;
        let row: RecordRow =
            decode_canonical_limited(&row_bytes, ROW_MAX_BYTES).map_err(|_| StoreError::Codec)?;
        Ok(assemble(cid.clone(), schema_tag, row))
    }

    /// Query records by indexed projections, newest first.
    pub fn query_by_indexed_fields(
        &self,
        schema_tag: &str,
        query: &IndexQuery,
    ) -> Result<Vec<Record>, StoreError> {
        schema::lookup(schema_tag).ok_or(StoreError::InvalidSchema)?;

        let limit = match query.limit {
            0 => self.config.default_query_limit,
            n => n.min(self.config.max_query_limit),
        };
        let offset = query.offset.min(self.config.max_query_offset);

        let prefix = index_prefix(schema_tag, query.day.as_deref());
        let mut hits: Vec<IndexRow> = Vec::new();
        for item in self.tree.scan_prefix(&prefix) {
            let (_key, value) = item.map_err(|_| StoreError::Db)?;
            let row: IndexRow =
                decode_canonical_limited(&value, ROW_MAX_BYTES).map_err(|_| StoreError::Codec)?;
            if let Some(n) = query.numeric_key {
                if row.numeric_key != Some(n) {
                    continue;
                }
            }
            if let Some(entity) = query.entity_key.as_deref() {
                if row.entity_key.as_deref() != Some(entity) {
                    continue;
                }
            }
            hits.push(row);
        }

        hits.sort_by(|a, b| {
            b.received_at_ms
                .cmp(&a.received_at_ms)
                .then_with(|| a.cid.cmp(&b.cid))
        });

        let mut out = Vec::with_capacity(limit.min(hits.len()));
        for hit in hits.into_iter().skip(offset).take(limit) {
            let cid = Cid::parse(&hit.cid).map_err(|_| StoreError::Codec)?;
            out.push(self.query_by_cid(&cid)?);
        }
        Ok(out)
    }

    /// Bytes currently attributed to `writer`. O(1).
    pub fn peer_storage_bytes(&self, writer: &str) -> Result<u64, StoreError> {
        Ok(self.ledger_row(writer)?.bytes_stored)
    }

    /// Effective quota for `writer` (override or default).
    pub fn peer_quota_bytes(&self, writer: &str) -> Result<u64, StoreError> {
        Ok(self
            .ledger_row(writer)?
            .bytes_quota
            .unwrap_or(self.config.default_quota_bytes))
    }

    /// Set a per-writer quota override.
    pub fn set_peer_quota(&self, writer: &str, quota: u64) -> Result<(), StoreError> {
        let _guard = match self.write_lock.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut entry = self.ledger_row(writer)?;
        entry.bytes_quota = Some(quota);
        let bytes = encode_canonical(&entry).map_err(|_| StoreError::Codec)?;
        let key = ledger_key(writer);
        self.with_retry(|| self.tree.insert(key.as_slice(), bytes.as_slice()).map(|_| ()))
    }

    /// Admin purge of a record; decrements the writer's ledger.
    pub fn delete(&self, cid: &Cid) -> Result<(), StoreError> {
        let _guard = match self.write_lock.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };

        let record = self.query_by_cid(cid)?;
        let rec_key = record_key(&record.schema, cid.as_str());
        let idx_key = index_key(&record.schema, record.day.as_deref(), cid.as_str());
        let ckey = cid_key(cid.as_str());
        let lkey = ledger_key(&record.writer);

        let ledger_bytes = {
            let mut entry = self.ledger_row(&record.writer)?;
            entry.bytes_stored = entry
                .bytes_stored
                .saturating_sub(record.payload.len() as u64);
            encode_canonical(&entry).map_err(|_| StoreError::Codec)?
        };

        self.with_retry(|| {
            self.tree.transaction(|t| {
                t.remove(rec_key.as_slice())?;
                t.remove(ckey.as_slice())?;
                t.remove(idx_key.as_slice())?;
                t.insert(lkey.as_slice(), ledger_bytes.as_slice())?;
                Ok::<(), ConflictableTransactionError<()>>(())
            })
        })
    }

    /// `OK` iff the writer's stored bytes plus `payload_size` fit its quota.
    pub fn check_quota(&self, writer: &str, payload_size: u64) -> Result<(), StoreError> {
        let entry = self.ledger_row(writer)?;
        let quota = entry.bytes_quota.unwrap_or(self.config.default_quota_bytes);
        if entry.bytes_stored.saturating_add(payload_size) > quota {
            return Err(StoreError::QuotaExceeded);
        }
        Ok(())
    }

    fn ledger_row(&self, writer: &str) -> Result<LedgerRow, StoreError> {
        match self
            .tree
            .get(ledger_key(writer))
            .map_err(|_| StoreError::Db)?
        {
            Some(bytes) => decode_canonical_limited(&bytes, 4096).map_err(|_| StoreError::Codec),
            None => Ok(LedgerRow::default()),
        }
    }

    fn with_retry<T, E: std::fmt::Debug>(
        &self,
        op: impl Fn() -> Result<T, E>,
    ) -> Result<T, StoreError> {
        match op() {
            Ok(v) => Ok(v),
            Err(first) => {
                let jitter = rand::thread_rng().gen_range(5..40);
                std::thread::sleep(Duration::from_millis(jitter));
                op().map_err(|second| {
                    warn!(?first, ?second, "store write failed after retry");
                    StoreError::Db
                })
            }
        }
    }
}

fn assemble(cid: Cid, schema: String, row: RecordRow) -> Record {
    Record {
        cid,
        schema,
        writer: row.writer,
        signature: row.signature,
        payload: row.payload,
        received_at_ms: row.received_at_ms,
        day: row.day,
        numeric_key: row.numeric_key,
        entity_key: row.entity_key,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn round_trips_byte_identical() {
        let (_dir, store) = open_store(1024);
        let payload = br#"{"EPOCH":"2026-07-01T00:00:00Z","NORAD_CAT_ID":25544}"#;
        let cid = store.store("OMM", payload, "writer1", None).unwrap();
        let record = store.query_by_cid(&cid).unwrap();
        assert_eq!(record.payload, payload.to_vec());
        assert_eq!(record.schema, "OMM");
        assert_eq!(record.writer, "writer1");
        assert_eq!(record.day.as_deref(), Some("2026-07-01"));
        assert_eq!(record.numeric_key, Some(25544));
    }

    #[test]
    fn duplicate_write_is_idempotent() {
        let (_dir, store) = open_store(1024);
        let payload = [7u8; 32];
        let a = store.store("OMM", &payload, "writer1", None).unwrap();
        let b = store.store("OMM", &payload, "writer1", None).unwrap();
        assert_eq!(a, b);
        assert_eq!(store.peer_storage_bytes("writer1").unwrap(), 32);
    }

    #[test]
    fn quota_fence() {
        let (_dir, store) = open_store(100);
        store.store("OMM", &[1u8; 60], "writer1", None).unwrap();
        assert!(matches!(
            store.store("OMM", &[2u8; 50], "writer1", None),
            Err(StoreError::QuotaExceeded)
        ));
        store.store("OMM", &[3u8; 40], "writer1", None).unwrap();
        assert_eq!(store.peer_storage_bytes("writer1").unwrap(), 100);
    }

    #[test]
    fn per_writer_override() {
        let (_dir, store) = open_store(100);
        store.set_peer_quota("writer1", 10).unwrap();
        assert!(matches!(
            store.store("OMM", &[1u8; 11], "writer1", None),
            Err(StoreError::QuotaExceeded)
        ));
        // Other writers keep the default.
        store.store("OMM", &[1u8; 11], "writer2", None).unwrap();
    }

    #[test]
    fn rejects_unknown_schema() {
        let (_dir, store) = open_store(1024);
        assert!(matches!(
            store.store("BOGUS", b"x", "writer1", None),
            Err(StoreError::InvalidSchema)
        ));
    }

    #[test]
    fn rejects_missing_required_projection() {
        let (_dir, store) = open_store(1024);
        assert!(matches!(
            store.store("EOP", br#"{"X_POLE":1.0}"#, "writer1", None),
            Err(StoreError::InvalidPayload)
        ));
    }

    #[test]
    fn indexed_query_filters_and_orders() {
        let (_dir, store) = open_store(8192);
        for id in [25544, 25544, 43013] {
            let payload = format!(
                r#"{{"EPOCH":"2026-07-01T0{}:00:00Z","NORAD_CAT_ID":{id},"OBJECT_ID":"obj-{id}"}}"#,
                id % 10
            );
            store
                .store("OMM", payload.as_bytes(), "writer1", None)
                .unwrap();
        }
        let all = store
            .query_by_indexed_fields(
                "OMM",
                &IndexQuery {
                    day: Some("2026-07-01".into()),
                    ..IndexQuery::default()
                },
            )
            .unwrap();
        assert_eq!(all.len(), 2); // duplicate collapsed to one CID

        let iss = store
            .query_by_indexed_fields(
                "OMM",
                &IndexQuery {
                    day: Some("2026-07-01".into()),
                    numeric_key: Some(25544),
                    ..IndexQuery::default()
                },
            )
            .unwrap();
        assert_eq!(iss.len(), 1);
        assert_eq!(iss[0].numeric_key, Some(25544));

        let named = store
            .query_by_indexed_fields(
                "OMM",
                &IndexQuery {
                    entity_key: Some("obj-43013".into()),
                    ..IndexQuery::default()
                },
            )
            .unwrap();
        assert_eq!(named.len(), 1);

        for pair in all.windows(2) {
            assert!(pair[0].received_at_ms >= pair[1].received_at_ms);
        }
    }

    #[test]
    fn limit_and_offset_are_clamped() {
        let (_dir, store) = open_store(1 << 20);
        for i in 0..5u8 {
            store.store("CAT", &[i; 4], "writer1", None).unwrap();
        }
        let q = IndexQuery {
            limit: 10_000_000,
            ..IndexQuery::default()
        };
        let rows = store.query_by_indexed_fields("CAT", &q).unwrap();
        assert_eq!(rows.len(), 5);

        let q = IndexQuery {
            offset: usize::MAX,
            ..IndexQuery::default()
        };
        let rows = store.query_by_indexed_fields("CAT", &q).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn delete_decrements_ledger() {
        let (_dir, store) = open_store(1024);
        let cid = store.store("OMM", &[9u8; 64], "writer1", None).unwrap();
        assert_eq!(store.peer_storage_bytes("writer1").unwrap(), 64);
        store.delete(&cid).unwrap();
        assert_eq!(store.peer_storage_bytes("writer1").unwrap(), 0);
        assert!(matches!(store.query_by_cid(&cid), Err(StoreError::NotFound)));
        assert!(matches!(store.delete(&cid), Err(StoreError::NotFound)));
    }
}
