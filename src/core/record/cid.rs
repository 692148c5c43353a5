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

//! Content identifiers.
//!
//! `CID = base32(SHA-256(schema ‖ 0x00 ‖ payload))`, lowercase RFC 4648
//! alphabet without padding. The writer never contributes to the hash, so
//! identical bytes always produce the same identifier.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

const BASE32_ALPHABET: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyz234567";

/// A 32-byte digest encodes to 52 base32 characters.
pub const CID_LEN: usize = 52;

/// CID parse errors.
#[derive(Debug, Error)]
pub enum CidError {
    /// Wrong length or character outside the base32 alphabet.
    #[error("malformed cid")]
    Malformed,
}

/// Content identifier for a stored record.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cid(String);

impl Cid {
    /// Compute the CID of a schema-tagged payload.
    pub fn compute(schema: &str, payload: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(schema.as_bytes());
        hasher.update([0u8]);
        hasher.update(payload);
        let digest = hasher.finalize();
        Self(base32_encode(&digest))
    }

    /// Parse and validate an externally supplied CID string.
    pub fn parse(text: &str) -> Result<Self, CidError> {
        if text.len() != CID_LEN
            || !text.bytes().all(|b| BASE32_ALPHABET.contains(&b))
        {
            return Err(CidError::Malformed);
        }
        Ok(Self(text.to_string()))
    }

    /// String form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn base32_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity((bytes.len() * 8 + 4) / 5);
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    for &b in bytes {
        acc = (acc << 8) | u32::from(b);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(BASE32_ALPHABET[((acc >> bits) & 0x1f) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(BASE32_ALPHABET[((acc << (5 - bits)) & 0x1f) as usize] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_and_writer_independent() {
        let a = Cid::compute("OMM", b"payload");
        let b = Cid::compute("OMM", b"payload");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), CID_LEN);
    }

    #[test]
    fn schema_participates_in_hash() {
        assert_ne!(Cid::compute("OMM", b"x"), Cid::compute("CDM", b"x"));
    }

    #[test]
    fn separator_prevents_boundary_collisions() {
        assert_ne!(Cid::compute("OM", b"Mx"), Cid::compute("OMM", b"x"));
    }

    #[test]
    fn parse_round_trips() {
        let cid = Cid::compute("OMM", b"payload");
        assert_eq!(Cid::parse(cid.as_str()).unwrap(), cid);
        assert!(Cid::parse("UPPERCASE").is_err());
        assert!(Cid::parse("short").is_err());
    }

    #[test]
    fn base32_matches_rfc4648() {
        // RFC 4648 test vector "foobar" => "mzxw6ytboi" (lowercase, unpadded).
        assert_eq!(base32_encode(b"foobar"), "mzxw6ytboi");
        assert_eq!(base32_encode(b""), "");
    }
}
