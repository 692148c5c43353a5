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

//! Stable row encoding for store rows and signed profile blobs.
//!
//! Two consumers share this codec: ledger/index/blob rows persisted in sled,
//! and profile bodies whose bytes are signed and verified across nodes. Both
//! need the same bytes for the same value on every node, so bincode is
//! pinned to fixed-width integers with trailing bytes rejected. Decoding
//! always takes an explicit byte budget: rows read back from disk and blobs
//! received from peers carry length headers an attacker can forge, and a
//! forged length must fail the decode instead of sizing an allocation.

use bincode::Options;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Row codec failures.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Value could not be serialised.
    #[error("encode")]
    Encode,
    /// Bytes did not decode as the expected row shape.
    #[error("decode")]
    Decode,
    /// Input exceeds the caller's byte budget.
    #[error("over budget")]
    OverBudget,
}

fn row_options(budget: u64) -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
        .with_limit(budget)
}

/// Encode a value with the stable row encoding.
///
/// Containers must iterate deterministically (BTreeMap/BTreeSet, never a
/// hash map) or signatures over the output will not reproduce.
pub fn encode_canonical<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    row_options(u64::MAX)
        .serialize(value)
        .map_err(|_| CodecError::Encode)
}

/// Decode a row within `budget` bytes.
///
/// The budget bounds the input slice up front and is also handed to the
/// deserialiser, which applies it to every container length it reads.
pub fn decode_canonical_limited<T: DeserializeOwned>(
    bytes: &[u8],
    budget: usize,
) -> Result<T, CodecError> {
    if bytes.len() > budget {
        return Err(CodecError::OverBudget);
    }
    row_options(budget as u64)
        .deserialize(bytes)
        .map_err(|_| CodecError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Row {
        a: u64,
        b: String,
    }

    #[test]
    fn round_trip() {
        let row = Row {
            a: 7,
            b: "omm".to_string(),
        };
        let bytes = encode_canonical(&row).unwrap();
        let back: Row = decode_canonical_limited(&bytes, 1024).unwrap();
        assert_eq!(row, back);
    }

    #[test]
    fn fixed_width_integers_keep_the_encoding_stable() {
        // A varint encoding would shrink small values; fixint must not.
        let small = encode_canonical(&Row {
            a: 1,
            b: String::new(),
        })
        .unwrap();
        let large = encode_canonical(&Row {
            a: u64::MAX,
            b: String::new(),
        })
        .unwrap();
        assert_eq!(small.len(), large.len());
    }

    #[test]
    fn rejects_over_budget_input() {
        let row = Row {
            a: 7,
            b: "x".repeat(64),
        };
        let bytes = encode_canonical(&row).unwrap();
        let err = decode_canonical_limited::<Row>(&bytes, 8).unwrap_err();
        assert!(matches!(err, CodecError::OverBudget));
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mut bytes = encode_canonical(&Row {
            a: 1,
            b: "b".to_string(),
        })
        .unwrap();
        bytes.push(0xff);
        assert!(matches!(
            decode_canonical_limited::<Row>(&bytes, 1024),
            Err(CodecError::Decode)
        ));
    }
}
