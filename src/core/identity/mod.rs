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

//! Deterministic node identity derived from a recovery phrase.
//!
//! A 12/15/18/21/24-word phrase plus an optional passphrase yields a 64-byte
//! seed; hardened SLIP-10 derivation at `m/44'/1957'/account'/0'/0'` produces
//! the Ed25519 signing key (and thereby the libp2p peer id), the `change=1`
//! branch produces the X25519 encryption key. Auxiliary bitcoin/ethereum/
//! solana addresses ride along for cross-chain anchoring.

mod addresses;
mod derive;
mod keystore;
mod phrase;

pub use addresses::AuxAddresses;
pub use derive::{derive_identity, DerivationPaths, Identity};
pub use keystore::{load_or_create_identity, persist_seed, StoredIdentity};
pub use phrase::{generate_recovery_phrase, phrase_from_entropy, phrase_to_seed, validate_recovery_phrase};

use thiserror::Error;

/// Identity subsystem errors.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The recovery phrase failed checksum or wordlist validation.
    #[error("invalid recovery phrase")]
    InvalidPhrase,
    /// Entropy of unsupported size (or the system RNG failed).
    #[error("insufficient entropy")]
    NoEntropy,
    /// Curve arithmetic rejected a derived component.
    #[error("derivation error")]
    DerivationError,
    /// Key file could not be read or written.
    #[error("io")]
    Io,
    /// At-rest encryption failed (wrong passphrase or corrupt file).
    #[error("crypto")]
    Crypto,
    /// Encrypted key file present but no passphrase configured.
    #[error("missing passphrase (set SDN_KEY_PASSPHRASE)")]
    MissingPassphrase,
}
