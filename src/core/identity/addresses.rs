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

//! Auxiliary blockchain-style addresses derived from the master seed.
//!
//! These anchor a node identity to external ledgers. Bitcoin and ethereum
//! follow the usual BIP-84 / BIP-44 secp256k1 trees; solana reuses the
//! hardened SLIP-10 Ed25519 derivation.

use ed25519_dalek::SigningKey;
use hmac::{Hmac, Mac};
use k256::elliptic_curve::{sec1::ToEncodedPoint, Field, PrimeField};
use k256::{ProjectivePoint, Scalar};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};

use super::IdentityError;

type HmacSha512 = Hmac<Sha512>;

const HARDENED: u32 = 0x8000_0000;

/// Addresses on external ledgers owned by the same seed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuxAddresses {
    /// Bitcoin P2WPKH (bech32, witness v0) at `m/84'/0'/account'/0/0`.
    pub bitcoin: String,
    /// Ethereum EIP-55 checksummed hex at `m/44'/60'/account'/0/0`.
    pub ethereum: String,
    /// Solana base58 Ed25519 key at `m/44'/501'/account'/0'`.
    pub solana: String,
}

impl AuxAddresses {
    /// Derive all three addresses for `account`.
    pub fn derive(seed: &[u8], account: u32) -> Result<Self, IdentityError> {
        let master = ExtKey::from_seed(seed)?;

        let btc_key = master.derive_path(&[
            84 | HARDENED,
            HARDENED,
            account | HARDENED,
            0,
            0,
        ])?;
        let eth_key = master.derive_path(&[
            44 | HARDENED,
            60 | HARDENED,
            account | HARDENED,
            0,
            0,
        ])?;

        let sol_secret = slip10_ed25519::derive_ed25519_private_key(seed, &[44, 501, account, 0]);
        let sol_public = SigningKey::from_bytes(&sol_secret).verifying_key();

        Ok(Self {
            bitcoin: p2wpkh_address(&btc_key)?,
            ethereum: eip55_address(&eth_key),
            solana: bs58::encode(sol_public.as_bytes()).into_string(),
        })
    }
}

/// BIP-32 extended secp256k1 private key.
struct ExtKey {
    key: Scalar,
    chain: [u8; 32],
}

impl ExtKey {
    fn from_seed(seed: &[u8]) -> Result<Self, IdentityError> {
        let mut mac = HmacSha512::new_from_slice(b"Bitcoin seed")
            .map_err(|_| IdentityError::DerivationError)?;
        mac.update(seed);
        Self::from_hmac_output(&mac.finalize().into_bytes(), None)
    }

    fn child(&self, index: u32) -> Result<Self, IdentityError> {
        let mut mac =
            HmacSha512::new_from_slice(&self.chain).map_err(|_| IdentityError::DerivationError)?;
        if index & HARDENED != 0 {
            mac.update(&[0u8]);
            mac.update(&self.key.to_repr());
        } else {
            let point = (ProjectivePoint::GENERATOR * self.key)
                .to_affine()
                .to_encoded_point(true);
            mac.update(point.as_bytes());
        }
        mac.update(&index.to_be_bytes());
        Self::from_hmac_output(&mac.finalize().into_bytes(), Some(&self.key))
    }

    fn derive_path(&self, indexes: &[u32]) -> Result<Self, IdentityError> {
        let mut node = Self {
            key: self.key,
            chain: self.chain,
        };
        for &index in indexes {
            node = node.child(index)?;
        }
        Ok(node)
    }

    fn from_hmac_output(out: &[u8], parent: Option<&Scalar>) -> Result<Self, IdentityError> {
        let (il, ir) = out.split_at(32);
        let il_bytes: [u8; 32] = il.try_into().map_err(|_| IdentityError::DerivationError)?;

        // IL outside the curve order is rejected rather than skipped.
        let tweak = Option::<Scalar>::from(Scalar::from_repr(il_bytes.into()))
            .ok_or(IdentityError::DerivationError)?;
        let key = match parent {
            Some(parent) => tweak + parent,
            None => tweak,
        };
        if bool::from(key.is_zero()) {
            return Err(IdentityError::DerivationError);
        }

        let mut chain = [0u8; 32];
        chain.copy_from_slice(ir);
        Ok(Self { key, chain })
    }

    fn public_compressed(&self) -> [u8; 33] {
        let point = (ProjectivePoint::GENERATOR * self.key)
            .to_affine()
            .to_encoded_point(true);
        let mut out = [0u8; 33];
        out.copy_from_slice(point.as_bytes());
        out
    }

    fn public_uncompressed(&self) -> [u8; 65] {
        let point = (ProjectivePoint::GENERATOR * self.key)
            .to_affine()
            .to_encoded_point(false);
        let mut out = [0u8; 65];
        out.copy_from_slice(point.as_bytes());
        out
    }
}

fn p2wpkh_address(key: &ExtKey) -> Result<String, IdentityError> {
    use ripemd::Ripemd160;

    let sha = Sha256::digest(key.public_compressed());
    let program = Ripemd160::digest(sha);
    bech32::segwit::encode(bech32::hrp::BC, bech32::segwit::VERSION_0, &program)
        .map_err(|_| IdentityError::DerivationError)
}

fn eip55_address(key: &ExtKey) -> String {
    use sha3::{Digest as _, Keccak256};

    let public = key.public_uncompressed();
    let hash = Keccak256::digest(&public[1..]);
    let raw = hex::encode(&hash[12..]);

    // EIP-55: uppercase a hex letter when the matching nibble of
    // keccak256(lowercase address) is >= 8.
    let check = Keccak256::digest(raw.as_bytes());
    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in raw.chars().enumerate() {
        let nibble = (check[i / 2] >> (4 * (1 - i % 2))) & 0x0f;
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}
