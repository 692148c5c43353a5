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

//! SLIP-10 key derivation from the master seed.

use ed25519_dalek::SigningKey;
use libp2p::{identity as p2p_identity, PeerId};
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};
use zeroize::Zeroizing;

use super::addresses::AuxAddresses;
use super::IdentityError;

/// Registered coin type for the space-data network.
pub const COIN_TYPE: u32 = 1957;

const CHANGE_SIGNING: u32 = 0;
const CHANGE_ENCRYPTION: u32 = 1;

/// Hardened derivation paths backing an [`Identity`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DerivationPaths {
    /// Ed25519 signing path (`m/44'/1957'/account'/0'/0'`).
    pub signing: String,
    /// X25519 encryption path (`m/44'/1957'/account'/1'/0'`).
    pub encryption: String,
}

/// A fully derived node identity.
///
/// Private halves zeroise on drop; callers that need the raw signing secret
/// for transport handshakes go through [`Identity::libp2p_keypair`], which
/// hands libp2p a copy it wipes itself.
pub struct Identity {
    /// Self-certifying peer identifier (hash of the signing public key).
    pub peer_id: PeerId,
    /// Ed25519 signing keypair.
    pub signing: SigningKey,
    /// X25519 encryption secret.
    pub encryption: StaticSecret,
    /// X25519 encryption public key.
    pub encryption_public: X25519Public,
    /// Paths the keys were derived at.
    pub paths: DerivationPaths,
    /// Auxiliary blockchain-style addresses.
    pub addresses: AuxAddresses,
    /// Account index the identity originated from.
    pub account_index: u32,
}

impl Identity {
    /// Build the libp2p keypair for transport authentication.
    pub fn libp2p_keypair(&self) -> Result<p2p_identity::Keypair, IdentityError> {
        let mut secret = Zeroizing::new(self.signing.to_bytes());
        p2p_identity::Keypair::ed25519_from_bytes(&mut *secret)
            .map_err(|_| IdentityError::DerivationError)
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("peer_id", &self.peer_id)
            .field("paths", &self.paths)
            .field("account_index", &self.account_index)
            .finish_non_exhaustive()
    }
}

/// Derive the identity for `account` from a 64-byte master seed.
///
/// Every component of both paths is hardened; the same seed and account
/// always reproduce the same peer id.
pub fn derive_identity(seed: &[u8], account: u32) -> Result<Identity, IdentityError> {
    if seed.len() != 64 {
        return Err(IdentityError::DerivationError);
    }

    let signing_secret = Zeroizing::new(slip10_ed25519::derive_ed25519_private_key(
        seed,
        &[44, COIN_TYPE, account, CHANGE_SIGNING, 0],
    ));
    let encryption_secret = Zeroizing::new(slip10_ed25519::derive_ed25519_private_key(
        seed,
        &[44, COIN_TYPE, account, CHANGE_ENCRYPTION, 0],
    ));

    let signing = SigningKey::from_bytes(&signing_secret);
    let encryption = StaticSecret::from(*encryption_secret);
    let encryption_public = X25519Public::from(&encryption);

    let mut transport_secret = Zeroizing::new(*signing_secret);
    let keypair = p2p_identity::Keypair::ed25519_from_bytes(&mut *transport_secret)
        .map_err(|_| IdentityError::DerivationError)?;
    let peer_id = PeerId::from(keypair.public());

    let addresses = AuxAddresses::derive(seed, account)?;

    Ok(Identity {
        peer_id,
        signing,
        encryption,
        encryption_public,
        paths: DerivationPaths {
            signing: format!("m/44'/{COIN_TYPE}'/{account}'/{CHANGE_SIGNING}'/0'"),
            encryption: format!("m/44'/{COIN_TYPE}'/{account}'/{CHANGE_ENCRYPTION}'/0'"),
        },
        addresses,
        account_index: account,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::phrase_to_seed;

    const ABANDON: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn identity_is_deterministic() {
        let seed = phrase_to_seed(ABANDON, "").unwrap();
        let a = derive_identity(&seed[..], 0).unwrap();
        let b = derive_identity(&seed[..], 0).unwrap();
        assert_eq!(a.peer_id, b.peer_id);
        assert_eq!(a.signing.to_bytes(), b.signing.to_bytes());
        assert_eq!(a.encryption_public.as_bytes(), b.encryption_public.as_bytes());
        assert_eq!(a.addresses, b.addresses);
    }

    #[test]
    fn accounts_are_isolated() {
        let seed = phrase_to_seed(ABANDON, "").unwrap();
        let a = derive_identity(&seed[..], 0).unwrap();
        let b = derive_identity(&seed[..], 1).unwrap();
        assert_ne!(a.peer_id, b.peer_id);
        assert_ne!(a.signing.to_bytes(), b.signing.to_bytes());
    }

    #[test]
    fn signing_and_encryption_branches_differ() {
        let seed = phrase_to_seed(ABANDON, "").unwrap();
        let id = derive_identity(&seed[..], 0).unwrap();
        assert_ne!(
            id.signing.to_bytes().as_slice(),
            id.encryption.to_bytes().as_slice()
        );
    }

    #[test]
    fn rejects_short_seed() {
        assert!(matches!(
            derive_identity(&[0u8; 32], 0),
            Err(IdentityError::DerivationError)
        ));
    }

    #[test]
    fn peer_id_matches_transport_keypair() {
        let seed = phrase_to_seed(ABANDON, "").unwrap();
        let id = derive_identity(&seed[..], 0).unwrap();
        let kp = id.libp2p_keypair().unwrap();
        assert_eq!(PeerId::from(kp.public()), id.peer_id);
    }
}
