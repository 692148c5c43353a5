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

//! At-rest storage of the master seed.
//!
//! ## Production hardening
//! - **Atomic writes** for private key material (tmp + fsync + rename, 0600).
//! - **Seed-at-rest encryption** (optional) via `SDN_KEY_PASSPHRASE`.
//! - **Best-effort zeroization** of sensitive buffers.
//!
//! ### Seed file format
//! If `SDN_KEY_PASSPHRASE` is set, `identity.seed` is stored as:
//! `MAGIC(8) || SALT(16) || NONCE(12) || CIPHERTEXT+TAG(..)`
//! where the ciphertext is AES-256-GCM over the 64-byte seed. Without a
//! passphrase the raw seed bytes are stored (still 0600).

use ring::{
    aead, pbkdf2,
    rand::{SecureRandom, SystemRandom},
};
use std::{
    fs,
    io::Write,
    num::NonZeroU32,
    path::{Path, PathBuf},
};
use zeroize::{Zeroize, Zeroizing};

use super::{derive_identity, generate_recovery_phrase, phrase_to_seed, Identity, IdentityError};

const SEED_FILE: &str = "identity.seed";
const SEED_FILE_MAGIC: &[u8] = b"SDNSEED1";
const SEED_SALT_LEN: usize = 16;
const SEED_NONCE_LEN: usize = 12;
const DEFAULT_PHRASE_WORDS: usize = 12;

const PBKDF2_ITERS_DEFAULT: u32 = 100_000;

fn passphrase() -> Option<String> {
    std::env::var("SDN_KEY_PASSPHRASE")
        .ok()
        .filter(|v| !v.trim().is_empty())
}

fn pbkdf2_iters() -> NonZeroU32 {
    let iters = std::env::var("SDN_PBKDF2_ITERS")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(PBKDF2_ITERS_DEFAULT)
        .clamp(10_000, 10_000_000);
    NonZeroU32::new(iters).unwrap_or_else(|| NonZeroU32::new(PBKDF2_ITERS_DEFAULT).expect("nonzero"))
}

/// A loaded (or freshly created) node identity.
pub struct StoredIdentity {
    /// The derived identity.
    pub identity: Identity,
    /// Set only when the seed was created this call; the phrase is shown to
    /// the operator exactly once and never persisted.
    pub fresh_phrase: Option<String>,
}

/// Load the identity from `data_dir/identity.seed`, or generate a new
/// recovery phrase and persist its seed.
pub fn load_or_create_identity(
    data_dir: impl AsRef<Path>,
    account: u32,
) -> Result<StoredIdentity, IdentityError> {
    let dir = data_dir.as_ref();
    fs::create_dir_all(dir).map_err(|_| IdentityError::Io)?;
    let path = dir.join(SEED_FILE);

    if path.exists() {
        let bytes = fs::read(&path).map_err(|_| IdentityError::Io)?;
        let seed = if bytes.starts_with(SEED_FILE_MAGIC) {
            let Some(pass) = passphrase() else {
                return Err(IdentityError::MissingPassphrase);
            };
            decrypt_seed(pass.as_bytes(), &bytes)?
        } else {
            if bytes.len() != 64 {
                return Err(IdentityError::Crypto);
            }
            Zeroizing::new(bytes)
        };
        let identity = derive_identity(&seed, account)?;
        return Ok(StoredIdentity {
            identity,
            fresh_phrase: None,
        });
    }

    let phrase = generate_recovery_phrase(DEFAULT_PHRASE_WORDS)?;
    let seed = phrase_to_seed(&phrase, "")?;
    persist_seed(&path, &seed[..])?;

    let identity = derive_identity(&seed[..], account)?;
    Ok(StoredIdentity {
        identity,
        fresh_phrase: Some(phrase),
    })
}

/// Write the seed to `path`, encrypted when a passphrase is configured.
pub fn persist_seed(path: &Path, seed: &[u8]) -> Result<(), IdentityError> {
    let on_disk = if let Some(pass) = passphrase() {
        encrypt_seed(pass.as_bytes(), seed)?
    } else {
        seed.to_vec()
    };
    let result = atomic_write_private(path, &on_disk);
    let mut on_disk = on_disk;
    on_disk.zeroize();
    result
}

fn set_private_perms_best_effort(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
    }
}

/// Atomic write to disk (best-effort fsync, then rename).
fn atomic_write_private(path: &Path, bytes: &[u8]) -> Result<(), IdentityError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|_| IdentityError::Io)?;
    }

    let mut tmp: PathBuf = path.to_path_buf();
    tmp.set_extension("tmp");

    {
        let mut f = fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&tmp)
            .map_err(|_| IdentityError::Io)?;
        f.write_all(bytes).map_err(|_| IdentityError::Io)?;
        let _ = f.sync_all();
    }

    set_private_perms_best_effort(&tmp);
    fs::rename(&tmp, path).map_err(|_| IdentityError::Io)?;
    set_private_perms_best_effort(path);
    Ok(())
}

fn derive_aes256gcm_key(
    pass: &[u8],
    salt: &[u8; SEED_SALT_LEN],
) -> Result<Zeroizing<[u8; 32]>, IdentityError> {
    let mut out = Zeroizing::new([0u8; 32]);
    pbkdf2::derive(pbkdf2::PBKDF2_HMAC_SHA256, pbkdf2_iters(), salt, pass, &mut *out);
    Ok(out)
}

fn encrypt_seed(pass: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, IdentityError> {
    let rng = SystemRandom::new();

    let mut salt = [0u8; SEED_SALT_LEN];
    rng.fill(&mut salt).map_err(|_| IdentityError::NoEntropy)?;

    let mut nonce_bytes = [0u8; SEED_NONCE_LEN];
    rng.fill(&mut nonce_bytes).map_err(|_| IdentityError::NoEntropy)?;
    let nonce = aead::Nonce::assume_unique_for_key(nonce_bytes);

    let key = derive_aes256gcm_key(pass, &salt)?;
    let unbound =
        aead::UnboundKey::new(&aead::AES_256_GCM, &*key).map_err(|_| IdentityError::Crypto)?;
    let less_safe = aead::LessSafeKey::new(unbound);

    let mut in_out = plaintext.to_vec();
    less_safe
        .seal_in_place_append_tag(nonce, aead::Aad::empty(), &mut in_out)
        .map_err(|_| IdentityError::Crypto)?;

    let mut out =
        Vec::with_capacity(SEED_FILE_MAGIC.len() + SEED_SALT_LEN + SEED_NONCE_LEN + in_out.len());
    out.extend_from_slice(SEED_FILE_MAGIC);
    out.extend_from_slice(&salt);
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&in_out);
    Ok(out)
}

fn decrypt_seed(pass: &[u8], bytes: &[u8]) -> Result<Zeroizing<Vec<u8>>, IdentityError> {
    let header = SEED_FILE_MAGIC.len() + SEED_SALT_LEN + SEED_NONCE_LEN;
    if bytes.len() < header + 16 {
        return Err(IdentityError::Crypto);
    }

    let mut salt = [0u8; SEED_SALT_LEN];
    salt.copy_from_slice(&bytes[SEED_FILE_MAGIC.len()..SEED_FILE_MAGIC.len() + SEED_SALT_LEN]);
    let mut nonce_bytes = [0u8; SEED_NONCE_LEN];
    nonce_bytes.copy_from_slice(&bytes[SEED_FILE_MAGIC.len() + SEED_SALT_LEN..header]);
    let nonce = aead::Nonce::assume_unique_for_key(nonce_bytes);

    let key = derive_aes256gcm_key(pass, &salt)?;
    let unbound =
        aead::UnboundKey::new(&aead::AES_256_GCM, &*key).map_err(|_| IdentityError::Crypto)?;
    let less_safe = aead::LessSafeKey::new(unbound);

    let mut in_out = bytes[header..].to_vec();
    let plain = less_safe
        .open_in_place(nonce, aead::Aad::empty(), &mut in_out)
        .map_err(|_| IdentityError::Crypto)?;
    if plain.len() != 64 {
        return Err(IdentityError::Crypto);
    }

    let out = Zeroizing::new(plain.to_vec());
    in_out.zeroize();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_reload_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let created = load_or_create_identity(dir.path(), 0).unwrap();
        assert!(created.fresh_phrase.is_some());

        let reloaded = load_or_create_identity(dir.path(), 0).unwrap();
        assert!(reloaded.fresh_phrase.is_none());
        assert_eq!(created.identity.peer_id, reloaded.identity.peer_id);
    }

    #[test]
    fn encrypt_round_trip() {
        let seed = [7u8; 64];
        let blob = encrypt_seed(b"pass", &seed).unwrap();
        assert!(blob.starts_with(SEED_FILE_MAGIC));
        let back = decrypt_seed(b"pass", &blob).unwrap();
        assert_eq!(&back[..], &seed[..]);
        assert!(decrypt_seed(b"wrong", &blob).is_err());
    }
}
