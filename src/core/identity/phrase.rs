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

//! Recovery-phrase operations (BIP-39, English wordlist).

use bip39::{Language, Mnemonic, MnemonicType, Seed};
use zeroize::Zeroizing;

use super::IdentityError;

/// Generate a fresh recovery phrase of `words` words (12/15/18/21/24).
pub fn generate_recovery_phrase(words: usize) -> Result<String, IdentityError> {
    let mtype = MnemonicType::for_word_count(words).map_err(|_| IdentityError::InvalidPhrase)?;
    let mnemonic = Mnemonic::new(mtype, Language::English);
    Ok(mnemonic.into_phrase())
}

/// Build a phrase from externally supplied entropy (deterministic testing,
/// hardware RNG pass-through). Entropy length must match a supported word
/// count (16/20/24/28/32 bytes).
pub fn phrase_from_entropy(entropy: &[u8]) -> Result<String, IdentityError> {
    let mnemonic =
        Mnemonic::from_entropy(entropy, Language::English).map_err(|_| IdentityError::NoEntropy)?;
    Ok(mnemonic.into_phrase())
}

/// Check a phrase against the wordlist and checksum.
pub fn validate_recovery_phrase(phrase: &str) -> bool {
    Mnemonic::validate(phrase, Language::English).is_ok()
}

/// Stretch a phrase (plus optional passphrase) into the 64-byte master seed.
pub fn phrase_to_seed(phrase: &str, passphrase: &str) -> Result<Zeroizing<[u8; 64]>, IdentityError> {
    let mnemonic =
        Mnemonic::from_phrase(phrase, Language::English).map_err(|_| IdentityError::InvalidPhrase)?;
    let seed = Seed::new(&mnemonic, passphrase);
    let mut out = Zeroizing::new([0u8; 64]);
    out.copy_from_slice(seed.as_bytes());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Reference phrase from the BIP-39 English test vectors.
    const ABANDON: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn generates_supported_word_counts() {
        for words in [12, 15, 18, 21, 24] {
            let phrase = generate_recovery_phrase(words).unwrap();
            assert_eq!(phrase.split_whitespace().count(), words);
            assert!(validate_recovery_phrase(&phrase));
        }
    }

    #[test]
    fn rejects_unsupported_word_count() {
        assert!(generate_recovery_phrase(13).is_err());
        assert!(generate_recovery_phrase(0).is_err());
    }

    #[test]
    fn rejects_bad_phrase() {
        assert!(!validate_recovery_phrase(""));
        assert!(!validate_recovery_phrase("notaword notaword notaword"));
        // Valid words, broken checksum.
        assert!(!validate_recovery_phrase(
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon"
        ));
    }

    #[test]
    fn seed_matches_reference_vector() {
        let seed = phrase_to_seed(ABANDON, "TREZOR").unwrap();
        assert_eq!(
            hex::encode(&seed[..]),
            "c55257c360c07c72029aebc1b53c05ed0362ada38ead3e3e9efa3708e53495531f09a6987599d18264c1e1c92f2cf141630c7a3c4ab7c81b2f001698e7463b04"
        );
    }

    #[test]
    fn entropy_is_deterministic() {
        let a = phrase_from_entropy(&[0u8; 16]).unwrap();
        let b = phrase_from_entropy(&[0u8; 16]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, ABANDON);
        assert!(phrase_from_entropy(&[0u8; 15]).is_err());
    }
}
