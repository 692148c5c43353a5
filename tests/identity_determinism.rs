#![forbid(unsafe_code)]

use sdn_node::core::identity::{
    derive_identity, generate_recovery_phrase, phrase_from_entropy, phrase_to_seed,
    validate_recovery_phrase,
};

const ABANDON: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

#[test]
fn fixed_phrase_yields_fixed_peer_id() {
    let seed = phrase_to_seed(ABANDON, "").expect("seed");
    let first = derive_identity(&seed[..], 0).expect("derive");
    let second = derive_identity(&seed[..], 0).expect("derive");
    assert_eq!(first.peer_id, second.peer_id);

    // The whole identity is reproducible, not just the peer id.
    assert_eq!(first.addresses, second.addresses);
    assert_eq!(first.paths.signing, "m/44'/1957'/0'/0'/0'");
    assert_eq!(first.paths.encryption, "m/44'/1957'/0'/1'/0'");
}

#[test]
fn account_one_is_a_different_identity() {
    let seed = phrase_to_seed(ABANDON, "").expect("seed");
    let account0 = derive_identity(&seed[..], 0).expect("derive");
    let account1 = derive_identity(&seed[..], 1).expect("derive");
    assert_ne!(account0.peer_id, account1.peer_id);
    assert_eq!(account1.paths.signing, "m/44'/1957'/1'/0'/0'");
}

#[test]
fn passphrase_changes_the_identity() {
    let plain = phrase_to_seed(ABANDON, "").expect("seed");
    let salted = phrase_to_seed(ABANDON, "orbital").expect("seed");
    let a = derive_identity(&plain[..], 0).expect("derive");
    let b = derive_identity(&salted[..], 0).expect("derive");
    assert_ne!(a.peer_id, b.peer_id);
}

#[test]
fn generated_phrases_validate_and_differ() {
    let a = generate_recovery_phrase(24).expect("generate");
    let b = generate_recovery_phrase(24).expect("generate");
    assert!(validate_recovery_phrase(&a));
    assert!(validate_recovery_phrase(&b));
    assert_ne!(a, b);
}

#[test]
fn boundary_phrases_are_rejected() {
    assert!(!validate_recovery_phrase(""));
    assert!(!validate_recovery_phrase("zebra zebra zebra"));
    assert!(phrase_to_seed("", "").is_err());
    assert!(phrase_to_seed("not a phrase at all", "").is_err());
}

#[test]
fn external_entropy_reproduces_the_reference_phrase() {
    let phrase = phrase_from_entropy(&[0u8; 16]).expect("entropy");
    assert_eq!(phrase, ABANDON);
}
