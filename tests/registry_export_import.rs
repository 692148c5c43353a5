#![forbid(unsafe_code)]

use sdn_node::core::registry::{PeerGroup, TrustLevel, TrustRegistry, TrustedPeer};

fn seeded_registry() -> TrustRegistry {
    let reg = TrustRegistry::in_memory();
    reg.add_peer(TrustedPeer::new("12D3KooWAlpha", TrustLevel::Trusted))
        .expect("alpha");
    reg.add_peer(TrustedPeer::new("12D3KooWBeta", TrustLevel::Limited))
        .expect("beta");
    reg.add_group(
        PeerGroup {
            name: "observatories".into(),
            description: "ground stations".into(),
            default_trust_level: TrustLevel::Standard,
            peers: vec!["12D3KooWAlpha".into()],
        },
        TrustLevel::Admin,
    )
    .expect("group");
    reg
}

#[test]
fn export_import_replace_restores_identical_document() {
    let source = seeded_registry();
    let doc = source.export();

    let target = TrustRegistry::in_memory();
    target.import(doc.clone(), false).expect("import");
    assert_eq!(target.export(), doc);
}

#[test]
fn merge_import_is_idempotent() {
    let reg = seeded_registry();
    let doc = reg.export();

    reg.import(doc.clone(), true).expect("first merge");
    reg.import(doc.clone(), true).expect("second merge");
    assert_eq!(reg.export(), doc);
}

#[test]
fn import_reconciles_group_membership() {
    let doc = seeded_registry().export();
    let target = TrustRegistry::in_memory();
    target.import(doc, false).expect("import");

    let alpha = target.get_peer("12D3KooWAlpha").expect("alpha");
    assert_eq!(alpha.groups, vec!["observatories".to_string()]);
    let beta = target.get_peer("12D3KooWBeta").expect("beta");
    assert!(beta.groups.is_empty());
}

#[test]
fn trust_transitions_are_single_observable_changes() {
    let reg = seeded_registry();
    for level in TrustLevel::ALL {
        reg.set_trust_level("12D3KooWBeta", level).expect("set");
        assert_eq!(reg.trust_level_of("12D3KooWBeta"), level);
    }
}

#[test]
fn persisted_registry_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("registry.json");
    let doc;
    {
        let reg = TrustRegistry::open(&path).expect("open");
        reg.add_peer(TrustedPeer::new("12D3KooWAlpha", TrustLevel::Admin))
            .expect("add");
        reg.set_strict_mode(true).expect("strict");
        doc = reg.export();
    }
    let reg = TrustRegistry::open(&path).expect("reopen");
    assert_eq!(reg.export(), doc);
    assert!(reg.strict_mode());
    assert_eq!(reg.trust_level_of("12D3KooWAlpha"), TrustLevel::Admin);
}
