#![forbid(unsafe_code)]

use proptest::prelude::*;

use sdn_node::core::routing::{EncryptionMode, RoutingHeader};

fn encryption_mode() -> impl Strategy<Value = EncryptionMode> {
    prop_oneof![
        Just(EncryptionMode::None),
        Just(EncryptionMode::SessionKey),
        Just(EncryptionMode::PeerToPeer),
    ]
}

fn header_strategy() -> impl Strategy<Value = RoutingHeader> {
    (
        "[A-Z0-9]{1,12}",
        proptest::collection::vec("[1-9A-HJ-NP-Za-km-z]{1,52}", 0..4),
        any::<u8>(),
        any::<u8>(),
        any::<bool>(),
        encryption_mode(),
        proptest::option::of("[a-z0-9-]{1,32}"),
        "[1-9A-HJ-NP-Za-km-z]{1,52}",
        any::<u64>(),
        any::<u64>(),
        proptest::option::of("/[a-z/]{1,40}"),
        proptest::option::of(proptest::collection::vec(any::<u8>(), 0..96)),
    )
        .prop_map(
            |(
                schema,
                destinations,
                ttl,
                priority,
                encrypted,
                encryption_mode,
                session_key_id,
                source,
                sequence,
                timestamp_ms,
                topic_override,
                signature,
            )| RoutingHeader {
                schema,
                destinations,
                ttl,
                priority,
                encrypted,
                encryption_mode,
                session_key_id,
                source,
                sequence,
                timestamp_ms,
                topic_override,
                signature,
            },
        )
}

proptest! {
    #[test]
    fn header_round_trips(header in header_strategy(), payload in proptest::collection::vec(any::<u8>(), 0..256)) {
        let wire = header.encode_message(&payload).expect("encode");
        let (decoded, rest) = RoutingHeader::decode_message(&wire).expect("decode");
        prop_assert_eq!(decoded, header);
        prop_assert_eq!(rest, payload.as_slice());
    }

    #[test]
    fn decoder_never_panics_on_noise(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
        let _ = RoutingHeader::decode_message(&bytes);
    }

    #[test]
    fn truncations_fail_cleanly(header in header_strategy()) {
        let wire = header.encode_message(b"xyz").expect("encode");
        for cut in 0..wire.len().min(40) {
            let _ = RoutingHeader::decode_message(&wire[..cut]);
        }
    }
}
