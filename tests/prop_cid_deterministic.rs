#![forbid(unsafe_code)]

use proptest::prelude::*;

use sdn_node::core::record::{encode_batch, split_batch, Cid};

proptest! {
    #[test]
    fn cid_is_deterministic(payload in proptest::collection::vec(any::<u8>(), 0..1024)) {
        let a = Cid::compute("OMM", &payload);
        let b = Cid::compute("OMM", &payload);
        prop_assert_eq!(a.as_str(), b.as_str());
        prop_assert_eq!(a.as_str().len(), 52);
    }

    #[test]
    fn schema_separates_identical_payloads(payload in proptest::collection::vec(any::<u8>(), 0..256)) {
        prop_assert_ne!(Cid::compute("OMM", &payload), Cid::compute("CDM", &payload));
    }

    #[test]
    fn batch_framing_round_trips(payloads in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..128), 0..8)) {
        let body = encode_batch(payloads.iter().map(Vec::as_slice));
        let parts = split_batch(&body, 1024).expect("split");
        let parts: Vec<Vec<u8>> = parts.into_iter().map(<[u8]>::to_vec).collect();
        prop_assert_eq!(parts, payloads);
    }

    #[test]
    fn batch_splitter_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
        let _ = split_batch(&bytes, 64);
    }
}
