#![no_main]

use libfuzzer_sys::fuzz_target;
use sdn_node::core::routing::RoutingHeader;

fuzz_target!(|data: &[u8]| {
    // Decoding untrusted overlay bytes must never panic; valid headers must
    // survive a re-encode.
    if let Ok((header, payload)) = RoutingHeader::decode_message(data) {
        let _ = header.encode_message(payload);
    }
});
