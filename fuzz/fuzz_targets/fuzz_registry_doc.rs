#![no_main]

use libfuzzer_sys::fuzz_target;
use sdn_node::core::registry::{RegistryDocument, TrustRegistry};

fuzz_target!(|data: &[u8]| {
    // The import path takes operator-supplied JSON documents.
    if let Ok(doc) = serde_json::from_slice::<RegistryDocument>(data) {
        let reg = TrustRegistry::in_memory();
        let _ = reg.import(doc, true);
    }
});
