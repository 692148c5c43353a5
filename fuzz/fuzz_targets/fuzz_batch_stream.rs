#![no_main]

use libfuzzer_sys::fuzz_target;
use sdn_node::core::record::split_batch;

fuzz_target!(|data: &[u8]| {
    let _ = split_batch(data, 4096);
});
