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

//! Generate a recovery phrase and print the derived identity.
//!
//! Usage: `keygen [words] [account]` (words in {12,15,18,21,24}).

use anyhow::{bail, Result};

use sdn_node::core::identity::{derive_identity, generate_recovery_phrase, phrase_to_seed};

fn main() -> Result<()> {
    let words: usize = std::env::args()
        .nth(1)
        .map(|v| v.parse())
        .transpose()?
        .unwrap_or(12);
    let account: u32 = std::env::args()
        .nth(2)
        .map(|v| v.parse())
        .transpose()?
        .unwrap_or(0);

    let Ok(phrase) = generate_recovery_phrase(words) else {
        bail!("unsupported word count {words} (use 12/15/18/21/24)");
    };
    let seed = match phrase_to_seed(&phrase, "") {
        Ok(seed) => seed,
        Err(e) => bail!("seed derivation failed: {e}"),
    };
    let identity = match derive_identity(&seed[..], account) {
        Ok(id) => id,
        Err(e) => bail!("identity derivation failed: {e}"),
    };

    println!("recovery phrase : {phrase}");
    println!("account         : {account}");
    println!("peer id         : {}", identity.peer_id.to_base58());
    println!("signing path    : {}", identity.paths.signing);
    println!("encryption path : {}", identity.paths.encryption);
    println!("bitcoin         : {}", identity.addresses.bitcoin);
    println!("ethereum        : {}", identity.addresses.ethereum);
    println!("solana          : {}", identity.addresses.solana);
    Ok(())
}
