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
#![warn(missing_docs)]

//! Trusted peer registry and connection gate.

mod gate;
mod registry;
mod types;

pub use gate::{ConnectionGate, GateError, Verdict};
pub use registry::{RegistryError, TrustRegistry};
pub use types::{PeerCounters, PeerGroup, RegistryDocument, RegistrySettings, TrustLevel, TrustedPeer};
