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

//! Routing fabric: wire header, topic derivation, relay forwarding.

pub mod header;
mod router;
pub mod topics;

pub use header::{EncryptionMode, HeaderError, RoutingHeader, DEFAULT_TTL, MAX_HEADER_BYTES};
pub use router::{OutboundMessage, PublishOptions, Router, RouterConfig, RouterError};
pub use topics::{data_topic, derive_topic, legacy_topic, peer_topic, strip_extension, TopicMatcher};
