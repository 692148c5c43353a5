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

//! Content-addressed record store: CIDs, schema catalogue, sled-backed
//! blob/index/ledger storage, batch publishing, conditional-read metadata.

pub mod batch;
pub mod cid;
pub mod conditional;
pub mod schema;
pub mod store;

pub use batch::{encode_batch, publish_batch, split_batch, BatchError, BatchOutcome};
pub use cid::{Cid, CidError};
pub use conditional::{conditional_meta, http_date, ConditionalMeta};
pub use store::{IndexQuery, Record, RecordStore, StoreConfig, StoreError};
