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

//! Filterable publish/subscribe layer.

pub mod filter;
mod manager;
mod types;

pub use filter::{all_match, filter_matches};
pub use manager::{Delivery, Handler, SubscriptionError, SubscriptionManager};
pub use types::{
    Filter, FilterOp, Subscription, SubscriptionConfig, SubscriptionStatus, SOURCE_WILDCARD,
};
