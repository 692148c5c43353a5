#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Networking: libp2p transport, gossip overlay, profile exchange.

pub mod p2p;
pub mod profile;
