#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Observability: prometheus metrics container.

pub mod metrics;
