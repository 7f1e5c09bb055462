//! Reliability engine for the Atrium booking protocol.
//!
//! Drives one correlated request/response exchange (or a monitor
//! subscription) at a time over an unreliable datagram wire: retries with
//! jittered backoff, courtesy acknowledgements, multi-fragment reassembly,
//! and success/error arbitration.

pub mod backoff;
pub mod config;
pub mod engine;
pub mod error;
pub mod exchange;
mod monitor;

pub use config::ClientConfig;
pub use engine::Client;
pub use error::ClientError;
pub use exchange::{ExchangeOutcome, ExchangeState};
