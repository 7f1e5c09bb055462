//! Core Atrium primitives shared across crates.
//!
//! Fixed-size identifier types and protocol-wide constants.

pub mod types;

pub use types::{MessageId, MAX_PACKET_BYTES, PROTOCOL_V1};
