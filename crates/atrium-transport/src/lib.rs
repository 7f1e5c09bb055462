//! Datagram transport seam for the Atrium client engine.
//!
//! One blocking send/receive-with-timeout contract, a UDP implementation
//! over `std::net`, and a scripted in-memory wire for tests.

pub mod adapter;
pub mod udp;

pub use adapter::{MemoryWire, Wire};
pub use udp::UdpWire;
