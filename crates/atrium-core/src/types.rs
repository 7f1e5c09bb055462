use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Wire protocol version carried by every frame.
pub const PROTOCOL_V1: u8 = 0x01;

/// Hard limit for one encoded frame (header + payload + checksum).
pub const MAX_PACKET_BYTES: usize = 1024;

/// 16-byte wire message identifier.
///
/// Every request carries a freshly generated id in its header. Responses and
/// acknowledgements carry their own header id and echo the originating
/// request id in their payload instead.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(pub [u8; 16]);

impl MessageId {
    /// Serialized identifier length in bytes.
    pub const LEN: usize = 16;

    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        let mut bytes = [0_u8; Self::LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Reads an identifier from the first 16 bytes of `bytes`, if present.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let head = bytes.get(..Self::LEN)?;
        let mut id = [0_u8; Self::LEN];
        id.copy_from_slice(head);
        Some(Self(id))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({})", hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::MessageId;

    #[test]
    fn generate_produces_distinct_ids() {
        let a = MessageId::generate();
        let b = MessageId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn from_slice_reads_leading_bytes_only() {
        let mut bytes = vec![0x0A_u8; 16];
        bytes.extend_from_slice(&[0xFF, 0xFF]);
        let id = MessageId::from_slice(&bytes).expect("16 bytes should parse");
        assert_eq!(id, MessageId([0x0A; 16]));
    }

    #[test]
    fn from_slice_rejects_short_input() {
        assert!(MessageId::from_slice(&[0x01; 15]).is_none());
        assert!(MessageId::from_slice(&[]).is_none());
    }

    #[test]
    fn display_renders_lowercase_hex() {
        let id = MessageId([0xAB; 16]);
        assert_eq!(id.to_string(), "ab".repeat(16));
    }
}
