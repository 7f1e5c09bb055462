use atrium_core::{MessageId, MAX_PACKET_BYTES, PROTOCOL_V1};

use crate::error::CodecError;

/// Fixed serialized header length in bytes.
pub const FRAME_HEADER_LEN: usize = 1 + 16 + 1 + 1 + 1 + 1 + 2;
/// Trailing CRC-32 field length in bytes.
pub const FRAME_CHECKSUM_LEN: usize = 4;
/// Maximum payload bytes one encoded frame may carry.
pub const MAX_PAYLOAD_BYTES: usize = MAX_PACKET_BYTES - FRAME_HEADER_LEN - FRAME_CHECKSUM_LEN;

/// Wire message type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Error = 0x01,
    Request = 0x02,
    Response = 0x03,
    Ack = 0x04,
    RequestResend = 0x05,
}

impl MessageType {
    /// Maps a wire code to a known type. Unknown codes are malformed.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::Error),
            0x02 => Some(Self::Request),
            0x03 => Some(Self::Response),
            0x04 => Some(Self::Ack),
            0x05 => Some(Self::RequestResend),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Header flag bitset: `ack_required` is bit 0, `fragment` bit 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameFlags(pub u8);

impl FrameFlags {
    pub const ACK_REQUIRED: u8 = 1 << 0;
    pub const FRAGMENT: u8 = 1 << 1;

    pub fn new(ack_required: bool, fragment: bool) -> Self {
        let mut bits = 0;
        if ack_required {
            bits |= Self::ACK_REQUIRED;
        }
        if fragment {
            bits |= Self::FRAGMENT;
        }
        Self(bits)
    }

    pub fn ack_required(self) -> bool {
        self.0 & Self::ACK_REQUIRED != 0
    }

    pub fn fragment(self) -> bool {
        self.0 & Self::FRAGMENT != 0
    }
}

/// One wire frame: header fields plus payload.
///
/// A decoded frame has already passed the checksum gate; the checksum itself
/// is recomputed on encode and never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub version: u8,
    pub message_id: MessageId,
    pub message_type: MessageType,
    pub packet_number: u8,
    pub total_packets: u8,
    pub flags: FrameFlags,
    pub payload: Vec<u8>,
}

impl Frame {
    /// Builds a single-packet REQUEST frame with a freshly generated id.
    pub fn request(payload: Vec<u8>) -> Self {
        Self::request_with_id(MessageId::generate(), payload)
    }

    /// REQUEST frame with an injected id, for deterministic construction.
    pub fn request_with_id(id: MessageId, payload: Vec<u8>) -> Self {
        Self {
            version: PROTOCOL_V1,
            message_id: id,
            message_type: MessageType::Request,
            packet_number: 0,
            total_packets: 1,
            flags: FrameFlags::new(true, false),
            payload,
        }
    }

    /// Builds an ACK addressed at one received packet: the 17-byte payload
    /// carries the target's header id and fragment index.
    pub fn ack(target: MessageId, target_fragment: u8) -> Self {
        Self::ack_with_id(MessageId::generate(), target, target_fragment)
    }

    /// ACK frame with an injected id, for deterministic construction.
    pub fn ack_with_id(id: MessageId, target: MessageId, target_fragment: u8) -> Self {
        let mut payload = Vec::with_capacity(MessageId::LEN + 1);
        payload.extend_from_slice(target.as_bytes());
        payload.push(target_fragment);
        Self {
            version: PROTOCOL_V1,
            message_id: id,
            message_type: MessageType::Ack,
            packet_number: 0,
            total_packets: 1,
            flags: FrameFlags::default(),
            payload,
        }
    }
}

/// Serializes `frame` into its fixed big-endian wire layout:
/// `[1: version][16: id][1: type][1: fragment idx][1: total][1: flags]
/// [2: payload len][payload][4: CRC-32 of everything before it]`.
pub fn encode_frame(frame: &Frame) -> Result<Vec<u8>, CodecError> {
    if frame.payload.len() > MAX_PAYLOAD_BYTES {
        return Err(CodecError::PayloadTooLarge(frame.payload.len()));
    }

    let total = FRAME_HEADER_LEN + frame.payload.len() + FRAME_CHECKSUM_LEN;
    let mut bytes = Vec::with_capacity(total);
    bytes.push(frame.version);
    bytes.extend_from_slice(frame.message_id.as_bytes());
    bytes.push(frame.message_type.code());
    bytes.push(frame.packet_number);
    bytes.push(frame.total_packets);
    bytes.push(frame.flags.0);
    bytes.extend_from_slice(&(frame.payload.len() as u16).to_be_bytes());
    bytes.extend_from_slice(&frame.payload);

    let checksum = crc32fast::hash(&bytes);
    bytes.extend_from_slice(&checksum.to_be_bytes());
    Ok(bytes)
}

/// Parses and validates one datagram.
///
/// The checksum is verified before any further interpretation; a frame that
/// fails any check here must be treated as never received.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, CodecError> {
    let min = FRAME_HEADER_LEN + FRAME_CHECKSUM_LEN;
    if bytes.len() < min {
        return Err(CodecError::Truncated {
            need: min,
            have: bytes.len(),
        });
    }

    let payload_len = u16::from_be_bytes([bytes[21], bytes[22]]) as usize;
    let declared = FRAME_HEADER_LEN + payload_len + FRAME_CHECKSUM_LEN;
    if bytes.len() < declared {
        return Err(CodecError::Truncated {
            need: declared,
            have: bytes.len(),
        });
    }
    if bytes.len() > declared {
        return Err(CodecError::LengthMismatch {
            declared,
            have: bytes.len(),
        });
    }

    let body_end = FRAME_HEADER_LEN + payload_len;
    let carried = u32::from_be_bytes([
        bytes[body_end],
        bytes[body_end + 1],
        bytes[body_end + 2],
        bytes[body_end + 3],
    ]);
    let computed = crc32fast::hash(&bytes[..body_end]);
    if carried != computed {
        return Err(CodecError::ChecksumMismatch { carried, computed });
    }

    let message_type =
        MessageType::from_code(bytes[17]).ok_or(CodecError::UnknownMessageType(bytes[17]))?;
    let mut id = [0_u8; MessageId::LEN];
    id.copy_from_slice(&bytes[1..17]);

    Ok(Frame {
        version: bytes[0],
        message_id: MessageId(id),
        message_type,
        packet_number: bytes[18],
        total_packets: bytes[19],
        flags: FrameFlags(bytes[20]),
        payload: bytes[FRAME_HEADER_LEN..body_end].to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::{
        decode_frame, encode_frame, Frame, FrameFlags, MessageType, FRAME_CHECKSUM_LEN,
        FRAME_HEADER_LEN, MAX_PAYLOAD_BYTES,
    };
    use crate::error::CodecError;
    use atrium_core::{MessageId, PROTOCOL_V1};

    fn sample_frame() -> Frame {
        Frame {
            version: PROTOCOL_V1,
            message_id: MessageId([0x42; 16]),
            message_type: MessageType::Response,
            packet_number: 3,
            total_packets: 5,
            flags: FrameFlags::new(true, true),
            payload: vec![0xDE, 0xAD, 0xBE, 0xEF],
        }
    }

    #[test]
    fn round_trip_preserves_every_field() {
        let frame = sample_frame();
        let bytes = encode_frame(&frame).expect("frame should encode");
        assert_eq!(
            bytes.len(),
            FRAME_HEADER_LEN + frame.payload.len() + FRAME_CHECKSUM_LEN
        );
        let decoded = decode_frame(&bytes).expect("frame should decode");
        assert_eq!(decoded, frame);
    }

    #[test]
    fn request_constructor_sets_ack_required_single_packet() {
        let frame = Frame::request(vec![0x01, 0x02]);
        assert_eq!(frame.message_type, MessageType::Request);
        assert_eq!(frame.packet_number, 0);
        assert_eq!(frame.total_packets, 1);
        assert!(frame.flags.ack_required());
        assert!(!frame.flags.fragment());
    }

    #[test]
    fn ack_constructor_embeds_target_id_and_fragment() {
        let target = MessageId([0x77; 16]);
        let frame = Frame::ack(target, 9);
        assert_eq!(frame.message_type, MessageType::Ack);
        assert_eq!(frame.payload.len(), 17);
        assert_eq!(&frame.payload[..16], target.as_bytes());
        assert_eq!(frame.payload[16], 9);
    }

    #[test]
    fn decode_rejects_short_buffer() {
        let err = decode_frame(&[0x01; 10]).expect_err("short buffer should fail");
        assert!(matches!(err, CodecError::Truncated { .. }));
    }

    #[test]
    fn decode_rejects_truncated_payload() {
        let mut bytes = encode_frame(&sample_frame()).expect("frame should encode");
        bytes.truncate(bytes.len() - 3);
        let err = decode_frame(&bytes).expect_err("truncated payload should fail");
        assert!(matches!(err, CodecError::Truncated { .. }));
    }

    #[test]
    fn decode_rejects_trailing_garbage() {
        let mut bytes = encode_frame(&sample_frame()).expect("frame should encode");
        bytes.push(0x00);
        let err = decode_frame(&bytes).expect_err("oversized buffer should fail");
        assert!(matches!(err, CodecError::LengthMismatch { .. }));
    }

    #[test]
    fn decode_rejects_unknown_type_code() {
        let mut frame = sample_frame();
        frame.payload.clear();
        let mut bytes = encode_frame(&frame).expect("frame should encode");
        // Patch the type byte and refresh the checksum so only the type is bad.
        bytes[17] = 0x7F;
        let body_end = bytes.len() - FRAME_CHECKSUM_LEN;
        let checksum = crc32fast::hash(&bytes[..body_end]);
        bytes[body_end..].copy_from_slice(&checksum.to_be_bytes());
        let err = decode_frame(&bytes).expect_err("unknown type should fail");
        assert_eq!(err, CodecError::UnknownMessageType(0x7F));
    }

    #[test]
    fn decode_rejects_corrupted_payload_byte() {
        let mut bytes = encode_frame(&sample_frame()).expect("frame should encode");
        let idx = FRAME_HEADER_LEN + 1;
        bytes[idx] ^= 0x01;
        let err = decode_frame(&bytes).expect_err("corruption should fail");
        assert!(matches!(err, CodecError::ChecksumMismatch { .. }));
    }

    #[test]
    fn encode_rejects_oversized_payload() {
        let mut frame = sample_frame();
        frame.payload = vec![0x00; MAX_PAYLOAD_BYTES + 1];
        let err = encode_frame(&frame).expect_err("oversized payload should fail");
        assert_eq!(err, CodecError::PayloadTooLarge(MAX_PAYLOAD_BYTES + 1));
    }

    #[test]
    fn flags_round_trip_bits() {
        assert!(FrameFlags::new(true, false).ack_required());
        assert!(!FrameFlags::new(true, false).fragment());
        assert!(FrameFlags::new(false, true).fragment());
        assert_eq!(FrameFlags::new(true, true).0, 0b11);
        assert_eq!(FrameFlags::default().0, 0);
    }

    #[test]
    fn message_type_codes_are_stable() {
        for (code, kind) in [
            (0x01, MessageType::Error),
            (0x02, MessageType::Request),
            (0x03, MessageType::Response),
            (0x04, MessageType::Ack),
            (0x05, MessageType::RequestResend),
        ] {
            assert_eq!(MessageType::from_code(code), Some(kind));
            assert_eq!(kind.code(), code);
        }
        assert_eq!(MessageType::from_code(0x00), None);
        assert_eq!(MessageType::from_code(0x06), None);
    }
}
