use thiserror::Error;

/// Errors returned by frame codec and payload builder operations.
///
/// Decode-side variants are non-fatal to receive loops: a datagram that fails
/// here is treated as never received.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// Buffer shorter than the fixed header or the declared lengths.
    #[error("truncated frame: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },
    /// Buffer longer than the declared payload length accounts for.
    #[error("frame length mismatch: declared {declared} bytes, have {have}")]
    LengthMismatch { declared: usize, have: usize },
    /// Recomputed CRC-32 disagrees with the trailing checksum field.
    #[error("checksum mismatch: frame carries {carried:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { carried: u32, computed: u32 },
    /// Unrecognized message type code.
    #[error("unknown message type {0:#04x}")]
    UnknownMessageType(u8),
    /// Payload does not fit the u16 length field and datagram budget.
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),
    /// Request field does not fit its wire encoding.
    #[error("invalid request field: {0}")]
    InvalidRequest(&'static str),
}
