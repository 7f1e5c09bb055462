//! Wire codec and correlation rules for the Atrium booking protocol.
//!
//! Pure and stateless: frame marshalling with CRC-32 integrity, request
//! payload builders for every protocol method, the response payload view,
//! and the per-type identity rules that tie inbound packets back to the
//! request they answer.

pub mod correlate;
pub mod error;
pub mod frame;
pub mod request;
pub mod response;

pub use error::CodecError;
pub use frame::{
    decode_frame, encode_frame, Frame, FrameFlags, MessageType, FRAME_CHECKSUM_LEN,
    FRAME_HEADER_LEN, MAX_PAYLOAD_BYTES,
};
