use atrium_core::MessageId;

use crate::frame::{Frame, MessageType};

/// Extracts the identifier that ties `frame` to an outstanding exchange.
///
/// ACK and RESPONSE packets carry a fresh id in their header and echo the
/// original request id as the first 16 payload bytes; REQUEST_RESEND reuses
/// the original id directly in its header. Other types never correlate.
/// Returns `None` when an ACK/RESPONSE payload is too short to carry the id.
pub fn relevant_id(frame: &Frame) -> Option<MessageId> {
    match frame.message_type {
        MessageType::Ack | MessageType::Response => MessageId::from_slice(&frame.payload),
        MessageType::RequestResend => Some(frame.message_id),
        MessageType::Error | MessageType::Request => None,
    }
}

/// Whether `frame` correlates to the exchange identified by `expected`.
pub fn is_relevant(frame: &Frame, expected: MessageId) -> bool {
    relevant_id(frame) == Some(expected)
}
