use atrium_core::MessageId;

use crate::frame::{Frame, MessageType};

/// Status code echoed by the server on success.
pub const STATUS_OK: u16 = 200;
/// Fixed response payload prefix: 16-byte original request id + 2-byte status.
pub const RESPONSE_PREFIX_LEN: usize = MessageId::LEN + 2;

/// Borrowed view over a RESPONSE payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseView<'a> {
    /// Request id echoed by the server.
    pub original_id: MessageId,
    /// 200 = success; anything else is an application error.
    pub status: u16,
    /// Method result bytes, or UTF-8 error text on non-200 statuses.
    pub body: &'a [u8],
}

impl ResponseView<'_> {
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }

    /// Renders the body as error text for non-200 responses.
    pub fn error_text(&self) -> Option<String> {
        if self.is_ok() || self.body.is_empty() {
            return None;
        }
        Some(String::from_utf8_lossy(self.body).into_owned())
    }
}

/// Parses the fixed prefix out of a RESPONSE payload.
///
/// Returns `None` when the payload is shorter than the 18-byte prefix.
pub fn parse_response_payload(payload: &[u8]) -> Option<ResponseView<'_>> {
    if payload.len() < RESPONSE_PREFIX_LEN {
        return None;
    }
    let original_id = MessageId::from_slice(payload)?;
    let status = u16::from_be_bytes([payload[16], payload[17]]);
    Some(ResponseView {
        original_id,
        status,
        body: &payload[RESPONSE_PREFIX_LEN..],
    })
}

/// Status carried by a RESPONSE payload.
///
/// Payloads shorter than the fixed prefix carry no explicit status field and
/// read as success, matching the server's default.
pub fn response_status(payload: &[u8]) -> u16 {
    parse_response_payload(payload).map_or(STATUS_OK, |view| view.status)
}

/// Parses the payload view of a frame, if it is a RESPONSE.
pub fn response_view(frame: &Frame) -> Option<ResponseView<'_>> {
    if frame.message_type != MessageType::Response {
        return None;
    }
    parse_response_payload(&frame.payload)
}
