use thiserror::Error;

use atrium_codec::CodecError;

/// Fatal failures that abort an exchange or monitor call.
///
/// Per-attempt timeouts and retry-budget exhaustion are not errors; they
/// surface through `ExchangeOutcome` instead.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network-layer send/receive failure other than a timeout.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
    /// The outgoing request could not be encoded, or its frame could not be
    /// decoded to learn its own id.
    #[error("outgoing request rejected: {0}")]
    Codec(#[from] CodecError),
    /// The monitor liveness handshake exhausted its retry budget.
    #[error("monitor handshake got no answer after {attempts} attempts")]
    MonitorHandshake { attempts: u32 },
}

#[cfg(test)]
mod tests {
    use super::ClientError;
    use atrium_codec::CodecError;

    #[test]
    fn error_messages_are_stable() {
        let err = ClientError::MonitorHandshake { attempts: 4 };
        assert_eq!(
            err.to_string(),
            "monitor handshake got no answer after 4 attempts"
        );

        let err = ClientError::from(CodecError::UnknownMessageType(0x7F));
        assert_eq!(
            err.to_string(),
            "outgoing request rejected: unknown message type 0x7f"
        );
    }
}
