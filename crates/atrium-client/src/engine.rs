use std::thread;

use tracing::{debug, warn};

use atrium_codec::correlate::is_relevant;
use atrium_codec::frame::{decode_frame, encode_frame, Frame, MessageType};
use atrium_codec::request::Request;
use atrium_core::MessageId;
use atrium_transport::Wire;

use crate::backoff::backoff_delay;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::exchange::{Absorbed, ExchangeOutcome, ExchangeState, TimeoutDisposition};

/// Reliable request/response client over one datagram wire.
///
/// One exchange at a time: every per-request field lives inside the call and
/// is dropped with it. Run one client (with its own bound wire) per
/// concurrent exchange. The wire is released when the client is dropped.
pub struct Client<W> {
    wire: W,
    config: ClientConfig,
}

/// Whether the receive loop should keep going after one frame.
enum Step {
    Continue,
    Complete,
}

impl<W> Client<W> {
    pub fn new(wire: W, config: ClientConfig) -> Self {
        Self { wire, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Consumes the client, handing back the underlying wire.
    pub fn into_wire(self) -> W {
        self.wire
    }
}

impl<W: Wire> Client<W> {
    /// Encodes `request` into a fresh REQUEST frame and runs one exchange.
    pub fn call(&mut self, request: &Request<'_>) -> Result<ExchangeOutcome, ClientError> {
        let frame = Frame::request(request.encode()?);
        let bytes = encode_frame(&frame)?;
        self.run_exchange(frame.message_id, &bytes)
    }

    /// Runs one exchange for a pre-encoded REQUEST frame.
    ///
    /// The frame is decoded first to learn its own id; failure there is
    /// fatal before any network activity.
    pub fn call_raw(&mut self, frame_bytes: &[u8]) -> Result<ExchangeOutcome, ClientError> {
        let request_id = decode_frame(frame_bytes)?.message_id;
        self.run_exchange(request_id, frame_bytes)
    }

    fn run_exchange(
        &mut self,
        request_id: MessageId,
        request_bytes: &[u8],
    ) -> Result<ExchangeOutcome, ClientError> {
        let mut state = ExchangeState::new(request_id);
        let mut buf = vec![0_u8; self.config.recv_buffer_bytes];

        self.wire.send(request_bytes)?;
        debug!(id = %request_id, bytes = request_bytes.len(), "request sent");

        loop {
            let received = match self.wire.recv_timeout(&mut buf, self.config.attempt_timeout)? {
                Some(len) => len,
                None => match state.note_timeout(&self.config) {
                    TimeoutDisposition::Finalize => {
                        debug!(id = %request_id, "retry budget exhausted, finalizing");
                        return Ok(state.finalize());
                    }
                    TimeoutDisposition::Retry { attempt, resend } => {
                        if resend {
                            self.wire.send(request_bytes)?;
                            debug!(id = %request_id, attempt, "request resent after timeout");
                        } else {
                            debug!(id = %request_id, attempt, "request acknowledged, awaiting response");
                        }
                        thread::sleep(backoff_delay(attempt));
                        continue;
                    }
                },
            };

            let frame = match decode_frame(&buf[..received]) {
                Ok(frame) => frame,
                Err(err) => {
                    debug!(%err, "discarding malformed datagram");
                    continue;
                }
            };

            if let Step::Complete = self.process_frame(&mut state, frame, request_bytes)? {
                return Ok(state.finalize());
            }
        }
    }

    fn process_frame(
        &mut self,
        state: &mut ExchangeState,
        frame: Frame,
        request_bytes: &[u8],
    ) -> Result<Step, ClientError> {
        // Every checksum-valid RESPONSE is acknowledged, relevant or not, to
        // stop the peer's own retry timer.
        if frame.message_type == MessageType::Response {
            self.send_courtesy_ack(&frame);
        }

        if !is_relevant(&frame, state.request_id()) {
            debug!(
                header_id = %frame.message_id,
                kind = ?frame.message_type,
                "stale frame dropped"
            );
            return Ok(Step::Continue);
        }

        match frame.message_type {
            MessageType::Ack => {
                if state.absorb_ack() == Absorbed::Acknowledged {
                    debug!(id = %state.request_id(), "request acknowledged");
                }
            }
            MessageType::Response => {
                if state.absorb_response(frame) == Absorbed::Completed {
                    debug!(id = %state.request_id(), "success response complete");
                    return Ok(Step::Complete);
                }
            }
            MessageType::RequestResend => {
                debug!(id = %state.request_id(), "peer requested a resend");
                self.wire.send(request_bytes)?;
            }
            // Never correlated; filtered above.
            MessageType::Error | MessageType::Request => {}
        }
        Ok(Step::Continue)
    }

    /// Best-effort ACK addressed at a received RESPONSE's own header id and
    /// fragment index.
    pub(crate) fn send_courtesy_ack(&mut self, response: &Frame) {
        let ack = Frame::ack(response.message_id, response.packet_number);
        match encode_frame(&ack) {
            Ok(bytes) => {
                if let Err(err) = self.wire.send(&bytes) {
                    warn!(target_id = %response.message_id, %err, "courtesy ack send failed");
                }
            }
            Err(err) => {
                warn!(target_id = %response.message_id, %err, "courtesy ack encode failed");
            }
        }
    }

    pub(crate) fn wire_mut(&mut self) -> &mut W {
        &mut self.wire
    }
}
