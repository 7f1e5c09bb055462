use std::collections::HashSet;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use atrium_codec::correlate::is_relevant;
use atrium_codec::frame::{decode_frame, encode_frame, Frame, MessageType};
use atrium_codec::request::Request;
use atrium_core::MessageId;
use atrium_transport::Wire;

use crate::backoff::backoff_delay;
use crate::engine::Client;
use crate::error::ClientError;

/// Floor for per-attempt receive timeouts in the collection window, so a
/// nearly expired TTL does not busy-wait.
const MIN_COLLECT_TIMEOUT: Duration = Duration::from_millis(100);

/// Dedup key for captured updates: the update's own header id and fragment
/// index (each update packet is independently identified).
type UpdateKey = (MessageId, u8);

impl<W: Wire> Client<W> {
    /// Subscribes to facility updates and collects them until `ttl` elapses.
    ///
    /// Returns the unique update frames sorted by (header id, fragment
    /// index). Fails when the liveness handshake exhausts its retry budget
    /// or the transport breaks.
    pub fn monitor(&mut self, facility: &str, ttl: Duration) -> Result<Vec<Frame>, ClientError> {
        let request = Request::FacilityMonitor {
            name: facility,
            ttl_seconds: ttl.as_secs() as u32,
        };
        let frame = Frame::request(request.encode()?);
        let bytes = encode_frame(&frame)?;
        self.run_monitor(frame.message_id, &bytes, ttl)
    }

    /// Runs the monitor flow for a pre-encoded subscription frame.
    pub fn monitor_raw(
        &mut self,
        frame_bytes: &[u8],
        ttl: Duration,
    ) -> Result<Vec<Frame>, ClientError> {
        let subscription_id = decode_frame(frame_bytes)?.message_id;
        self.run_monitor(subscription_id, frame_bytes, ttl)
    }

    fn run_monitor(
        &mut self,
        subscription_id: MessageId,
        request_bytes: &[u8],
        ttl: Duration,
    ) -> Result<Vec<Frame>, ClientError> {
        let deadline = Instant::now() + ttl;
        let mut seen: HashSet<UpdateKey> = HashSet::new();
        let mut collected: Vec<Frame> = Vec::new();
        let mut buf = vec![0_u8; self.config().recv_buffer_bytes];

        self.wire_mut().send(request_bytes)?;
        info!(id = %subscription_id, ttl_secs = ttl.as_secs(), "monitor subscription sent");

        self.await_liveness(
            subscription_id,
            request_bytes,
            &mut buf,
            &mut seen,
            &mut collected,
        )?;
        self.collect_updates(deadline, &mut buf, &mut seen, &mut collected)?;

        collected.sort_by_key(|frame| (frame.message_id, frame.packet_number));
        info!(id = %subscription_id, updates = collected.len(), "monitor ttl expired");
        Ok(collected)
    }

    /// Phase 1: resend with backoff until an ACK or RESPONSE correlated to
    /// the subscription proves the connection live. A matching RESPONSE
    /// doubles as the first captured update.
    fn await_liveness(
        &mut self,
        subscription_id: MessageId,
        request_bytes: &[u8],
        buf: &mut [u8],
        seen: &mut HashSet<UpdateKey>,
        collected: &mut Vec<Frame>,
    ) -> Result<(), ClientError> {
        let mut attempts: u32 = 0;
        loop {
            let attempt_timeout = self.config().attempt_timeout;
            match self.wire_mut().recv_timeout(buf, attempt_timeout)? {
                Some(len) => {
                    let frame = match decode_frame(&buf[..len]) {
                        Ok(frame) => frame,
                        Err(err) => {
                            debug!(%err, "discarding malformed datagram");
                            continue;
                        }
                    };
                    let relevant = is_relevant(&frame, subscription_id);
                    match frame.message_type {
                        MessageType::Ack if relevant => {
                            debug!(id = %subscription_id, "monitor connection live (ack)");
                            return Ok(());
                        }
                        MessageType::Response => {
                            self.send_courtesy_ack(&frame);
                            if relevant {
                                debug!(id = %subscription_id, "monitor connection live (first update)");
                                store_update(frame, seen, collected);
                                return Ok(());
                            }
                            debug!(
                                header_id = %frame.message_id,
                                "stale response during handshake, ack sent"
                            );
                        }
                        _ => {
                            debug!(
                                kind = ?frame.message_type,
                                "ignoring frame during monitor handshake"
                            );
                        }
                    }
                }
                None => {
                    attempts += 1;
                    let budget = self.config().max_retries;
                    if budget >= 0 && attempts > budget as u32 {
                        return Err(ClientError::MonitorHandshake { attempts });
                    }
                    thread::sleep(backoff_delay(attempts));
                    self.wire_mut().send(request_bytes)?;
                    debug!(id = %subscription_id, attempts, "monitor subscription resent");
                }
            }
        }
    }

    /// Phase 2: TTL-bounded collection. Every valid RESPONSE is courtesy-
    /// ACKed; unique updates are appended, everything else is ignored.
    fn collect_updates(
        &mut self,
        deadline: Instant,
        buf: &mut [u8],
        seen: &mut HashSet<UpdateKey>,
        collected: &mut Vec<Frame>,
    ) -> Result<(), ClientError> {
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            let remaining = deadline - now;
            let timeout = remaining
                .min(self.config().attempt_timeout)
                .max(MIN_COLLECT_TIMEOUT);

            match self.wire_mut().recv_timeout(buf, timeout)? {
                Some(len) => {
                    let frame = match decode_frame(&buf[..len]) {
                        Ok(frame) => frame,
                        Err(err) => {
                            debug!(%err, "discarding malformed datagram");
                            continue;
                        }
                    };
                    if frame.message_type == MessageType::Response {
                        self.send_courtesy_ack(&frame);
                        store_update(frame, seen, collected);
                    } else {
                        debug!(
                            kind = ?frame.message_type,
                            "ignoring non-response frame during collection"
                        );
                    }
                }
                None => debug!("monitor window quiet, waiting for updates"),
            }
        }
    }
}

/// Appends `frame` when its (header id, fragment index) key is new.
fn store_update(frame: Frame, seen: &mut HashSet<UpdateKey>, collected: &mut Vec<Frame>) {
    let key = (frame.message_id, frame.packet_number);
    if seen.insert(key) {
        debug!(
            header_id = %frame.message_id,
            fragment = frame.packet_number,
            "stored monitor update"
        );
        collected.push(frame);
    } else {
        debug!(
            header_id = %frame.message_id,
            fragment = frame.packet_number,
            "duplicate monitor update ignored"
        );
    }
}
