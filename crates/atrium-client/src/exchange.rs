use std::collections::BTreeMap;

use tracing::{debug, warn};

use atrium_codec::frame::Frame;
use atrium_codec::response::{response_status, STATUS_OK};
use atrium_core::MessageId;

use crate::config::ClientConfig;

/// Terminal result of one exchange, in arbitration order: complete success
/// wins, else the stored error, else any partial success, else empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// Every expected fragment arrived; ordered by fragment index.
    Complete(Vec<Frame>),
    /// The server answered with a non-200 status and no success fragment
    /// ever superseded it.
    ServerError(Frame),
    /// The retry budget ran out with an incomplete fragment set, ordered by
    /// fragment index.
    Partial(Vec<Frame>),
    /// Nothing relevant arrived before the budget ran out.
    Empty,
}

/// What absorbing one relevant frame did to the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Absorbed {
    /// The outstanding request is now acknowledged server-side.
    Acknowledged,
    /// Duplicate ACK; no state change.
    DuplicateAck,
    /// Success fragment stored; more are still expected.
    FragmentStored,
    /// Duplicate fragment index; first write wins.
    DuplicateFragment,
    /// The success set became complete.
    Completed,
    /// First error recorded; the grace window starts.
    ErrorRecorded,
    /// Error dropped: success already seen, or an error is already stored.
    ErrorIgnored,
}

/// What the engine must do after a receive timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutDisposition {
    /// A budget is exhausted; arbitrate and return.
    Finalize,
    /// Back off and keep listening, resending the request first while it is
    /// unacknowledged.
    Retry { attempt: u32, resend: bool },
}

/// Mutable state for one outstanding request.
///
/// Constructed fresh per call and consumed by finalization; nothing survives
/// between exchanges.
#[derive(Debug)]
pub struct ExchangeState {
    request_id: MessageId,
    acknowledged: bool,
    fragments: BTreeMap<u8, Frame>,
    expected_fragments: Option<u8>,
    first_error: Option<Frame>,
    timeouts: u32,
    timeouts_since_error: u32,
}

impl ExchangeState {
    pub fn new(request_id: MessageId) -> Self {
        Self {
            request_id,
            acknowledged: false,
            fragments: BTreeMap::new(),
            expected_fragments: None,
            first_error: None,
            timeouts: 0,
            timeouts_since_error: 0,
        }
    }

    pub fn request_id(&self) -> MessageId {
        self.request_id
    }

    pub fn acknowledged(&self) -> bool {
        self.acknowledged
    }

    /// Marks the outstanding request as acknowledged. Idempotent.
    pub fn absorb_ack(&mut self) -> Absorbed {
        if self.acknowledged {
            debug!(id = %self.request_id, "duplicate ack ignored");
            return Absorbed::DuplicateAck;
        }
        self.acknowledged = true;
        Absorbed::Acknowledged
    }

    /// Folds one relevant RESPONSE frame into the exchange.
    pub fn absorb_response(&mut self, frame: Frame) -> Absorbed {
        if response_status(&frame.payload) == STATUS_OK {
            self.absorb_success(frame)
        } else {
            self.absorb_error(frame)
        }
    }

    fn absorb_success(&mut self, frame: Frame) -> Absorbed {
        let index = frame.packet_number;
        let total = frame.total_packets;

        let stored = if self.fragments.contains_key(&index) {
            debug!(id = %self.request_id, fragment = index, "duplicate success fragment ignored");
            Absorbed::DuplicateFragment
        } else {
            self.fragments.insert(index, frame);
            match self.expected_fragments {
                Some(expected) if expected != total => {
                    warn!(
                        id = %self.request_id,
                        from = expected,
                        to = total,
                        "expected fragment count changed mid-exchange"
                    );
                    self.expected_fragments = Some(total);
                }
                None => self.expected_fragments = Some(total),
                Some(_) => {}
            }
            if self.is_complete() {
                Absorbed::Completed
            } else {
                Absorbed::FragmentStored
            }
        };

        // A success always supersedes a stale error for the same exchange.
        if self.first_error.take().is_some() {
            debug!(id = %self.request_id, "success fragment supersedes stored error");
            self.timeouts_since_error = 0;
        }
        stored
    }

    fn absorb_error(&mut self, frame: Frame) -> Absorbed {
        if !self.fragments.is_empty() {
            debug!(
                id = %self.request_id,
                status = response_status(&frame.payload),
                "error response ignored, success fragments already stored"
            );
            return Absorbed::ErrorIgnored;
        }
        if self.first_error.is_some() {
            debug!(
                id = %self.request_id,
                status = response_status(&frame.payload),
                "error response ignored, first error already stored"
            );
            return Absorbed::ErrorIgnored;
        }
        if frame.total_packets != 1 {
            warn!(
                id = %self.request_id,
                total = frame.total_packets,
                "multi-packet error response treated as a single error"
            );
        }
        self.first_error = Some(frame);
        self.timeouts_since_error = 0;
        Absorbed::ErrorRecorded
    }

    /// Records one receive timeout and decides the engine's next move.
    pub fn note_timeout(&mut self, config: &ClientConfig) -> TimeoutDisposition {
        self.timeouts += 1;
        if self.first_error.is_some() {
            self.timeouts_since_error += 1;
            if config.grace_budget_exhausted(self.timeouts_since_error) {
                return TimeoutDisposition::Finalize;
            }
        }
        if config.overall_budget_exhausted(self.timeouts) {
            return TimeoutDisposition::Finalize;
        }
        TimeoutDisposition::Retry {
            attempt: self.timeouts,
            resend: !self.acknowledged,
        }
    }

    fn is_complete(&self) -> bool {
        self.expected_fragments
            .is_some_and(|expected| expected > 0 && self.fragments.len() == expected as usize)
    }

    /// Arbitrates the terminal result.
    pub fn finalize(self) -> ExchangeOutcome {
        let complete = self.is_complete();
        let Self {
            fragments,
            first_error,
            ..
        } = self;
        if complete {
            return ExchangeOutcome::Complete(fragments.into_values().collect());
        }
        if let Some(error) = first_error {
            return ExchangeOutcome::ServerError(error);
        }
        if !fragments.is_empty() {
            return ExchangeOutcome::Partial(fragments.into_values().collect());
        }
        ExchangeOutcome::Empty
    }
}

#[cfg(test)]
mod tests {
    use super::{Absorbed, ExchangeOutcome, ExchangeState, TimeoutDisposition};
    use crate::config::ClientConfig;
    use atrium_codec::frame::{Frame, FrameFlags, MessageType};
    use atrium_core::{MessageId, PROTOCOL_V1};

    fn request_id() -> MessageId {
        MessageId([0x11; 16])
    }

    fn response(status: u16, index: u8, total: u8) -> Frame {
        let mut payload = request_id().as_bytes().to_vec();
        payload.extend_from_slice(&status.to_be_bytes());
        payload.push(index);
        Frame {
            version: PROTOCOL_V1,
            message_id: MessageId::generate(),
            message_type: MessageType::Response,
            packet_number: index,
            total_packets: total,
            flags: FrameFlags::default(),
            payload,
        }
    }

    #[test]
    fn completes_only_with_every_fragment_index() {
        let mut state = ExchangeState::new(request_id());
        assert_eq!(state.absorb_response(response(200, 0, 3)), Absorbed::FragmentStored);
        assert_eq!(state.absorb_response(response(200, 2, 3)), Absorbed::FragmentStored);
        assert_eq!(state.absorb_response(response(200, 1, 3)), Absorbed::Completed);

        match state.finalize() {
            ExchangeOutcome::Complete(frames) => {
                let indices: Vec<u8> = frames.iter().map(|f| f.packet_number).collect();
                assert_eq!(indices, vec![0, 1, 2]);
            }
            other => panic!("expected complete outcome, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_fragments_never_advance_completion() {
        let mut state = ExchangeState::new(request_id());
        assert_eq!(state.absorb_response(response(200, 0, 2)), Absorbed::FragmentStored);
        assert_eq!(
            state.absorb_response(response(200, 0, 2)),
            Absorbed::DuplicateFragment
        );
        assert!(matches!(state.finalize(), ExchangeOutcome::Partial(_)));
    }

    #[test]
    fn first_write_wins_for_a_fragment_index() {
        let mut state = ExchangeState::new(request_id());
        let first = response(200, 0, 1);
        let first_header = first.message_id;
        assert_eq!(state.absorb_response(first), Absorbed::Completed);
        assert_eq!(
            state.absorb_response(response(200, 0, 1)),
            Absorbed::DuplicateFragment
        );
        match state.finalize() {
            ExchangeOutcome::Complete(frames) => {
                assert_eq!(frames[0].message_id, first_header);
            }
            other => panic!("expected complete outcome, got {other:?}"),
        }
    }

    #[test]
    fn expected_count_revision_is_tolerated() {
        let mut state = ExchangeState::new(request_id());
        assert_eq!(state.absorb_response(response(200, 0, 3)), Absorbed::FragmentStored);
        // The server now claims two fragments; index 1 completes the set.
        assert_eq!(state.absorb_response(response(200, 1, 2)), Absorbed::Completed);
    }

    #[test]
    fn first_error_wins_until_a_success_supersedes_it() {
        let mut state = ExchangeState::new(request_id());
        assert_eq!(state.absorb_response(response(404, 0, 1)), Absorbed::ErrorRecorded);
        assert_eq!(state.absorb_response(response(500, 0, 1)), Absorbed::ErrorIgnored);
        assert_eq!(state.absorb_response(response(200, 0, 1)), Absorbed::Completed);
        assert!(matches!(state.finalize(), ExchangeOutcome::Complete(_)));
    }

    #[test]
    fn error_after_success_fragments_is_ignored() {
        let mut state = ExchangeState::new(request_id());
        assert_eq!(state.absorb_response(response(200, 0, 2)), Absorbed::FragmentStored);
        assert_eq!(state.absorb_response(response(400, 0, 1)), Absorbed::ErrorIgnored);
        assert!(matches!(state.finalize(), ExchangeOutcome::Partial(_)));
    }

    #[test]
    fn error_only_exchange_finalizes_with_that_error() {
        let mut state = ExchangeState::new(request_id());
        state.absorb_response(response(404, 0, 1));
        match state.finalize() {
            ExchangeOutcome::ServerError(frame) => {
                assert_eq!(frame.total_packets, 1);
            }
            other => panic!("expected server error outcome, got {other:?}"),
        }
    }

    #[test]
    fn empty_exchange_finalizes_empty() {
        let state = ExchangeState::new(request_id());
        assert_eq!(state.finalize(), ExchangeOutcome::Empty);
    }

    #[test]
    fn duplicate_acks_are_noops() {
        let mut state = ExchangeState::new(request_id());
        assert_eq!(state.absorb_ack(), Absorbed::Acknowledged);
        assert_eq!(state.absorb_ack(), Absorbed::DuplicateAck);
        assert!(state.acknowledged());
    }

    #[test]
    fn timeouts_resend_only_while_unacknowledged() {
        let config = ClientConfig {
            max_retries: 5,
            ..ClientConfig::default()
        };
        let mut state = ExchangeState::new(request_id());
        assert_eq!(
            state.note_timeout(&config),
            TimeoutDisposition::Retry {
                attempt: 1,
                resend: true
            }
        );
        state.absorb_ack();
        assert_eq!(
            state.note_timeout(&config),
            TimeoutDisposition::Retry {
                attempt: 2,
                resend: false
            }
        );
    }

    #[test]
    fn overall_budget_exhaustion_finalizes() {
        let config = ClientConfig {
            max_retries: 2,
            ..ClientConfig::default()
        };
        let mut state = ExchangeState::new(request_id());
        assert!(matches!(
            state.note_timeout(&config),
            TimeoutDisposition::Retry { .. }
        ));
        assert!(matches!(
            state.note_timeout(&config),
            TimeoutDisposition::Retry { .. }
        ));
        assert_eq!(state.note_timeout(&config), TimeoutDisposition::Finalize);
    }

    #[test]
    fn grace_budget_bounds_waiting_after_an_error() {
        let config = ClientConfig {
            max_retries: 100,
            max_retries_after_error: 2,
            ..ClientConfig::default()
        };
        let mut state = ExchangeState::new(request_id());
        state.absorb_response(response(500, 0, 1));
        assert!(matches!(
            state.note_timeout(&config),
            TimeoutDisposition::Retry { .. }
        ));
        assert!(matches!(
            state.note_timeout(&config),
            TimeoutDisposition::Retry { .. }
        ));
        assert_eq!(state.note_timeout(&config), TimeoutDisposition::Finalize);
    }

    #[test]
    fn a_success_reopens_the_grace_window() {
        let config = ClientConfig {
            max_retries: 100,
            max_retries_after_error: 1,
            ..ClientConfig::default()
        };
        let mut state = ExchangeState::new(request_id());
        state.absorb_response(response(500, 0, 1));
        assert!(matches!(
            state.note_timeout(&config),
            TimeoutDisposition::Retry { .. }
        ));
        // A partial success clears the error; later timeouts count against
        // the overall budget only.
        state.absorb_response(response(200, 0, 2));
        for _ in 0..10 {
            assert!(matches!(
                state.note_timeout(&config),
                TimeoutDisposition::Retry { .. }
            ));
        }
    }

    #[test]
    fn short_response_payload_reads_as_success() {
        let mut state = ExchangeState::new(request_id());
        let mut frame = response(200, 0, 1);
        frame.payload.truncate(16);
        assert_eq!(state.absorb_response(frame), Absorbed::Completed);
    }
}
