use std::collections::VecDeque;
use std::io;
use std::time::Duration;

/// Blocking datagram contract used by the client engine.
///
/// One logical peer per wire: `send` targets the configured remote and
/// `recv_timeout` waits at most `timeout` for the next inbound datagram.
/// A per-attempt timeout is not an error; it surfaces as `Ok(None)` so the
/// engine can drive its retry state machine. Every `Err` is a transport
/// failure the engine treats as fatal.
pub trait Wire {
    /// Sends one datagram to the remote peer.
    fn send(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Receives the next datagram into `buf`, waiting at most `timeout`.
    ///
    /// Returns `Ok(Some(len))` on receipt, `Ok(None)` on timeout.
    fn recv_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<Option<usize>>;
}

#[derive(Debug)]
enum Inbound {
    Datagram(Vec<u8>),
    Timeout,
}

/// Scripted in-memory wire for engine tests and simulations.
///
/// Inbound traffic is a queue of datagrams and forced timeouts; an empty
/// queue also reads as a timeout (a silent network). Outbound sends are
/// captured for inspection.
#[derive(Debug)]
pub struct MemoryWire {
    inbound: VecDeque<Inbound>,
    outbound: Vec<Vec<u8>>,
    allow_send: bool,
}

impl Default for MemoryWire {
    fn default() -> Self {
        Self {
            inbound: VecDeque::new(),
            outbound: Vec::new(),
            allow_send: true,
        }
    }
}

impl MemoryWire {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues one inbound datagram.
    pub fn enqueue_datagram(&mut self, bytes: Vec<u8>) {
        self.inbound.push_back(Inbound::Datagram(bytes));
    }

    /// Queues one forced receive timeout ahead of later datagrams.
    pub fn enqueue_timeout(&mut self) {
        self.inbound.push_back(Inbound::Timeout);
    }

    /// Enables/disables outbound sending; disabled sends fail like a dead
    /// transport.
    pub fn set_allow_send(&mut self, allow_send: bool) {
        self.allow_send = allow_send;
    }

    /// Drains and returns all outbound sends captured so far.
    pub fn take_outbound(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.outbound)
    }

    /// Outbound sends captured so far, in order.
    pub fn outbound(&self) -> &[Vec<u8>] {
        &self.outbound
    }
}

impl Wire for MemoryWire {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        if !self.allow_send {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "send disabled"));
        }
        self.outbound.push(bytes.to_vec());
        Ok(())
    }

    fn recv_timeout(&mut self, buf: &mut [u8], _timeout: Duration) -> io::Result<Option<usize>> {
        match self.inbound.pop_front() {
            Some(Inbound::Datagram(bytes)) => {
                let len = bytes.len().min(buf.len());
                buf[..len].copy_from_slice(&bytes[..len]);
                Ok(Some(len))
            }
            Some(Inbound::Timeout) | None => Ok(None),
        }
    }
}
