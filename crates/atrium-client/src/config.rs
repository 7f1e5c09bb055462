use std::time::Duration;

use atrium_core::MAX_PACKET_BYTES;

/// Reliability knobs for one client.
///
/// Negative retry budgets mean unbounded: the engine keeps waiting until a
/// terminal frame arrives.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Deadline for each blocking receive attempt.
    pub attempt_timeout: Duration,
    /// Overall timeout budget per exchange before finalizing.
    pub max_retries: i32,
    /// Timeouts tolerated after an error response, while a superseding
    /// success may still arrive.
    pub max_retries_after_error: i32,
    /// Receive buffer size; longer datagrams are truncated by the OS.
    pub recv_buffer_bytes: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_millis(1000),
            max_retries: 3,
            max_retries_after_error: 10,
            recv_buffer_bytes: MAX_PACKET_BYTES,
        }
    }
}

impl ClientConfig {
    /// Whether `timeouts` has exceeded the overall budget.
    pub(crate) fn overall_budget_exhausted(&self, timeouts: u32) -> bool {
        self.max_retries >= 0 && timeouts > self.max_retries as u32
    }

    /// Whether `timeouts_since_error` has exceeded the post-error grace
    /// budget.
    pub(crate) fn grace_budget_exhausted(&self, timeouts_since_error: u32) -> bool {
        self.max_retries_after_error >= 0
            && timeouts_since_error > self.max_retries_after_error as u32
    }
}
