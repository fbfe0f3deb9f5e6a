//! Read-only diagnostic snapshot of a pool's counters and list sizes.

use std::time::Duration;

/// A point-in-time snapshot returned by [`Pool::pool_stats`][super::Pool::pool_stats].
///
/// Mirrors the counters the design keeps under the pool mutex: nothing here
/// is live after the call returns, it's a copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub active_count: usize,
    pub idle_count: usize,
    pub request_count: u64,
    pub had_to_wait_count: u64,
    pub accumulated_request_time: Duration,
    pub accumulated_wait_time: Duration,
    pub accumulated_checkout_time: Duration,
    pub bad_connection_count: u64,
    pub claimed_overdue_connection_count: u64,
    pub accumulated_checkout_time_of_overdue_connections: Duration,
}

impl PoolStats {
    pub fn average_wait_time(&self) -> Duration {
        if self.had_to_wait_count == 0 {
            Duration::ZERO
        } else {
            self.accumulated_wait_time / self.had_to_wait_count as u32
        }
    }

    pub fn average_checkout_time(&self) -> Duration {
        let closed = self.request_count;
        if closed == 0 {
            Duration::ZERO
        } else {
            self.accumulated_checkout_time / closed as u32
        }
    }
}
