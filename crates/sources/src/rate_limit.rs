//! Minimum-interval rate limiter for outbound upstream requests.
//!
//! One limiter exists per upstream host and per process. It is constructed by the caller and
//! handed to the client that needs it, so its lifetime is exactly that of the server instance.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(None),
        }
    }

    /// A limiter that never waits.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Wait until the next request slot is available and reserve it.
    ///
    /// Slots are reserved under the lock and the wait happens after releasing it, so concurrent
    /// callers queue up one interval apart.
    pub async fn acquire(&self) {
        if self.min_interval.is_zero() {
            return;
        }

        let wait = {
            let mut next = self.next_slot.lock();
            let now = Instant::now();
            let slot = match *next {
                Some(t) if t > now => t,
                _ => now,
            };
            *next = Some(slot + self.min_interval);
            slot.saturating_duration_since(now)
        };

        if !wait.is_zero() {
            tracing::trace!(wait_ms = wait.as_millis(), "rate limiter delaying request");
            tokio::time::sleep(wait).await;
        }
    }
}
