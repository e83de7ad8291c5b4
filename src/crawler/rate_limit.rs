//! Global request rate limiting
//!
//! One limiter is shared by every worker so that the starts of any two
//! outbound requests, retries included, are at least one interval apart.
//! Waiters are served in arrival order.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Earliest start for the next request, given the previous start
///
/// # Arguments
///
/// * `last_start` - Start time of the previous request, if any
/// * `now` - Current time
/// * `interval` - Minimum spacing between request starts
pub fn next_start(last_start: Option<Instant>, now: Instant, interval: Duration) -> Instant {
    match last_start {
        Some(last) if last + interval > now => last + interval,
        _ => now,
    }
}

/// Shared minimum-interval gate
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum time between request starts
    interval: Duration,

    /// Start time granted to the most recent caller
    last_start: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_start: Mutex::new(None),
        }
    }

    pub fn from_millis(interval_ms: u64) -> Self {
        Self::new(Duration::from_millis(interval_ms))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits until a request may start and records the start
    ///
    /// The lock is held across the wait so that a later caller cannot
    /// claim an earlier slot.
    pub async fn acquire(&self) -> Instant {
        let mut last_start = self.last_start.lock().await;

        let start = next_start(*last_start, Instant::now(), self.interval);
        if start > Instant::now() {
            tracing::trace!("Rate limit: waiting {:?}", start - Instant::now());
            tokio::time::sleep_until(start).await;
        }

        let started = Instant::now();
        *last_start = Some(started);
        started
    }
}
