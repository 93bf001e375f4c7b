//! Bounded, condition-based waiting.
//!
//! Every wait in a crawl polls a condition until it holds or the shared
//! [`WaitPolicy`] timeout elapses. There are no fixed sleeps.
//!
//! ```ignore
//! let mut deadline = Deadline::start(&policy);
//! loop {
//!     if condition_holds().await {
//!         break;
//!     }
//!     if !deadline.tick().await {
//!         return Err(timeout);
//!     }
//! }
//! ```

use std::time::Duration;

use tokio::time::Instant;

/// Timeout and polling cadence shared by all wait points of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl WaitPolicy {
    #[must_use]
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            // A zero interval would spin the driver.
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    #[must_use]
    pub fn timeout_ms(&self) -> u128 {
        self.timeout.as_millis()
    }
}

/// Tracks the remaining budget of one wait.
#[derive(Debug)]
pub struct Deadline {
    expires_at: Instant,
    poll_interval: Duration,
}

impl Deadline {
    #[must_use]
    pub fn start(policy: &WaitPolicy) -> Self {
        Self {
            expires_at: Instant::now() + policy.timeout,
            poll_interval: policy.poll_interval,
        }
    }

    /// Sleeps until the next poll. Returns `false` once the deadline has
    /// passed, in which case the caller should give up.
    pub async fn tick(&mut self) -> bool {
        let now = Instant::now();
        if now >= self.expires_at {
            return false;
        }
        let remaining = self.expires_at - now;
        tokio::time::sleep(self.poll_interval.min(remaining)).await;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_poll_interval_is_clamped() {
        let policy = WaitPolicy::new(Duration::from_millis(10), Duration::ZERO);
        assert_eq!(policy.poll_interval, Duration::from_millis(1));
    }

    #[tokio::test]
    async fn zero_timeout_expires_immediately() {
        let policy = WaitPolicy::new(Duration::ZERO, Duration::from_millis(5));
        let mut deadline = Deadline::start(&policy);
        assert!(!deadline.tick().await);
    }

    #[tokio::test]
    async fn deadline_expires_after_timeout() {
        let policy = WaitPolicy::new(Duration::from_millis(20), Duration::from_millis(5));
        let mut deadline = Deadline::start(&policy);
        let started = std::time::Instant::now();
        let mut ticks = 0u32;
        while deadline.tick().await {
            ticks += 1;
            assert!(ticks < 1_000, "deadline never expired");
        }
        assert!(ticks >= 1);
        assert!(started.elapsed() >= Duration::from_millis(20));
    }
}
