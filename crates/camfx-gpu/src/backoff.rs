//! Bounded exponential backoff for GPU initialization.

use std::time::{Duration, Instant};

/// Tracks failed initialization attempts. Never sleeps: callers ask
/// [`InitBackoff::can_attempt`] each frame and carry on without the GPU
/// until the next slot opens.
#[derive(Debug, Clone)]
pub struct InitBackoff {
    max_attempts: u32,
    base: Duration,
    failures: u32,
    next_attempt: Option<Instant>,
}

impl InitBackoff {
    pub fn new(max_attempts: u32, base: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base,
            failures: 0,
            next_attempt: None,
        }
    }

    /// An attempt is allowed now.
    pub fn can_attempt(&self, now: Instant) -> bool {
        !self.exhausted() && self.next_attempt.map_or(true, |at| now >= at)
    }

    /// Record a failure. Returns the delay before the next attempt, or
    /// `None` once the budget is spent.
    pub fn record_failure(&mut self, now: Instant) -> Option<Duration> {
        self.failures += 1;
        if self.exhausted() {
            self.next_attempt = None;
            return None;
        }
        let delay = self.base * 2u32.saturating_pow(self.failures - 1);
        self.next_attempt = Some(now + delay);
        Some(delay)
    }

    pub fn record_success(&mut self) {
        self.failures = 0;
        self.next_attempt = None;
    }

    pub fn exhausted(&self) -> bool {
        self.failures >= self.max_attempts
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_then_exhausts() {
        let t0 = Instant::now();
        let mut b = InitBackoff::new(3, Duration::from_millis(100));
        assert!(b.can_attempt(t0));
        assert_eq!(b.record_failure(t0), Some(Duration::from_millis(100)));
        assert!(!b.can_attempt(t0 + Duration::from_millis(50)));
        assert!(b.can_attempt(t0 + Duration::from_millis(100)));
        assert_eq!(b.record_failure(t0), Some(Duration::from_millis(200)));
        assert_eq!(b.record_failure(t0), None);
        assert!(b.exhausted());
        assert!(!b.can_attempt(t0 + Duration::from_secs(60)));
    }

    #[test]
    fn success_resets() {
        let t0 = Instant::now();
        let mut b = InitBackoff::new(2, Duration::from_millis(10));
        b.record_failure(t0);
        b.record_success();
        assert_eq!(b.failures(), 0);
        assert!(b.can_attempt(t0));
    }
}
