//! Sliding-window-log rate limiting
//!
//! Keeps exact timestamps of recent requests per key and prunes those
//! outside the trailing window, giving exact enforcement at the cost of
//! O(n) memory per active key. Windows are short and keys are bounded
//! (client IPs, named operations), so the trade-off is acceptable.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Sliding window of request instants for a single key
#[derive(Debug, Default)]
struct RateWindow {
    instants: Vec<Instant>,
}

impl RateWindow {
    /// Drop all instants older than the window start
    fn prune(&mut self, now: Instant, window: Duration) {
        self.instants.retain(|&t| now.duration_since(t) < window);
    }
}

/// Sliding-window-log rate limiter keyed by string
///
/// State is process-local; multiple instances each enforce their own
/// independent limits. The internal map is never evicted, so key
/// cardinality is expected to stay bounded (client IPs, operation names).
pub struct SlidingWindowLimiter {
    windows: Mutex<HashMap<String, RateWindow>>,
    max_requests: usize,
    window: Duration,
}

impl SlidingWindowLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        SlidingWindowLimiter {
            windows: Mutex::new(HashMap::new()),
            max_requests,
            window,
        }
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Check whether a request under `key` is allowed right now.
    ///
    /// Allowed requests are recorded; rejected attempts are not, so a
    /// client hammering the limiter does not extend its own lockout.
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut windows = self.windows.lock().unwrap();
        let entry = windows.entry(key.to_string()).or_default();
        entry.prune(now, self.window);

        if entry.instants.len() >= self.max_requests {
            return false;
        }

        entry.instants.push(now);
        true
    }

    /// Number of requests still allowed for `key` in the current window.
    pub fn remaining(&self, key: &str) -> usize {
        self.remaining_at(key, Instant::now())
    }

    fn remaining_at(&self, key: &str, now: Instant) -> usize {
        let mut windows = self.windows.lock().unwrap();
        match windows.get_mut(key) {
            Some(entry) => {
                entry.prune(now, self.window);
                self.max_requests.saturating_sub(entry.instants.len())
            }
            None => self.max_requests,
        }
    }

    /// Instant at which the oldest recorded request leaves the window,
    /// or None if nothing is recorded for `key`.
    pub fn reset_time(&self, key: &str) -> Option<Instant> {
        let mut windows = self.windows.lock().unwrap();
        let entry = windows.get_mut(key)?;
        entry.prune(Instant::now(), self.window);
        entry.instants.iter().min().map(|&t| t + self.window)
    }

    /// Reset time as Unix epoch seconds, for `X-RateLimit-Reset`.
    pub fn reset_epoch(&self, key: &str) -> Option<u64> {
        let reset_at = self.reset_time(key)?;
        let now = Instant::now();
        let until = reset_at.saturating_duration_since(now);
        let epoch_now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Some(epoch_now + until.as_secs())
    }

    /// Forget all recorded requests for a single key
    pub fn reset(&self, key: &str) {
        self.windows.lock().unwrap().remove(key);
    }

    /// Forget all recorded requests for every key
    pub fn reset_all(&self) {
        self.windows.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_up_to_max_then_rejects() {
        let limiter = SlidingWindowLimiter::new(2, Duration::from_secs(60));
        let now = Instant::now();

        assert!(limiter.check_at("k", now));
        assert!(limiter.check_at("k", now + Duration::from_secs(1)));
        assert!(!limiter.check_at("k", now + Duration::from_secs(2)));
        assert_eq!(limiter.remaining_at("k", now + Duration::from_secs(2)), 0);
    }

    #[test]
    fn test_rejected_attempt_not_recorded() {
        let limiter = SlidingWindowLimiter::new(1, Duration::from_secs(60));
        let now = Instant::now();

        assert!(limiter.check_at("k", now));
        // Many rejected attempts must not push the reset point forward
        for i in 1..10 {
            assert!(!limiter.check_at("k", now + Duration::from_secs(i)));
        }

        let reset = limiter.reset_time("k").unwrap();
        assert!(reset <= now + Duration::from_secs(60));
    }

    #[test]
    fn test_window_slides() {
        let limiter = SlidingWindowLimiter::new(2, Duration::from_secs(60));
        let now = Instant::now();

        assert!(limiter.check_at("k", now));
        assert!(limiter.check_at("k", now + Duration::from_secs(10)));
        assert!(!limiter.check_at("k", now + Duration::from_secs(20)));

        // First instant has left the window; one slot free again
        assert!(limiter.check_at("k", now + Duration::from_secs(61)));
        assert!(!limiter.check_at("k", now + Duration::from_secs(62)));
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = SlidingWindowLimiter::new(1, Duration::from_secs(60));
        let now = Instant::now();

        assert!(limiter.check_at("a", now));
        assert!(limiter.check_at("b", now));
        assert!(!limiter.check_at("a", now));
    }

    #[test]
    fn test_remaining_without_requests() {
        let limiter = SlidingWindowLimiter::new(5, Duration::from_secs(60));
        assert_eq!(limiter.remaining("fresh"), 5);
        assert!(limiter.reset_time("fresh").is_none());
        assert!(limiter.reset_epoch("fresh").is_none());
    }

    #[test]
    fn test_reset_single_key() {
        let limiter = SlidingWindowLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.check("k"));
        assert!(!limiter.check("k"));

        limiter.reset("k");
        assert!(limiter.check("k"));
    }

    #[test]
    fn test_reset_all() {
        let limiter = SlidingWindowLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.check("a"));
        assert!(limiter.check("b"));

        limiter.reset_all();
        assert!(limiter.check("a"));
        assert!(limiter.check("b"));
    }

    #[test]
    fn test_third_check_rejected_with_limit_of_two() {
        let limiter = SlidingWindowLimiter::new(2, Duration::from_secs(60));
        let results: Vec<bool> = (0..3).map(|_| limiter.check("k")).collect();
        assert_eq!(results, vec![true, true, false]);
        assert_eq!(limiter.remaining("k"), 0);
    }
}
