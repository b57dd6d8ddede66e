//! Retry policy for alert delivery
//!
//! Exponential backoff with jitter, bounded by both a maximum attempt
//! count and a total wall-clock budget. Only transport-class failures
//! are retried; a misconfigured channel fails immediately.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use super::AlertError;

/// Backoff configuration for a single channel send
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first (minimum 1)
    pub max_attempts: usize,
    /// Delay before the first retry; doubles each attempt
    pub base_delay: Duration,
    /// Cap on any single delay
    pub max_delay: Duration,
    /// Wall-clock budget for the whole send, retries included
    pub total_budget: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            total_budget: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Exponential delay for the given zero-based attempt, with up to
    /// 50% random jitter to avoid synchronized retry storms.
    fn delay_for(&self, attempt: usize) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(1u32 << attempt.min(16) as u32)
            .min(self.max_delay);
        let jitter = rand::thread_rng().gen_range(0.0..0.5);
        exp.mul_f64(1.0 + jitter).min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails non-transiently, or the
    /// attempt/time budget is exhausted. Returns the last error.
    pub async fn run<F, Fut>(&self, mut op: F) -> Result<(), AlertError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), AlertError>>,
    {
        let started = tokio::time::Instant::now();
        let mut last_error = None;

        for attempt in 0..self.max_attempts.max(1) {
            match op().await {
                Ok(()) => return Ok(()),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => last_error = Some(e),
            }

            if attempt + 1 >= self.max_attempts.max(1) {
                break;
            }

            let delay = self.delay_for(attempt);
            if started.elapsed() + delay >= self.total_budget {
                log::debug!("Retry budget exhausted after attempt {}", attempt + 1);
                break;
            }
            tokio::time::sleep(delay).await;
        }

        Err(last_error
            .unwrap_or_else(|| AlertError::Config("retry loop made no attempts".to_string())))
    }
}
