//! Notification fan-out
//!
//! Dispatches one payload to every enabled channel concurrently, each
//! wrapped in the retry policy, and aggregates per-channel outcomes.
//! A failing channel never aborts its siblings and the dispatcher never
//! errors; the caller decides what zero successes means.

use std::sync::Arc;

use tokio::task::JoinSet;

use super::{AlertError, ChannelAlerter, RetryPolicy};
use crate::models::{DispatchResult, NotificationPayload};
use crate::ratelimit::SlidingWindowLimiter;

/// Rate-limiter key consumed by `dispatch_throttled`
const DISPATCH_RATE_KEY: &str = "send_alert";

/// Fans alerts out to the configured channel set
pub struct NotificationDispatcher {
    channels: Vec<Arc<dyn ChannelAlerter>>,
    retry: RetryPolicy,
    limiter: Option<Arc<SlidingWindowLimiter>>,
}

impl NotificationDispatcher {
    pub fn new(channels: Vec<Arc<dyn ChannelAlerter>>, retry: RetryPolicy) -> Self {
        if channels.is_empty() {
            log::warn!("No notification channels configured, alerts will not be delivered");
        }
        NotificationDispatcher {
            channels,
            retry,
            limiter: None,
        }
    }

    /// Attach a limiter consulted by `dispatch_throttled`.
    pub fn with_limiter(mut self, limiter: Arc<SlidingWindowLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn channel_names(&self) -> Vec<&'static str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Send `payload` to every enabled channel (optionally restricted to
    /// `only`), concurrently, joining on completion of all.
    ///
    /// Returns one entry per attempted channel. No deduplication:
    /// dispatching the same logical event twice sends it twice.
    pub async fn dispatch(
        &self,
        payload: &NotificationPayload,
        only: Option<&[String]>,
    ) -> DispatchResult {
        let mut tasks: JoinSet<(String, bool)> = JoinSet::new();

        for channel in &self.channels {
            if let Some(filter) = only {
                if !filter.iter().any(|n| n == channel.name()) {
                    continue;
                }
            }

            let channel = Arc::clone(channel);
            let payload = payload.clone();
            let retry = self.retry.clone();
            tasks.spawn(async move {
                let name = channel.name().to_string();
                let result = retry.run(|| channel.send_alert(&payload)).await;
                match &result {
                    Ok(()) => log::info!("Alert sent via {}", name),
                    Err(e) => log::error!("Alert via {} failed: {}", name, e),
                }
                (name, result.is_ok())
            });
        }

        let mut results = DispatchResult::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, ok)) => {
                    results.insert(name, ok);
                }
                Err(e) => log::error!("Channel send task panicked: {}", e),
            }
        }
        results
    }

    /// Like `dispatch`, but consults the shared limiter first under the
    /// `"send_alert"` key; when the window is exhausted the fan-out is
    /// skipped entirely and the result is empty.
    pub async fn dispatch_throttled(&self, payload: &NotificationPayload) -> DispatchResult {
        if let Some(limiter) = &self.limiter {
            if !limiter.check(DISPATCH_RATE_KEY) {
                log::warn!(
                    "Alert dispatch rate limit reached, dropping notification for {}",
                    payload.source_ip
                );
                return DispatchResult::new();
            }
        }
        self.dispatch(payload, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct StubChannel {
        name: &'static str,
        fail: bool,
        calls: AtomicUsize,
    }

    impl StubChannel {
        fn ok(name: &'static str) -> Arc<Self> {
            Arc::new(StubChannel {
                name,
                fail: false,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(name: &'static str) -> Arc<Self> {
            Arc::new(StubChannel {
                name,
                fail: true,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl ChannelAlerter for StubChannel {
        fn name(&self) -> &'static str {
            self.name
        }

        fn send_alert<'a>(
            &'a self,
            _payload: &'a NotificationPayload,
        ) -> Pin<Box<dyn Future<Output = Result<(), AlertError>> + Send + 'a>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let fail = self.fail;
            Box::pin(async move {
                if fail {
                    Err(AlertError::Status(reqwest::StatusCode::BAD_GATEWAY))
                } else {
                    Ok(())
                }
            })
        }
    }

    fn sample_payload() -> NotificationPayload {
        NotificationPayload {
            title: "Honeypot Triggered".to_string(),
            severity: Severity::Medium,
            description: "test".to_string(),
            source_ip: "203.0.113.7".to_string(),
            country: None,
            city: None,
            abuse_score: None,
            alert_id: None,
            triggered_at: chrono::Utc::now(),
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            total_budget: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_one_failing_channel_does_not_abort_siblings() {
        let slack = StubChannel::ok("slack");
        let discord = StubChannel::failing("discord");
        let email = StubChannel::ok("email");

        let dispatcher = NotificationDispatcher::new(
            vec![
                Arc::clone(&slack) as Arc<dyn ChannelAlerter>,
                Arc::clone(&discord) as Arc<dyn ChannelAlerter>,
                Arc::clone(&email) as Arc<dyn ChannelAlerter>,
            ],
            fast_retry(),
        );

        let results = dispatcher.dispatch(&sample_payload(), None).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results["slack"], true);
        assert_eq!(results["discord"], false);
        assert_eq!(results["email"], true);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried_to_attempt_limit() {
        let discord = StubChannel::failing("discord");
        let dispatcher = NotificationDispatcher::new(
            vec![Arc::clone(&discord) as Arc<dyn ChannelAlerter>],
            fast_retry(),
        );

        dispatcher.dispatch(&sample_payload(), None).await;
        assert_eq!(discord.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_channel_filter() {
        let slack = StubChannel::ok("slack");
        let email = StubChannel::ok("email");
        let dispatcher = NotificationDispatcher::new(
            vec![
                Arc::clone(&slack) as Arc<dyn ChannelAlerter>,
                Arc::clone(&email) as Arc<dyn ChannelAlerter>,
            ],
            fast_retry(),
        );

        let results = dispatcher
            .dispatch(&sample_payload(), Some(&["email".to_string()]))
            .await;

        assert_eq!(results.len(), 1);
        assert!(results.contains_key("email"));
        assert_eq!(slack.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_channels_yields_empty_result() {
        let dispatcher = NotificationDispatcher::new(vec![], fast_retry());
        let results = dispatcher.dispatch(&sample_payload(), None).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_throttled_dispatch_respects_limiter() {
        let slack = StubChannel::ok("slack");
        let limiter = Arc::new(SlidingWindowLimiter::new(1, Duration::from_secs(60)));
        let dispatcher = NotificationDispatcher::new(
            vec![Arc::clone(&slack) as Arc<dyn ChannelAlerter>],
            fast_retry(),
        )
        .with_limiter(Arc::clone(&limiter));

        let first = dispatcher.dispatch_throttled(&sample_payload()).await;
        assert_eq!(first.len(), 1);

        let second = dispatcher.dispatch_throttled(&sample_payload()).await;
        assert!(second.is_empty());
        assert_eq!(slack.calls.load(Ordering::SeqCst), 1);
    }
}
