//! Alerting module for multi-channel notifications
//!
//! This module provides alert delivery to Slack and Discord webhooks and
//! SMTP email, plus the dispatcher that fans a payload out to every
//! enabled channel concurrently with per-channel retry.

pub mod discord;
pub mod dispatcher;
pub mod email;
pub mod retry;
pub mod slack;

pub use discord::DiscordAlerter;
pub use dispatcher::NotificationDispatcher;
pub use email::EmailAlerter;
pub use retry::RetryPolicy;
pub use slack::SlackAlerter;

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::models::{NotificationPayload, Severity};

/// Errors that can occur during alert delivery
#[derive(Error, Debug)]
pub enum AlertError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Webhook returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("SMTP error: {0}")]
    Smtp(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Channel misconfigured: {0}")]
    Config(String),
}

impl AlertError {
    /// Transport-class failures are worth retrying; configuration and
    /// serialization failures are not.
    pub fn is_transient(&self) -> bool {
        match self {
            AlertError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            AlertError::Status(status) => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            AlertError::Smtp(_) => true,
            AlertError::Serialization(_) | AlertError::Config(_) => false,
        }
    }
}

/// A single notification channel (email, Slack webhook, Discord webhook)
///
/// Implementations render the shared payload into their own wire format.
/// Transport failures surface as `AlertError`; the dispatcher converts
/// outcomes to booleans and applies the retry policy.
pub trait ChannelAlerter: Send + Sync {
    /// Stable channel name used as the `DispatchResult` key
    fn name(&self) -> &'static str;

    fn send_alert<'a>(
        &'a self,
        payload: &'a NotificationPayload,
    ) -> Pin<Box<dyn Future<Output = Result<(), AlertError>> + Send + 'a>>;
}

/// Emoji used by chat channels, stable across severity ordering
pub(crate) fn severity_emoji(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => ":rotating_light:",
        Severity::High => ":warning:",
        Severity::Medium => ":exclamation:",
        Severity::Low => ":large_green_circle:",
        Severity::Info => ":information_source:",
    }
}

/// Embed color used by Discord-style channels
pub(crate) fn severity_color(severity: Severity) -> u32 {
    match severity {
        Severity::Critical => 0xFF0000, // Red
        Severity::High => 0xFF6600,     // Orange
        Severity::Medium => 0xFFCC00,   // Yellow
        Severity::Low => 0x00CC66,      // Green
        Severity::Info => 0x00CCFF,     // Light blue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_are_not_transient() {
        assert!(!AlertError::Config("missing url".to_string()).is_transient());
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(!AlertError::Serialization(json_err).is_transient());
    }

    #[test]
    fn test_server_errors_are_transient() {
        assert!(AlertError::Status(reqwest::StatusCode::BAD_GATEWAY).is_transient());
        assert!(AlertError::Status(reqwest::StatusCode::TOO_MANY_REQUESTS).is_transient());
        assert!(!AlertError::Status(reqwest::StatusCode::BAD_REQUEST).is_transient());
        assert!(AlertError::Smtp("connection reset".to_string()).is_transient());
    }

    #[test]
    fn test_severity_visuals_follow_ordering() {
        let colors: Vec<u32> = [
            Severity::Critical,
            Severity::High,
            Severity::Medium,
            Severity::Low,
            Severity::Info,
        ]
        .iter()
        .map(|&s| severity_color(s))
        .collect();

        assert_eq!(colors[0], 0xFF0000);
        let mut unique = colors.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), colors.len());

        assert_eq!(severity_emoji(Severity::Critical), ":rotating_light:");
        assert_ne!(
            severity_emoji(Severity::High),
            severity_emoji(Severity::Info)
        );
    }
}
