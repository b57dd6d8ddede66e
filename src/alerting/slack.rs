//! Slack webhook channel using Block Kit formatting

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::Client;

use super::{severity_emoji, AlertError, ChannelAlerter};
use crate::models::NotificationPayload;

/// Sends alerts to a Slack incoming-webhook URL
pub struct SlackAlerter {
    client: Client,
    webhook_url: String,
    channel: Option<String>,
    username: String,
}

impl SlackAlerter {
    pub fn new(webhook_url: String, channel: Option<String>, username: Option<String>) -> Self {
        SlackAlerter {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            webhook_url,
            channel,
            username: username.unwrap_or_else(|| "HiveWatch Bot".to_string()),
        }
    }

    fn build_payload(&self, payload: &NotificationPayload) -> serde_json::Value {
        let title = format!(
            "{} {} [{}]",
            severity_emoji(payload.severity),
            payload.title,
            payload.severity.to_string().to_uppercase()
        );

        let mut details = format!(
            "*Source IP:* `{}`\n*Severity:* {}\n",
            payload.source_ip, payload.severity
        );
        if let Some(country) = &payload.country {
            match &payload.city {
                Some(city) => details.push_str(&format!("*Location:* {}, {}\n", city, country)),
                None => details.push_str(&format!("*Location:* {}\n", country)),
            }
        }
        if let Some(score) = payload.abuse_score {
            details.push_str(&format!("*Abuse Score:* {}/100\n", score));
        }
        details.push_str(&format!("\n{}", payload.description));
        if let Some(id) = payload.alert_id {
            details.push_str(&format!("\n*Alert ID:* {}", id));
        }

        serde_json::json!({
            "channel": self.channel,
            "username": self.username,
            "icon_emoji": ":shield:",
            "blocks": [
                {
                    "type": "header",
                    "text": { "type": "plain_text", "text": title, "emoji": true }
                },
                { "type": "divider" },
                {
                    "type": "section",
                    "text": { "type": "mrkdwn", "text": details }
                }
            ]
        })
    }

    async fn post_alert(&self, payload: &NotificationPayload) -> Result<(), AlertError> {
        let body = self.build_payload(payload);

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AlertError::Status(response.status()));
        }
        Ok(())
    }
}

impl ChannelAlerter for SlackAlerter {
    fn name(&self) -> &'static str {
        "slack"
    }

    fn send_alert<'a>(
        &'a self,
        payload: &'a NotificationPayload,
    ) -> Pin<Box<dyn Future<Output = Result<(), AlertError>> + Send + 'a>> {
        Box::pin(self.post_alert(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;

    fn sample_payload() -> NotificationPayload {
        NotificationPayload {
            title: "Honeypot Triggered".to_string(),
            severity: Severity::High,
            description: "Honeypot triggered by 203.0.113.7 (Paris, France)".to_string(),
            source_ip: "203.0.113.7".to_string(),
            country: Some("France".to_string()),
            city: Some("Paris".to_string()),
            abuse_score: Some(82),
            alert_id: Some(7),
            triggered_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_block_structure() {
        let alerter = SlackAlerter::new(
            "https://hooks.slack.example/T000/B000/XXX".to_string(),
            Some("#security".to_string()),
            None,
        );
        let body = alerter.build_payload(&sample_payload());

        assert_eq!(body["channel"], "#security");
        assert_eq!(body["username"], "HiveWatch Bot");
        assert_eq!(body["icon_emoji"], ":shield:");

        let blocks = body["blocks"].as_array().unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0]["type"], "header");
        assert_eq!(blocks[1]["type"], "divider");
        assert_eq!(blocks[2]["type"], "section");
        assert_eq!(blocks[2]["text"]["type"], "mrkdwn");
    }

    #[test]
    fn test_header_carries_severity_emoji() {
        let alerter = SlackAlerter::new("https://example.invalid/hook".to_string(), None, None);
        let body = alerter.build_payload(&sample_payload());
        let header = body["blocks"][0]["text"]["text"].as_str().unwrap();
        assert!(header.starts_with(":warning:"));
        assert!(header.contains("HIGH"));
    }

    #[test]
    fn test_details_include_structured_fields() {
        let alerter = SlackAlerter::new("https://example.invalid/hook".to_string(), None, None);
        let body = alerter.build_payload(&sample_payload());
        let details = body["blocks"][2]["text"]["text"].as_str().unwrap();
        assert!(details.contains("`203.0.113.7`"));
        assert!(details.contains("Paris, France"));
        assert!(details.contains("82/100"));
        assert!(details.contains("*Alert ID:* 7"));
    }

    #[tokio::test]
    async fn test_unreachable_webhook_is_transient_error() {
        let alerter = SlackAlerter::new("http://127.0.0.1:9/hook".to_string(), None, None);
        let err = alerter.post_alert(&sample_payload()).await.unwrap_err();
        assert!(err.is_transient());
    }
}
