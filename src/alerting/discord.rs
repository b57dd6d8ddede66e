//! Discord webhook channel using embed formatting

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::Client;

use super::{severity_color, AlertError, ChannelAlerter};
use crate::models::NotificationPayload;

// Discord embed hard limits
const TITLE_MAX: usize = 256;
const DESCRIPTION_MAX: usize = 4096;

/// Sends alerts to a Discord webhook URL
pub struct DiscordAlerter {
    client: Client,
    webhook_url: String,
    username: String,
}

impl DiscordAlerter {
    pub fn new(webhook_url: String, username: Option<String>) -> Self {
        DiscordAlerter {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            webhook_url,
            username: username.unwrap_or_else(|| "HiveWatch Bot".to_string()),
        }
    }

    fn build_payload(&self, payload: &NotificationPayload) -> serde_json::Value {
        let title = truncate(&format!(":shield: {}", payload.title), TITLE_MAX);
        let description = truncate(&payload.description, DESCRIPTION_MAX);

        let mut fields = vec![
            serde_json::json!({
                "name": "Severity",
                "value": payload.severity.to_string().to_uppercase(),
                "inline": true
            }),
            serde_json::json!({
                "name": "Source IP",
                "value": payload.source_ip,
                "inline": true
            }),
        ];
        if let Some(score) = payload.abuse_score {
            fields.push(serde_json::json!({
                "name": "Abuse Score",
                "value": format!("{}/100", score),
                "inline": true
            }));
        }
        if let Some(country) = &payload.country {
            fields.push(serde_json::json!({
                "name": "Country",
                "value": country,
                "inline": true
            }));
        }

        serde_json::json!({
            "username": self.username,
            "embeds": [{
                "title": title,
                "description": description,
                "color": severity_color(payload.severity),
                "timestamp": payload.triggered_at.to_rfc3339(),
                "fields": fields,
            }]
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

        // Discord webhooks return 204 No Content on success
        if !response.status().is_success() {
            return Err(AlertError::Status(response.status()));
        }
        Ok(())
    }
}

impl ChannelAlerter for DiscordAlerter {
    fn name(&self) -> &'static str {
        "discord"
    }

    fn send_alert<'a>(
        &'a self,
        payload: &'a NotificationPayload,
    ) -> Pin<Box<dyn Future<Output = Result<(), AlertError>> + Send + 'a>> {
        Box::pin(self.post_alert(payload))
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;

    fn sample_payload() -> NotificationPayload {
        NotificationPayload {
            title: "Honeypot Triggered".to_string(),
            severity: Severity::Critical,
            description: "Honeypot triggered by 203.0.113.7".to_string(),
            source_ip: "203.0.113.7".to_string(),
            country: Some("France".to_string()),
            city: Some("Paris".to_string()),
            abuse_score: Some(95),
            alert_id: Some(3),
            triggered_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_embed_structure() {
        let alerter = DiscordAlerter::new("https://discord.example/hook".to_string(), None);
        let body = alerter.build_payload(&sample_payload());

        let embeds = body["embeds"].as_array().unwrap();
        assert_eq!(embeds.len(), 1);

        let embed = &embeds[0];
        assert_eq!(embed["color"], 0xFF0000);
        assert!(embed["timestamp"].as_str().unwrap().contains('T'));

        let fields = embed["fields"].as_array().unwrap();
        let names: Vec<&str> = fields
            .iter()
            .map(|f| f["name"].as_str().unwrap())
            .collect();
        assert!(names.contains(&"Severity"));
        assert!(names.contains(&"Source IP"));
        assert!(names.contains(&"Abuse Score"));
        assert!(names.contains(&"Country"));
    }

    #[test]
    fn test_optional_fields_omitted_when_absent() {
        let mut payload = sample_payload();
        payload.abuse_score = None;
        payload.country = None;

        let alerter = DiscordAlerter::new("https://discord.example/hook".to_string(), None);
        let body = alerter.build_payload(&payload);
        let fields = body["embeds"][0]["fields"].as_array().unwrap();
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn test_title_and_description_truncated_to_limits() {
        let mut payload = sample_payload();
        payload.title = "x".repeat(500);
        payload.description = "y".repeat(10_000);

        let alerter = DiscordAlerter::new("https://discord.example/hook".to_string(), None);
        let body = alerter.build_payload(&payload);
        let embed = &body["embeds"][0];

        assert_eq!(embed["title"].as_str().unwrap().chars().count(), TITLE_MAX);
        assert_eq!(
            embed["description"].as_str().unwrap().chars().count(),
            DESCRIPTION_MAX
        );
    }

    #[tokio::test]
    async fn test_unreachable_webhook_is_transient_error() {
        let alerter = DiscordAlerter::new("http://127.0.0.1:9/hook".to_string(), None);
        let err = alerter.post_alert(&sample_payload()).await.unwrap_err();
        assert!(err.is_transient());
    }
}
