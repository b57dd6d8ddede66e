use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::event::EnrichmentResult;

/// Alert severity, ordered `Info < Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }

    /// Parse a severity string, defaulting to Medium for unknown values.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "critical" => Severity::Critical,
            "high" => Severity::High,
            "low" => Severity::Low,
            "info" => Severity::Info,
            _ => Severity::Medium,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Channel-independent view of an enriched, persisted alert.
///
/// Built once per event and rendered by each channel into its own wire
/// format (Slack blocks, Discord embeds, MIME mail).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub severity: Severity,
    pub description: String,
    pub source_ip: String,
    pub country: Option<String>,
    pub city: Option<String>,
    pub abuse_score: Option<u8>,
    pub alert_id: Option<i64>,
    pub triggered_at: chrono::DateTime<chrono::Utc>,
}

impl NotificationPayload {
    /// Plain-text rendering shared by channels that have no structured
    /// message format of their own (email body).
    pub fn render_text(&self) -> String {
        let mut out = format!(
            "Alert: {}\nSeverity: {}\nSource IP: {}\n",
            self.title, self.severity, self.source_ip
        );
        if let (Some(city), Some(country)) = (&self.city, &self.country) {
            out.push_str(&format!("Location: {}, {}\n", city, country));
        } else if let Some(country) = &self.country {
            out.push_str(&format!("Location: {}\n", country));
        }
        if let Some(score) = self.abuse_score {
            out.push_str(&format!("Abuse Score: {}/100\n", score));
        }
        out.push_str(&format!("\n{}\n", self.description));
        if let Some(id) = self.alert_id {
            out.push_str(&format!("\nAlert ID: {}\n", id));
        }
        out.push_str(&format!("Timestamp: {}\n", self.triggered_at.to_rfc3339()));
        out
    }
}

/// Per-channel outcome of a fan-out. One entry per attempted channel;
/// disabled channels never appear.
pub type DispatchResult = HashMap<String, bool>;

/// Alert record handed to the persistence store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAlert {
    pub alert_type: String,
    pub source_ip: String,
    pub severity: Severity,
    pub enrichment: EnrichmentResult,
    /// Raw event payload, serialized as JSON.
    pub payload: serde_json::Value,
    pub triggered_at: chrono::DateTime<chrono::Utc>,
}

/// Alert record as returned by the persistence store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredAlert {
    pub id: i64,
    pub alert_type: String,
    pub source_ip: String,
    pub severity: Severity,
    pub enrichment: EnrichmentResult,
    pub payload: serde_json::Value,
    pub triggered_at: chrono::DateTime<chrono::Utc>,
}

impl StoredAlert {
    /// Derive the notification view sent to every channel.
    pub fn to_notification_payload(&self) -> NotificationPayload {
        let geo = self.enrichment.geo.as_ref();
        NotificationPayload {
            title: self.alert_type.clone(),
            severity: self.severity,
            description: format!(
                "Honeypot triggered by {} ({})",
                self.source_ip,
                geo.map(|g| g.display_location())
                    .unwrap_or_else(|| "location unknown".to_string())
            ),
            source_ip: self.source_ip.clone(),
            country: geo.and_then(|g| g.country.clone()),
            city: geo.and_then(|g| g.city.clone()),
            abuse_score: self.enrichment.reputation_score,
            alert_id: Some(self.id),
            triggered_at: self.triggered_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeoInfo;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert!(Severity::Low > Severity::Info);
    }

    #[test]
    fn test_severity_parse_unknown_defaults_to_medium() {
        assert_eq!(Severity::parse("CRITICAL"), Severity::Critical);
        assert_eq!(Severity::parse("bogus"), Severity::Medium);
    }

    #[test]
    fn test_payload_from_stored_alert_without_enrichment() {
        let alert = StoredAlert {
            id: 42,
            alert_type: "Honeypot Triggered".to_string(),
            source_ip: "203.0.113.7".to_string(),
            severity: Severity::Medium,
            enrichment: EnrichmentResult::default(),
            payload: serde_json::json!({}),
            triggered_at: chrono::Utc::now(),
        };

        let payload = alert.to_notification_payload();
        assert_eq!(payload.source_ip, "203.0.113.7");
        assert!(payload.country.is_none());
        assert!(payload.abuse_score.is_none());
        assert_eq!(payload.alert_id, Some(42));
    }

    #[test]
    fn test_render_text_includes_location_and_score() {
        let alert = StoredAlert {
            id: 1,
            alert_type: "Honeypot Triggered".to_string(),
            source_ip: "198.51.100.4".to_string(),
            severity: Severity::High,
            enrichment: EnrichmentResult {
                geo: Some(GeoInfo {
                    country_iso: Some("FR".to_string()),
                    country: Some("France".to_string()),
                    city: Some("Paris".to_string()),
                    latitude: None,
                    longitude: None,
                    timezone: None,
                }),
                reputation_score: Some(82),
            },
            payload: serde_json::json!({}),
            triggered_at: chrono::Utc::now(),
        };

        let text = alert.to_notification_payload().render_text();
        assert!(text.contains("Location: Paris, France"));
        assert!(text.contains("Abuse Score: 82/100"));
        assert!(text.contains("Severity: high"));
    }
}
