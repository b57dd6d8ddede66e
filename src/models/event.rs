use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Raw honeypot event as received at the ingestion endpoint.
///
/// The payload mirrors whatever the traffic mirror produces (e.g. WAF log
/// entries), so everything except the source IP is optional. Field names
/// accept both snake_case and the camelCase aliases used by upstream
/// collectors. Immutable once received.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoneypotEvent {
    #[serde(alias = "sourceIp")]
    pub source_ip: String,
    pub timestamp: Option<String>,
    #[serde(alias = "requestId")]
    pub request_id: Option<String>,
    #[serde(alias = "httpMethod")]
    pub http_method: Option<String>,
    pub uri: Option<String>,
    pub headers: Option<HashMap<String, String>>,
    #[serde(alias = "queryString")]
    pub query_string: Option<String>,
    pub body: Option<String>,
    #[serde(alias = "action")]
    pub waf_action: Option<String>,
    #[serde(alias = "ruleGroupList")]
    pub rule_group_list: Option<Vec<String>>,
}

/// Geographic context for an IP address, as far as the database knows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoInfo {
    pub country_iso: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timezone: Option<String>,
}

impl GeoInfo {
    /// Human-readable "City, Country" string for notification bodies.
    pub fn display_location(&self) -> String {
        match (&self.city, &self.country) {
            (Some(city), Some(country)) => format!("{}, {}", city, country),
            (None, Some(country)) => country.clone(),
            (Some(city), None) => city.clone(),
            (None, None) => "unknown".to_string(),
        }
    }
}

/// Outcome of enriching a single IP address.
///
/// A `None` sub-field means the corresponding provider was unavailable or
/// had no data; absence never blocks the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    pub geo: Option<GeoInfo>,
    pub reputation_score: Option<u8>,
}
