//! IP reputation scoring via an AbuseIPDB-style HTTP API

use std::sync::Mutex;
use std::time::{Duration, Instant};

use reqwest::{Client, StatusCode};

/// Client for an AbuseIPDB-compatible reputation API
///
/// Failures degrade to `None` rather than erroring; an HTTP 429 starts a
/// cool-off during which further lookups short-circuit instead of burning
/// more of the provider quota.
pub struct ReputationClient {
    client: Client,
    api_url: String,
    api_key: String,
    max_age_days: u32,
    cooloff: Duration,
    cooloff_until: Mutex<Option<Instant>>,
}

impl ReputationClient {
    pub fn new(api_url: String, api_key: String) -> Self {
        ReputationClient {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            api_url,
            api_key,
            max_age_days: 90,
            cooloff: Duration::from_secs(300),
            cooloff_until: Mutex::new(None),
        }
    }

    fn in_cooloff(&self) -> bool {
        let guard = self.cooloff_until.lock().unwrap();
        matches!(*guard, Some(until) if Instant::now() < until)
    }

    fn start_cooloff(&self) {
        *self.cooloff_until.lock().unwrap() = Some(Instant::now() + self.cooloff);
    }

    /// Query the abuse confidence score (0..=100) for an IP address.
    ///
    /// Returns None on any provider failure: timeout, non-2xx status,
    /// malformed body, or an active rate-limit cool-off.
    pub async fn check_ip(&self, ip: &str) -> Option<u8> {
        if self.in_cooloff() {
            log::debug!("Reputation provider in cool-off, skipping lookup for {}", ip);
            return None;
        }

        log::debug!("Querying reputation provider for IP: {}", ip);

        let response = self
            .client
            .get(&self.api_url)
            .header("Accept", "application/json")
            .header("Key", &self.api_key)
            .query(&[
                ("ipAddress", ip),
                ("maxAgeInDays", &self.max_age_days.to_string()),
            ])
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                log::warn!("Reputation lookup failed for {}: {}", ip, e);
                return None;
            }
        };

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            log::warn!(
                "Reputation provider rate limit hit for {}, backing off for {}s",
                ip,
                self.cooloff.as_secs()
            );
            self.start_cooloff();
            return None;
        }

        if !response.status().is_success() {
            log::warn!(
                "Reputation provider returned HTTP {} for {}",
                response.status(),
                ip
            );
            return None;
        }

        let body: serde_json::Value = match response.json().await {
            Ok(v) => v,
            Err(e) => {
                log::warn!("Malformed reputation response for {}: {}", ip, e);
                return None;
            }
        };

        let score = parse_score(&body);
        match score {
            Some(s) => log::info!("Reputation score for {}: {}", ip, s),
            None => log::warn!("Reputation response for {} missing score data", ip),
        }
        score
    }
}

/// Extract the abuse confidence score from a provider response body.
///
/// A whitelisted IP without a score normalizes to 0.
fn parse_score(body: &serde_json::Value) -> Option<u8> {
    let data = body.get("data")?;

    if let Some(score) = data.get("abuseConfidenceScore").and_then(|v| v.as_u64()) {
        return Some(score.min(100) as u8);
    }

    if data
        .get("isWhitelisted")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
    {
        return Some(0);
    }

    None
}
