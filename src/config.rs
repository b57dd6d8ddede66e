use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::alerting::RetryPolicy;

/// Configuration for the HiveWatch daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub rate_limit: RateLimitConfig,
    pub cache: CacheConfig,
    pub enrichment: EnrichmentConfig,
    pub alerting: AlertingConfig,
    pub persistence: PersistenceConfig,
    pub pipeline: PipelineConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

/// Request rate limiting (per client IP at the HTTP boundary)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window_seconds: u64,
}

/// HTTP response cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub max_size: usize,
    pub default_ttl_seconds: u64,
}

/// Enrichment provider configuration
///
/// A missing GeoIP database path or reputation API key disables the
/// corresponding lookup rather than failing requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    pub geoip_db_path: Option<PathBuf>,
    pub reputation_api_url: Option<String>,
    pub reputation_api_key: Option<String>,
    pub cache_size: usize,
    pub cache_ttl_seconds: u64,
}

/// Notification channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertingConfig {
    pub enabled: bool,
    /// Cap on dispatches per window for the throttled convenience path
    pub max_dispatches: usize,
    pub dispatch_window_seconds: u64,
    pub retry: RetryConfig,
    pub slack: Option<SlackConfig>,
    pub discord: Option<DiscordConfig>,
    pub email: Option<EmailConfig>,
}

/// Per-channel retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub total_budget_seconds: u64,
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            total_budget: Duration::from_secs(self.total_budget_seconds),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    pub webhook_url: String,
    pub channel: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub webhook_url: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub use_tls: bool,
    pub from_name: String,
    pub from_email: String,
    pub recipients: Vec<String>,
}

/// Alert storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    pub db_path: PathBuf,
}

/// Ingestion pipeline worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub workers: usize,
    pub queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
            },
            rate_limit: RateLimitConfig {
                max_requests: 100,
                window_seconds: 60,
            },
            cache: CacheConfig {
                max_size: 1000,
                default_ttl_seconds: 60,
            },
            enrichment: EnrichmentConfig {
                geoip_db_path: Some(PathBuf::from("GeoLite2-City.mmdb")),
                reputation_api_url: Some("https://api.abuseipdb.com/api/v2/check".to_string()),
                reputation_api_key: None,
                cache_size: 1024,
                cache_ttl_seconds: 900,
            },
            alerting: AlertingConfig {
                enabled: true,
                max_dispatches: 30,
                dispatch_window_seconds: 60,
                retry: RetryConfig {
                    max_attempts: 3,
                    base_delay_ms: 500,
                    max_delay_ms: 10_000,
                    total_budget_seconds: 30,
                },
                slack: None,
                discord: None,
                email: None,
            },
            persistence: PersistenceConfig {
                db_path: PathBuf::from("hivewatch.db"),
            },
            pipeline: PipelineConfig {
                workers: 4,
                queue_capacity: 256,
            },
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_roundtrips_through_toml() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.server.port, config.server.port);
        assert_eq!(parsed.rate_limit.max_requests, 100);
        assert!(parsed.alerting.slack.is_none());
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.alerting.slack = Some(SlackConfig {
            webhook_url: "https://hooks.slack.example/T/B/X".to_string(),
            channel: Some("#security".to_string()),
            username: None,
        });
        config.to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(
            loaded.alerting.slack.unwrap().channel.as_deref(),
            Some("#security")
        );
    }

    #[test]
    fn test_retry_config_to_policy() {
        let retry = RetryConfig {
            max_attempts: 5,
            base_delay_ms: 100,
            max_delay_ms: 2000,
            total_budget_seconds: 20,
        };
        let policy = retry.to_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_delay, Duration::from_millis(100));
        assert_eq!(policy.total_budget, Duration::from_secs(20));
    }
}
