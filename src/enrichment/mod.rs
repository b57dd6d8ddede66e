//! Event enrichment: GeoIP and IP-reputation lookups
//!
//! `EnrichmentService::enrich` never fails; a provider outage degrades
//! the corresponding field to None. Results are memoized per raw IP
//! string in a bounded TTL cache so repeat offenders don't trigger
//! repeated external calls.

pub mod geoip;
pub mod reputation;

pub use geoip::{GeoError, GeoIpService};
pub use reputation::ReputationClient;

use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::TtlCache;
use crate::models::{EnrichmentResult, GeoInfo};

/// Geolocation lookup seam. Implementations may block; the service
/// offloads calls to the blocking pool.
pub trait GeoProvider: Send + Sync {
    fn lookup(&self, ip: IpAddr) -> Option<GeoInfo>;
}

impl GeoProvider for GeoIpService {
    fn lookup(&self, ip: IpAddr) -> Option<GeoInfo> {
        self.lookup_optional(ip)
    }
}

/// Reputation lookup seam.
pub trait ReputationProvider: Send + Sync {
    fn check_ip<'a>(&'a self, ip: &'a str)
        -> Pin<Box<dyn Future<Output = Option<u8>> + Send + 'a>>;
}

impl ReputationProvider for ReputationClient {
    fn check_ip<'a>(
        &'a self,
        ip: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<u8>> + Send + 'a>> {
        Box::pin(self.check_ip(ip))
    }
}

/// Combines geo and reputation lookups behind a single infallible call
pub struct EnrichmentService {
    geo: Option<Arc<dyn GeoProvider>>,
    reputation: Option<Arc<dyn ReputationProvider>>,
    cache: TtlCache<EnrichmentResult>,
}

impl EnrichmentService {
    pub fn new(
        geo: Option<Arc<dyn GeoProvider>>,
        reputation: Option<Arc<dyn ReputationProvider>>,
        cache_size: usize,
        cache_ttl: Duration,
    ) -> Self {
        if geo.is_none() {
            log::warn!("Geo database not configured, geo enrichment disabled");
        }
        if reputation.is_none() {
            log::warn!("Reputation API not configured, reputation enrichment disabled");
        }
        EnrichmentService {
            geo,
            reputation,
            cache: TtlCache::new(cache_size, cache_ttl),
        }
    }

    /// Enrich an IP address with geo and reputation context.
    ///
    /// The two lookups run independently; an outage on one side never
    /// blocks the other. Never fails.
    pub async fn enrich(&self, ip: &str) -> EnrichmentResult {
        if let Some(cached) = self.cache.get(ip) {
            log::debug!("Enrichment cache hit for {}", ip);
            return cached;
        }

        let (geo, reputation_score) =
            tokio::join!(self.lookup_geo(ip), self.lookup_reputation(ip));

        let result = EnrichmentResult {
            geo,
            reputation_score,
        };
        self.cache.set(ip, result.clone());
        result
    }

    async fn lookup_geo(&self, ip: &str) -> Option<GeoInfo> {
        let provider = Arc::clone(self.geo.as_ref()?);
        let addr = match IpAddr::from_str(ip) {
            Ok(addr) => addr,
            Err(_) => {
                log::warn!("Geo lookup skipped, not a valid IP: {}", ip);
                return None;
            }
        };

        // The maxminddb read is blocking; keep it off the async workers
        match tokio::task::spawn_blocking(move || provider.lookup(addr)).await {
            Ok(geo) => geo,
            Err(e) => {
                log::warn!("Geo lookup task failed for {}: {}", ip, e);
                None
            }
        }
    }

    async fn lookup_reputation(&self, ip: &str) -> Option<u8> {
        self.reputation.as_ref()?.check_ip(ip).await
    }

    pub fn cache_stats(&self) -> crate::cache::CacheStats {
        self.cache.stats()
    }
}
