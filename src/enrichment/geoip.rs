//! IP geolocation using a MaxMind GeoLite2-City database
//!
//! The database file must be downloaded separately (free with MaxMind
//! registration). A missing file disables geo enrichment entirely rather
//! than failing requests.

use maxminddb::{geoip2, Reader};
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::models::GeoInfo;

/// Errors that can occur during geolocation lookups
#[derive(Error, Debug)]
pub enum GeoError {
    #[error("Failed to open database: {0}")]
    DatabaseOpen(#[from] maxminddb::MaxMindDBError),

    #[error("IP address not found in database")]
    NotFound,

    #[error("Database file not found: {0}")]
    FileNotFound(String),
}

/// GeoIP lookup service backed by a memory-loaded MaxMind City database
///
/// Lookups are synchronous and CPU/IO-bound at the library level; callers
/// inside async code must offload them (see `EnrichmentService`).
pub struct GeoIpService {
    reader: Arc<Reader<Vec<u8>>>,
}

impl GeoIpService {
    /// Open the database at `db_path`, loading it once for the process
    /// lifetime.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, GeoError> {
        let path = db_path.as_ref();
        if !path.exists() {
            return Err(GeoError::FileNotFound(path.display().to_string()));
        }

        let reader = Reader::open_readfile(path)?;
        Ok(GeoIpService {
            reader: Arc::new(reader),
        })
    }

    /// Look up geographic data for an IP address.
    pub fn lookup(&self, ip: IpAddr) -> Result<GeoInfo, GeoError> {
        let city: geoip2::City = self.reader.lookup(ip).map_err(|e| match e {
            maxminddb::MaxMindDBError::AddressNotFoundError(_) => GeoError::NotFound,
            other => GeoError::DatabaseOpen(other),
        })?;

        let location = city.location.as_ref();

        Ok(GeoInfo {
            country_iso: city
                .country
                .as_ref()
                .and_then(|c| c.iso_code)
                .map(String::from),
            country: city
                .country
                .as_ref()
                .and_then(|c| c.names.as_ref())
                .and_then(|n| n.get("en").copied())
                .map(String::from),
            city: city
                .city
                .as_ref()
                .and_then(|c| c.names.as_ref())
                .and_then(|n| n.get("en").copied())
                .map(String::from),
            latitude: location.and_then(|l| l.latitude),
            longitude: location.and_then(|l| l.longitude),
            timezone: location.and_then(|l| l.time_zone).map(String::from),
        })
    }

    /// Look up an IP address, returning None instead of an error.
    pub fn lookup_optional(&self, ip: IpAddr) -> Option<GeoInfo> {
        self.lookup(ip).ok()
    }
}

impl Clone for GeoIpService {
    fn clone(&self) -> Self {
        GeoIpService {
            reader: Arc::clone(&self.reader),
        }
    }
}
