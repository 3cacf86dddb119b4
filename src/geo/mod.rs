//! Source address geolocation
//!
//! A [`GeoLocator`] resolves an address to a [`LocationRecord`]. "No
//! location known" is `Ok(None)`, not an error; only transport or provider
//! failures are reported as [`LookupError`].

pub mod cached;
pub mod geohash;
pub mod ipapi;
pub mod mmdb;
pub mod models;

pub use cached::CachedLocator;
pub use ipapi::IpApiLocator;
pub use mmdb::MmdbLocator;
pub use models::LocationRecord;

use async_trait::async_trait;
use std::net::IpAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("geolocation request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("geolocation provider returned HTTP {0}")]
    Status(u16),
    #[error("malformed geolocation response: {0}")]
    Decode(String),
    #[error("GeoIP database error: {0}")]
    Database(String),
}

#[async_trait]
pub trait GeoLocator: Send + Sync {
    /// Resolve `ip`, returning `Ok(None)` when the provider knows nothing about it
    async fn lookup(&self, ip: IpAddr) -> Result<Option<LocationRecord>, LookupError>;
}

/// Build the configured provider, wrapped in a cache when a TTL is set
pub fn locator_from_config(
    config: &crate::config::GeoIpConfig,
) -> anyhow::Result<std::sync::Arc<dyn GeoLocator>> {
    use crate::config::GeoIpProvider;
    use anyhow::Context;
    use std::sync::Arc;

    let locator: Arc<dyn GeoLocator> = match config.provider {
        GeoIpProvider::IpApi => {
            tracing::info!("Using HTTP geolocation provider: {}", config.api_url);
            Arc::new(IpApiLocator::new(&config.api_url)?)
        }
        GeoIpProvider::Mmdb => {
            let path = config
                .db_path
                .as_deref()
                .context("GEOIP_DB_PATH must be set when GEOIP_PROVIDER=mmdb")?;
            tracing::info!("Using GeoIP City database: {}", path);
            Arc::new(MmdbLocator::open(path)?)
        }
    };

    if config.cache_ttl_secs == 0 {
        return Ok(locator);
    }

    tracing::info!(
        "Caching geolocation results for {}s (capacity {})",
        config.cache_ttl_secs,
        config.cache_capacity
    );
    Ok(Arc::new(CachedLocator::new(
        locator,
        config.cache_capacity,
        std::time::Duration::from_secs(config.cache_ttl_secs),
    )))
}
