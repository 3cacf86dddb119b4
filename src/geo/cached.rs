//! Lookup cache in front of any [`GeoLocator`]
//!
//! Both found and absent results are cached; errors are not.

use async_trait::async_trait;
use moka::future::Cache;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::geo::{GeoLocator, LocationRecord, LookupError};

pub struct CachedLocator {
    inner: Arc<dyn GeoLocator>,
    cache: Cache<IpAddr, Option<LocationRecord>>,
}

impl CachedLocator {
    pub fn new(inner: Arc<dyn GeoLocator>, max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        Self { inner, cache }
    }
}

#[async_trait]
impl GeoLocator for CachedLocator {
    async fn lookup(&self, ip: IpAddr) -> Result<Option<LocationRecord>, LookupError> {
        if let Some(cached) = self.cache.get(&ip).await {
            debug!("Geolocation cache hit for {}", ip);
            return Ok(cached);
        }

        let location = self.inner.lookup(ip).await?;
        self.cache.insert(ip, location.clone()).await;
        Ok(location)
    }
}
