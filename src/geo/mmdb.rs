//! Offline geolocation using a MaxMind GeoLite2/GeoIP2 City MMDB
//!
//! Lookups run against a memory-mapped database, so they never leave the
//! process and cannot fail on transport.

use async_trait::async_trait;
use maxminddb::{geoip2, Mmap, Reader};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;

use crate::geo::{GeoLocator, LocationRecord, LookupError};

/// City database locator
#[derive(Clone)]
pub struct MmdbLocator {
    reader: Arc<Reader<Mmap>>,
}

impl MmdbLocator {
    /// Memory-map the City database at `path`
    pub fn open(path: &str) -> Result<Self, LookupError> {
        let reader = unsafe { Reader::open_mmap(path) }.map_err(|e| {
            LookupError::Database(format!("failed to open GeoIP City database at {path}: {e}"))
        })?;

        Ok(Self {
            reader: Arc::new(reader),
        })
    }

    fn extract(city: &geoip2::City) -> Option<LocationRecord> {
        let latitude = city.location.latitude?;
        let longitude = city.location.longitude?;

        let region_name = city
            .subdivisions
            .first()
            .and_then(|s| s.names.english)
            .unwrap_or_default();

        // Same attribute names as the HTTP provider so series stay comparable
        let mut attributes = BTreeMap::new();
        if let Some(name) = city.country.names.english {
            attributes.insert("country".to_string(), name.to_string());
        }
        if let Some(code) = city.country.iso_code {
            attributes.insert("countryCode".to_string(), code.to_string());
        }
        if let Some(tz) = city.location.time_zone {
            attributes.insert("timezone".to_string(), tz.to_string());
        }

        Some(LocationRecord {
            latitude,
            longitude,
            region_name: region_name.to_string(),
            city: city.city.names.english.unwrap_or_default().to_string(),
            attributes,
        })
    }
}

#[async_trait]
impl GeoLocator for MmdbLocator {
    async fn lookup(&self, ip: IpAddr) -> Result<Option<LocationRecord>, LookupError> {
        let result = self
            .reader
            .lookup(ip)
            .map_err(|e| LookupError::Database(e.to_string()))?;

        match result.decode::<geoip2::City>() {
            Ok(Some(city)) => Ok(Self::extract(&city)),
            Ok(None) => Ok(None),
            Err(e) => Err(LookupError::Database(e.to_string())),
        }
    }
}
