//! Data models for geolocation

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Geographic location resolved for a source address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub latitude: f64,

    pub longitude: f64,

    /// Region/state/province
    pub region_name: String,

    pub city: String,

    /// Provider-specific descriptive attributes (country, isp, timezone, ...)
    ///
    /// Keys are emitted verbatim as metric tags.
    pub attributes: BTreeMap<String, String>,
}

impl LocationRecord {
    pub fn new(latitude: f64, longitude: f64, region_name: &str, city: &str) -> Self {
        Self {
            latitude,
            longitude,
            region_name: region_name.to_string(),
            city: city.to_string(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: &str, value: &str) -> Self {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }

    /// Human readable "region, city" string
    pub fn description(&self) -> String {
        format!("{}, {}", self.region_name, self.city)
    }
}
