//! HTTP geolocation against an ip-api compatible endpoint
//!
//! `GET {base}/{ip}` answers with a flat JSON object. `status: "fail"`
//! means the provider has no data for the address.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::net::IpAddr;
use tracing::debug;

use crate::geo::{GeoLocator, LocationRecord, LookupError};

/// Keys consumed into structured fields or describing the response itself
const NON_DESCRIPTIVE_KEYS: &[&str] = &["lat", "lon", "regionName", "city", "status", "message"];

#[derive(Clone)]
pub struct IpApiLocator {
    base_url: String,
    client: Client,
}

impl IpApiLocator {
    pub fn new(base_url: &str) -> Result<Self, LookupError> {
        let client = Client::builder()
            .user_agent(concat!("geossh/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(base_url, client))
    }

    pub fn with_client(base_url: &str, client: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait]
impl GeoLocator for IpApiLocator {
    async fn lookup(&self, ip: IpAddr) -> Result<Option<LocationRecord>, LookupError> {
        let url = format!("{}/{}", self.base_url, ip);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status(status.as_u16()));
        }

        let body: Value = response.json().await?;
        let Value::Object(body) = body else {
            return Err(LookupError::Decode("expected a JSON object".to_string()));
        };

        Ok(location_from_response(ip, body))
    }
}

fn location_from_response(ip: IpAddr, body: Map<String, Value>) -> Option<LocationRecord> {
    if body.get("status").and_then(Value::as_str) == Some("fail") {
        let reason = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("no reason given");
        debug!("Provider has no data for {}: {}", ip, reason);
        return None;
    }

    let latitude = body.get("lat").and_then(Value::as_f64);
    let longitude = body.get("lon").and_then(Value::as_f64);
    let (Some(latitude), Some(longitude)) = (latitude, longitude) else {
        debug!("Provider response for {} carries no coordinates", ip);
        return None;
    };

    let text = |key: &str| {
        body.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    let attributes: BTreeMap<String, String> = body
        .iter()
        .filter(|(key, _)| !NON_DESCRIPTIVE_KEYS.contains(&key.as_str()))
        .filter_map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some((key.clone(), value))
        })
        .collect();

    Some(LocationRecord {
        latitude,
        longitude,
        region_name: text("regionName"),
        city: text("city"),
        attributes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn ip() -> IpAddr {
        "203.0.113.5".parse().unwrap()
    }

    #[test]
    fn test_success_response() {
        let body = object(json!({
            "status": "success",
            "country": "United Kingdom",
            "countryCode": "GB",
            "regionName": "England",
            "city": "London",
            "zip": null,
            "lat": 51.5,
            "lon": -0.12,
            "mobile": false,
            "query": "203.0.113.5"
        }));

        let location = location_from_response(ip(), body).unwrap();
        assert_eq!(location.latitude, 51.5);
        assert_eq!(location.longitude, -0.12);
        assert_eq!(location.region_name, "England");
        assert_eq!(location.city, "London");
        assert_eq!(location.attributes.get("country").unwrap(), "United Kingdom");
        assert_eq!(location.attributes.get("mobile").unwrap(), "false");
        assert!(!location.attributes.contains_key("zip"));
        assert!(!location.attributes.contains_key("status"));
        assert!(!location.attributes.contains_key("lat"));
        assert!(!location.attributes.contains_key("regionName"));
    }

    #[test]
    fn test_fail_status_is_absent() {
        let body = object(json!({
            "status": "fail",
            "message": "reserved range",
            "query": "10.0.0.1"
        }));
        assert!(location_from_response(ip(), body).is_none());
    }

    #[test]
    fn test_missing_coordinates_is_absent() {
        let body = object(json!({ "status": "success", "city": "Nowhere" }));
        assert!(location_from_response(ip(), body).is_none());
    }
}
