use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::geo::geohash::{DEFAULT_PRECISION, MAX_PRECISION};
use crate::ingest::parser::PayloadGrammar;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub listener: ListenerConfig,
    pub log_level: String,
    pub grammar: PayloadGrammar,
    pub geohash_precision: usize,
    pub geoip: GeoIpConfig,
    pub influx: InfluxConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeoIpProvider {
    IpApi,
    Mmdb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoIpConfig {
    pub provider: GeoIpProvider,
    pub api_url: String,
    /// Path to a MaxMind GeoLite2-City/GeoIP2-City database
    pub db_path: Option<String>,
    /// Zero disables the lookup cache
    pub cache_ttl_secs: u64,
    pub cache_capacity: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfluxConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
}

impl InfluxConfig {
    const fn default_port() -> u16 {
        8086
    }

    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }
}

impl GeoIpConfig {
    const fn default_cache_capacity() -> u64 {
        10_000
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_vars<F>(var: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = var("LISTEN_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = var("PORT")
            .unwrap_or_else(|| "7070".to_string())
            .parse::<u16>()
            .context("PORT must be a valid port number")?;

        let log_level = var("DEBUG_LEVEL").unwrap_or_else(|| "info".to_string());

        let grammar = match var("PAYLOAD_DELIMITER") {
            None => PayloadGrammar::default(),
            Some(raw) => {
                let mut chars = raw.chars();
                match (chars.next(), chars.next()) {
                    (Some(delimiter), None) => PayloadGrammar::delimited(delimiter),
                    _ => bail!("PAYLOAD_DELIMITER must be exactly one character, got '{raw}'"),
                }
            }
        };

        let geohash_precision = match var("GEOHASH_PRECISION") {
            Some(raw) => raw
                .parse::<usize>()
                .context("GEOHASH_PRECISION must be an integer")?,
            None => DEFAULT_PRECISION,
        };
        if !(1..=MAX_PRECISION).contains(&geohash_precision) {
            bail!("GEOHASH_PRECISION must be between 1 and {MAX_PRECISION}, got {geohash_precision}");
        }

        let provider = match var("GEOIP_PROVIDER")
            .unwrap_or_else(|| "ipapi".to_string())
            .to_lowercase()
            .as_str()
        {
            "ipapi" | "ip-api" => GeoIpProvider::IpApi,
            "mmdb" | "maxmind" => GeoIpProvider::Mmdb,
            other => {
                tracing::warn!(
                    "Unknown GEOIP_PROVIDER '{other}', falling back to 'ipapi'. Supported values: ipapi, mmdb"
                );
                GeoIpProvider::IpApi
            }
        };

        let db_path = var("GEOIP_DB_PATH");
        if provider == GeoIpProvider::Mmdb && db_path.is_none() {
            bail!("GEOIP_DB_PATH must be set when GEOIP_PROVIDER=mmdb");
        }

        let cache_ttl_secs = var("GEOIP_CACHE_TTL_SECS")
            .map(|v| v.parse::<u64>())
            .transpose()
            .context("GEOIP_CACHE_TTL_SECS must be an integer")?
            .unwrap_or(0);
        let cache_capacity = var("GEOIP_CACHE_CAPACITY")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or_else(GeoIpConfig::default_cache_capacity);

        let influx_host = var("INFLUX_HOST")
            .or_else(|| var("INFLUX_URL"))
            .unwrap_or_else(|| "localhost".to_string());
        // An unparseable port silently falls back to the default
        let influx_port = var("INFLUX_PORT")
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or_else(InfluxConfig::default_port);

        Ok(Config {
            listener: ListenerConfig { host, port },
            log_level,
            grammar,
            geohash_precision,
            geoip: GeoIpConfig {
                provider,
                api_url: var("GEOIP_API_URL")
                    .unwrap_or_else(|| "http://ip-api.com/json".to_string()),
                db_path,
                cache_ttl_secs,
                cache_capacity,
            },
            influx: InfluxConfig {
                protocol: var("INFLUX_PROTOCOL").unwrap_or_else(|| "http".to_string()),
                host: influx_host,
                port: influx_port,
                username: var("INFLUX_USER").unwrap_or_else(|| "root".to_string()),
                password: var("INFLUX_PWD").unwrap_or_else(|| "root".to_string()),
                database: var("INFLUX_DB").unwrap_or_else(|| "geossh".to_string()),
            },
        })
    }
}
