//! Per-payload enrichment pipeline
//!
//! parse -> geolocate -> geohash -> build -> dispatch. Every failure is
//! logged here and reported as an [`Outcome`]; nothing escapes to the
//! listener.

use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::geo::{geohash, GeoLocator};
use crate::ingest::parser::PayloadGrammar;
use crate::metrics::{build, MetricSink};

/// How one payload ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A point was handed to the sink (delivery itself is best-effort)
    Dispatched,
    ParseFailed,
    /// The provider had no location for the address
    NoLocation,
    LookupFailed,
    /// Coordinates or attributes could not be turned into a point
    Rejected,
}

pub struct Pipeline {
    grammar: PayloadGrammar,
    locator: Arc<dyn GeoLocator>,
    sink: MetricSink,
    geohash_precision: usize,
}

impl Pipeline {
    pub fn new(
        grammar: PayloadGrammar,
        locator: Arc<dyn GeoLocator>,
        sink: MetricSink,
        geohash_precision: usize,
    ) -> Self {
        Self {
            grammar,
            locator,
            sink,
            geohash_precision,
        }
    }

    pub async fn process(&self, raw: &[u8]) -> Outcome {
        debug!("Received data {:?}", String::from_utf8_lossy(raw));

        let event = match self.grammar.parse(raw) {
            Ok(event) => event,
            Err(e) => {
                warn!("Dropping unparseable payload: {}", e);
                return Outcome::ParseFailed;
            }
        };
        debug!(
            "Parsed {} {} {}",
            event.username, event.source_address, event.source_port
        );

        let location = match self.locator.lookup(event.source_address).await {
            Ok(Some(location)) => location,
            Ok(None) => {
                error!(
                    "No location data retrieved for {}, cannot continue",
                    event.source_address
                );
                return Outcome::NoLocation;
            }
            Err(e) => {
                error!("Geolocation lookup for {} failed: {}", event.source_address, e);
                return Outcome::LookupFailed;
            }
        };

        let hash = match geohash::encode(
            location.latitude,
            location.longitude,
            self.geohash_precision,
        ) {
            Ok(hash) => hash,
            Err(e) => {
                error!("Cannot geohash location of {}: {}", event.source_address, e);
                return Outcome::Rejected;
            }
        };
        debug!(
            "Geohashing with lat: {}, lon: {}: {}",
            location.latitude, location.longitude, hash
        );

        match build(&event, &location, &hash) {
            Ok(record) => {
                self.sink.dispatch(record);
                Outcome::Dispatched
            }
            Err(e) => {
                warn!("Dropping event from {}: {}", event.source_address, e);
                Outcome::Rejected
            }
        }
    }
}
