//! Measurement records and their line protocol rendering

use std::collections::BTreeMap;
use std::fmt::Write;
use thiserror::Error;

use crate::geo::LocationRecord;
use crate::ingest::parser::ParsedEvent;

pub const MEASUREMENT: &str = "geossh";

/// Tag names set by the collector itself
pub const RESERVED_TAGS: &[&str] = &["geohash", "username", "port", "ip", "location"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("location attribute '{0}' collides with a reserved tag")]
    ReservedTag(String),
}

/// One login occurrence ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRecord {
    pub measurement: String,
    pub fields: BTreeMap<String, f64>,
    pub tags: BTreeMap<String, String>,
}

/// Assemble the record for an enriched event.
///
/// Coordinates never become tags; they only feed `geohash` and are otherwise
/// dropped. A provider attribute named like a reserved tag is rejected.
pub fn build(
    event: &ParsedEvent,
    location: &LocationRecord,
    geohash: &str,
) -> Result<MeasurementRecord, BuildError> {
    if let Some(key) = location
        .attributes
        .keys()
        .find(|key| RESERVED_TAGS.contains(&key.as_str()))
    {
        return Err(BuildError::ReservedTag(key.clone()));
    }

    let mut tags = location.attributes.clone();
    tags.insert("geohash".to_string(), geohash.to_string());
    tags.insert("username".to_string(), event.username.clone());
    tags.insert("port".to_string(), event.source_port.to_string());
    tags.insert("ip".to_string(), event.source_address.to_string());
    tags.insert("location".to_string(), location.description());

    let mut fields = BTreeMap::new();
    fields.insert("value".to_string(), 1.0);

    Ok(MeasurementRecord {
        measurement: MEASUREMENT.to_string(),
        fields,
        tags,
    })
}

impl MeasurementRecord {
    /// Render as one InfluxDB line protocol line, without timestamp.
    ///
    /// Tags with empty values are omitted since the store rejects them.
    /// Backslashes are escaped so a value can never end its own tag.
    pub fn to_line_protocol(&self) -> String {
        let mut line = escape(&self.measurement, &['\\', ',', ' ']);

        for (key, value) in &self.tags {
            if value.is_empty() {
                continue;
            }
            let _ = write!(
                line,
                ",{}={}",
                escape(key, TAG_SPECIAL),
                escape(value, TAG_SPECIAL)
            );
        }

        let fields: Vec<String> = self
            .fields
            .iter()
            .map(|(key, value)| format!("{}={}", escape(key, TAG_SPECIAL), value))
            .collect();
        line.push(' ');
        line.push_str(&fields.join(","));
        line
    }
}

const TAG_SPECIAL: &[char] = &['\\', ',', '=', ' '];

fn escape(raw: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        // Line breaks would end the point; they become (escaped) spaces
        let c = if c == '\n' || c == '\r' { ' ' } else { c };
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
