//! Geohash encoding
//!
//! Longitude and latitude ranges are bisected alternately, longitude first,
//! and every five bits select one character of the base-32 alphabet. A
//! coordinate lying exactly on a bisection midpoint falls into the lower
//! half.

use thiserror::Error;

const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

pub const DEFAULT_PRECISION: usize = 9;
pub const MAX_PRECISION: usize = 12;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeohashError {
    #[error("latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("longitude {0} is outside [-180, 180]")]
    LongitudeOutOfRange(f64),
    #[error("precision {0} is outside 1..={MAX_PRECISION}")]
    InvalidPrecision(usize),
}

/// Encode a coordinate pair into a geohash of `precision` characters
pub fn encode(latitude: f64, longitude: f64, precision: usize) -> Result<String, GeohashError> {
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(GeohashError::LatitudeOutOfRange(latitude));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(GeohashError::LongitudeOutOfRange(longitude));
    }
    if precision == 0 || precision > MAX_PRECISION {
        return Err(GeohashError::InvalidPrecision(precision));
    }

    let mut lat_range = (-90.0_f64, 90.0_f64);
    let mut lon_range = (-180.0_f64, 180.0_f64);
    let mut hash = String::with_capacity(precision);
    let mut even_bit = true;

    while hash.len() < precision {
        let mut index = 0usize;
        for _ in 0..5 {
            let (value, range) = if even_bit {
                (longitude, &mut lon_range)
            } else {
                (latitude, &mut lat_range)
            };
            let mid = (range.0 + range.1) / 2.0;
            if value > mid {
                index = (index << 1) | 1;
                range.0 = mid;
            } else {
                index <<= 1;
                range.1 = mid;
            }
            even_bit = !even_bit;
        }
        hash.push(BASE32[index] as char);
    }

    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vectors() {
        assert_eq!(encode(57.64911, 10.40744, 11).unwrap(), "u4pruydqqvj");
        assert_eq!(encode(42.6, -5.6, 5).unwrap(), "ezs42");
        assert_eq!(encode(51.5, -0.12, DEFAULT_PRECISION).unwrap(), "gcpuvr295");
    }

    #[test]
    fn test_extremes() {
        assert_eq!(encode(-90.0, -180.0, 4).unwrap(), "0000");
        assert_eq!(encode(90.0, 180.0, 4).unwrap(), "zzzz");
        assert_eq!(encode(0.0, 0.0, 5).unwrap(), "7zzzz");
    }

    #[test]
    fn test_prefix_property() {
        let long = encode(-33.8688, 151.2093, 12).unwrap();
        let short = encode(-33.8688, 151.2093, 6).unwrap();
        assert!(long.starts_with(&short));
    }

    #[test]
    fn test_deterministic_and_distinct() {
        let a = encode(51.5, -0.12, 9).unwrap();
        assert_eq!(a, encode(51.5, -0.12, 9).unwrap());
        assert_ne!(a, encode(48.8566, 2.3522, 9).unwrap());
    }

    #[test]
    fn test_out_of_range() {
        assert_eq!(
            encode(90.5, 0.0, 9),
            Err(GeohashError::LatitudeOutOfRange(90.5))
        );
        assert_eq!(
            encode(0.0, -180.1, 9),
            Err(GeohashError::LongitudeOutOfRange(-180.1))
        );
        assert!(matches!(
            encode(f64::NAN, 0.0, 9),
            Err(GeohashError::LatitudeOutOfRange(_))
        ));
        assert_eq!(encode(0.0, 0.0, 0), Err(GeohashError::InvalidPrecision(0)));
        assert_eq!(encode(0.0, 0.0, 13), Err(GeohashError::InvalidPrecision(13)));
    }
}
