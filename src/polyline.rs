//! Encoded polyline format (precision 5), as returned in OSRM `geometry`.

use thiserror::Error;
use tracing::{instrument, trace};

use crate::types::Coordinate;

const FACTOR: f64 = 1e5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolylineError {
    #[error("byte {byte:#04x} at position {position} is not a polyline character")]
    InvalidCharacter { position: usize, byte: u8 },
    #[error("polyline ends in the middle of a value")]
    Truncated,
    #[error("polyline holds a latitude without a longitude")]
    UnpairedValue,
    #[error("polyline value at position {position} does not fit in 64 bits")]
    Overflow { position: usize },
}

/// Decodes `encoded` into an ordered list of `(lat, lng)` pairs.
#[instrument(level = "trace", skip_all, fields(len = encoded.len()))]
pub fn decode(encoded: &str) -> Result<Vec<Coordinate>, PolylineError> {
    let bytes = encoded.as_bytes();
    let mut index = 0;
    let mut lat: i64 = 0;
    let mut lng: i64 = 0;
    let mut coordinates = Vec::new();

    while index < bytes.len() {
        lat = accumulate(lat, bytes, &mut index)?;
        if index >= bytes.len() {
            return Err(PolylineError::UnpairedValue);
        }
        lng = accumulate(lng, bytes, &mut index)?;
        coordinates.push((lat as f64 / FACTOR, lng as f64 / FACTOR));
    }

    trace!("Decoded {} coordinates", coordinates.len());
    Ok(coordinates)
}

/// Encodes `(lat, lng)` pairs, rounding each to five decimal places.
#[cfg(test)]
pub(crate) fn encode(coordinates: &[Coordinate]) -> String {
    let mut encoded = String::new();
    let mut prev_lat: i64 = 0;
    let mut prev_lng: i64 = 0;

    for &(lat, lng) in coordinates {
        let lat = (lat * FACTOR).round() as i64;
        let lng = (lng * FACTOR).round() as i64;
        push_value(lat - prev_lat, &mut encoded);
        push_value(lng - prev_lng, &mut encoded);
        prev_lat = lat;
        prev_lng = lng;
    }

    encoded
}

fn accumulate(total: i64, bytes: &[u8], index: &mut usize) -> Result<i64, PolylineError> {
    let position = *index;
    total
        .checked_add(next_value(bytes, index)?)
        .ok_or(PolylineError::Overflow { position })
}

fn next_value(bytes: &[u8], index: &mut usize) -> Result<i64, PolylineError> {
    let start = *index;
    let mut result: u64 = 0;
    let mut shift = 0;

    loop {
        let Some(&byte) = bytes.get(*index) else {
            return Err(PolylineError::Truncated);
        };
        if !(63..=126).contains(&byte) {
            return Err(PolylineError::InvalidCharacter {
                position: *index,
                byte,
            });
        }
        if shift > 55 {
            return Err(PolylineError::Overflow { position: start });
        }
        *index += 1;

        let chunk = (byte - 63) as u64;
        result |= (chunk & 0x1f) << shift;
        shift += 5;
        if chunk < 0x20 {
            break;
        }
    }

    // zigzag
    let value = (result >> 1) as i64;
    Ok(if result & 1 == 1 { !value } else { value })
}

#[cfg(test)]
fn push_value(value: i64, encoded: &mut String) {
    let mut value = ((value << 1) ^ (value >> 63)) as u64;
    while value >= 0x20 {
        encoded.push((((value & 0x1f) | 0x20) as u8 + 63) as char);
        value >>= 5;
    }
    encoded.push((value as u8 + 63) as char);
}
