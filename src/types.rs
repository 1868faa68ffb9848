use serde::{Deserialize, Serialize};

/// A `(lat, lng)` pair as produced by the polyline decoder.
pub type Coordinate = (f64, f64);

/// A user-placed point the route must pass through.
///
/// Two waypoints are the same waypoint only when both coordinates are exactly
/// equal; there is no separate identifier.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    pub lat: f64,
    pub lng: f64,
}

impl Waypoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

impl From<Waypoint> for Coordinate {
    fn from(point: Waypoint) -> Self {
        (point.lat, point.lng)
    }
}

/// Body of a marker drag-end event.
#[derive(Deserialize, Serialize, Debug)]
pub struct MoveRequest {
    pub from: Waypoint,
    pub to: Waypoint,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct MoveResponse {
    pub replaced: usize,
}
