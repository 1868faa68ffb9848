use thiserror::Error;

use crate::polyline::PolylineError;

/// Everything that can make a route computation fail.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("at least two waypoints are required to route, got {0}")]
    TooFewWaypoints(usize),
    #[error("routing request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("routing backend answered with status {0}")]
    Status(reqwest::StatusCode),
    #[error("routing backend returned code {code}: {message}")]
    Backend { code: String, message: String },
    #[error("routing backend returned no routes")]
    NoRoute,
    #[error("routing backend panicked")]
    Panicked,
    #[error("malformed route geometry: {0}")]
    Geometry(#[from] PolylineError),
}
