pub mod config;
pub mod editor;
pub mod error;
pub mod handlers;
pub mod osrm;
pub mod polyline;
pub mod store;
pub mod sync;
pub mod telemetry;
pub mod types;
