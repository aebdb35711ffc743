//! Drift Server - HTTP API for trajectory queries
//!
//! Each request is validated, planned into per-partition queries, fanned out
//! over the engine and assembled into a GeoJSON FeatureCollection.

pub mod assemble;
pub mod config;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod routes;
pub mod rows;
pub mod state;

#[cfg(test)]
mod testing;

pub use config::ServerArgs;
pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
