//! Drift Core - DataFusion engine, spatial UDFs and static lookups
//!
//! This crate provides the pieces every trajectory query relies on: the
//! partition catalog mapping calendar keys to GeoParquet files, the
//! DataFusion engine with the spatial functions the planner emits, and the
//! continent registry used to classify features.

pub mod catalog;
pub mod continents;
pub mod engine;
pub mod udf;

pub use catalog::{
    CatalogConfig, CatalogError, Granularity, PartitionCatalog, PartitionKey, PartitionLocation,
};
pub use continents::{ContinentRegion, ContinentRegistry, UNKNOWN_REGION};
pub use engine::{TrajectoryEngine, PARTITION_TABLE};

// Re-export for downstream consumers
pub use datafusion::arrow::record_batch::RecordBatch;
