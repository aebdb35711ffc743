//! Drift Connectors - Partition file access
//!
//! This crate decides whether a partition file exists and wires the object
//! stores DataFusion needs to read it:
//! - local files
//! - HTTP(S) (anonymous `HEAD` / range reads)
//! - S3 (via object_store, signed or anonymous)

pub mod error;
pub mod probe;
pub mod s3;
pub mod stores;

pub use error::ConnectorError;
pub use probe::LocationProbe;
pub use s3::{build_store, parse_s3_uri, S3Config};
pub use stores::register_catalog_stores;

use async_trait::async_trait;
use drift_core::PartitionLocation;

/// Existence check for partition files.
///
/// `Ok(false)` means the file is definitely absent (missing path, non-200
/// `HEAD`, S3 `NotFound`); `Err` means the check itself could not complete.
#[async_trait]
pub trait PartitionProbe: Send + Sync {
    async fn exists(&self, location: &PartitionLocation) -> Result<bool, ConnectorError>;
}
