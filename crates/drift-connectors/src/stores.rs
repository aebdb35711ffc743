//! Object-store wiring for remote partitions.
//!
//! DataFusion resolves a table URL to an object store by scheme and
//! authority, so one store is registered per HTTP origin and per S3 bucket
//! found in the catalog. Local paths use the built-in filesystem store.

use std::collections::BTreeSet;
use std::sync::Arc;

use datafusion::execution::runtime_env::RuntimeEnv;
use drift_core::{PartitionCatalog, PartitionLocation};
use object_store::http::HttpBuilder;
use tracing::info;
use url::Url;

use crate::error::ConnectorError;
use crate::s3::{build_store, S3Config};

/// Register every remote store the catalog needs; returns how many were added.
pub fn register_catalog_stores(
    runtime: &RuntimeEnv,
    catalog: &PartitionCatalog,
    s3: Option<&S3Config>,
) -> Result<usize, ConnectorError> {
    let mut origins = BTreeSet::new();
    let mut buckets = BTreeSet::new();
    for (_, location) in catalog.iter() {
        match location {
            PartitionLocation::Local(_) => {}
            PartitionLocation::Http(url) => {
                origins.insert(store_root(url)?);
            }
            PartitionLocation::S3(url) => {
                buckets.insert(store_root(url)?);
            }
        }
    }

    for origin in &origins {
        let store = HttpBuilder::new()
            .with_url(origin.as_str())
            .build()
            .map_err(|e| ConnectorError::ConfigError(format!("http store {}: {}", origin, e)))?;
        runtime.register_object_store(origin, Arc::new(store));
        info!("Registered HTTP object store for {}", origin);
    }

    for root in &buckets {
        let bucket = root
            .host_str()
            .ok_or_else(|| ConnectorError::InvalidLocation(root.to_string()))?;
        let store = build_store(s3, bucket)?;
        runtime.register_object_store(root, Arc::new(store));
        info!("Registered S3 object store for bucket '{}'", bucket);
    }

    Ok(origins.len() + buckets.len())
}

/// `scheme://authority` of a location, the key DataFusion looks stores up by.
fn store_root(url: &Url) -> Result<Url, ConnectorError> {
    let host = url
        .host_str()
        .ok_or_else(|| ConnectorError::InvalidLocation(url.to_string()))?;
    let root = match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    };
    Url::parse(&root).map_err(|e| ConnectorError::InvalidLocation(format!("{}: {}", url, e)))
}
