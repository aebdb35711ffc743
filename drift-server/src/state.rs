//! Shared application state, built once at startup.

use std::sync::Arc;

use anyhow::{Context, Result};
use drift_cache::{FileResultCache, NoopCache, ResultCache};
use drift_connectors::{register_catalog_stores, LocationProbe, PartitionProbe, S3Config};
use drift_core::{ContinentRegistry, PartitionCatalog, TrajectoryEngine};
use tracing::info;

use crate::config::ServerArgs;
use crate::executor::{EngineRunner, ExecutorConfig, FanOutExecutor};
use crate::metrics::ServerMetrics;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<PartitionCatalog>,
    pub geocoder: Arc<ContinentRegistry>,
    pub executor: FanOutExecutor,
    pub cache: Arc<dyn ResultCache>,
    pub metrics: ServerMetrics,
}

impl AppState {
    pub fn build(args: &ServerArgs) -> Result<Self> {
        let catalog = PartitionCatalog::build(&args.catalog_config()?)
            .context("Invalid partition catalog configuration")?;
        info!(
            "Catalog has {} partitions ({:?}), tracks served from {}",
            catalog.len(),
            catalog.granularity(),
            catalog.default_key()
        );

        let s3 = S3Config::from_env().ok();
        let engine = TrajectoryEngine::new().context("Failed to create query engine")?;
        let stores = register_catalog_stores(engine.runtime(), &catalog, s3.as_ref())?;
        info!("Registered {} remote object stores", stores);

        let probe = LocationProbe::new(s3)?;
        let cache: Arc<dyn ResultCache> = if args.enable_cache {
            info!("Result cache enabled at {}", args.cache_dir.display());
            Arc::new(FileResultCache::new(&args.cache_dir)?)
        } else {
            Arc::new(NoopCache)
        };

        Ok(Self::new(
            catalog,
            Arc::new(probe),
            engine,
            args.executor_config(),
            cache,
        ))
    }

    pub fn new(
        catalog: PartitionCatalog,
        probe: Arc<dyn PartitionProbe>,
        engine: TrajectoryEngine,
        config: ExecutorConfig,
        cache: Arc<dyn ResultCache>,
    ) -> Self {
        let metrics = ServerMetrics::new();
        let executor = FanOutExecutor::new(
            probe,
            Arc::new(EngineRunner::new(engine)),
            config,
            metrics.clone(),
        );
        Self {
            catalog: Arc::new(catalog),
            geocoder: Arc::new(ContinentRegistry::builtin()),
            executor,
            cache,
            metrics,
        }
    }
}
