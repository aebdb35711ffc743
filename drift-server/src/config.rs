//! Server configuration from flags and environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use drift_core::{CatalogConfig, Granularity, PartitionKey};

use crate::executor::ExecutorConfig;

const DEFAULT_CATALOG_ROOT: &str = "https://minio.dive.edito.eu/project-plastic-marine-debris-drift/RUN_{year}_5YEARS_GEOPARQUET/Trajectories_smoc_{year}-{month}-{day}_1825days_coastalrepel.parquet";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GranularityArg {
    Month,
    Day,
}

impl From<GranularityArg> for Granularity {
    fn from(arg: GranularityArg) -> Self {
        match arg {
            GranularityArg::Month => Granularity::Month,
            GranularityArg::Day => Granularity::Day,
        }
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "drift-server", about = "Ocean drift trajectory query service")]
pub struct ServerArgs {
    /// Address the HTTP API listens on
    #[arg(long, default_value = "0.0.0.0:3002", env = "BIND_ADDR")]
    pub bind_addr: SocketAddr,

    /// Partition location template ({year}, {month}, {month0}, {day}, {day0})
    #[arg(long, default_value = DEFAULT_CATALOG_ROOT, env = "CATALOG_ROOT")]
    pub catalog_root: String,

    /// Release years covered by the catalog
    #[arg(long, default_value = "2010", env = "CATALOG_YEARS", value_delimiter = ',')]
    pub catalog_years: Vec<i32>,

    #[arg(
        long,
        default_value = "1,2,3,4,5,6,7,8,9,10,11,12",
        env = "CATALOG_MONTHS",
        value_delimiter = ','
    )]
    pub catalog_months: Vec<u32>,

    /// Release days of month (daily catalogs only)
    #[arg(long, default_value = "1,8,15,22", env = "CATALOG_DAYS", value_delimiter = ',')]
    pub catalog_days: Vec<u32>,

    #[arg(long, value_enum, default_value = "day", env = "CATALOG_GRANULARITY")]
    pub catalog_granularity: GranularityArg,

    /// Partition served by /tracks (YYYY-MM or YYYY-MM-DD); earliest when unset
    #[arg(long, env = "TRACKS_PARTITION")]
    pub tracks_partition: Option<String>,

    #[arg(long, default_value = "8", env = "MAX_CONCURRENT_PARTITIONS")]
    pub max_concurrent_partitions: usize,

    /// Deadline for a whole request, in seconds
    #[arg(long, default_value = "120", env = "QUERY_TIMEOUT_SECS")]
    pub query_timeout_secs: u64,

    /// Return the partitions that succeeded and report the rest as warnings
    #[arg(long, env = "PARTIAL_RESULTS")]
    pub partial_results: bool,

    #[arg(long, env = "ENABLE_CACHE")]
    pub enable_cache: bool,

    #[arg(long, default_value = "/cache", env = "CACHE_DIR")]
    pub cache_dir: PathBuf,
}

impl ServerArgs {
    pub fn catalog_config(&self) -> Result<CatalogConfig> {
        let default_key = self
            .tracks_partition
            .as_deref()
            .map(|raw| raw.parse::<PartitionKey>())
            .transpose()
            .context("Invalid TRACKS_PARTITION")?;

        Ok(CatalogConfig {
            years: self.catalog_years.clone(),
            months: self.catalog_months.clone(),
            days: self.catalog_days.clone(),
            granularity: self.catalog_granularity.into(),
            template: self.catalog_root.clone(),
            default_key,
        })
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            max_concurrent_partitions: self.max_concurrent_partitions.max(1),
            query_timeout: Duration::from_secs(self.query_timeout_secs),
            partial_results: self.partial_results,
        }
    }
}
