//! Bounded fan-out of per-partition queries.
//!
//! A plan first has its partitions probed for existence, then each surviving
//! partition query runs on the engine with at most
//! `max_concurrent_partitions` in flight. Results come back in plan order.
//! By default the first failure aborts the request; dropping the combined
//! future drops every outstanding query with it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use drift_connectors::{ConnectorError, PartitionProbe};
use drift_core::{PartitionKey, PartitionLocation, TrajectoryEngine};
use drift_query::{PartitionQuery, QueryError, QueryPlan, Selection};
use futures::stream::{self, StreamExt, TryStreamExt};
use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::metrics::ServerMetrics;
use crate::rows::{decode_batches, RawRow};

/// Runs one partition query to completion.
#[async_trait]
pub trait PartitionRunner: Send + Sync {
    async fn run(&self, query: &PartitionQuery) -> anyhow::Result<Vec<RawRow>>;
}

/// Runs partition queries on a DataFusion session per call.
#[derive(Clone)]
pub struct EngineRunner {
    engine: TrajectoryEngine,
}

impl EngineRunner {
    pub fn new(engine: TrajectoryEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl PartitionRunner for EngineRunner {
    async fn run(&self, query: &PartitionQuery) -> anyhow::Result<Vec<RawRow>> {
        let batches = self
            .engine
            .query_parquet(&query.location.table_uri(), &query.sql)
            .await?;
        decode_batches(&batches)
    }
}

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub max_concurrent_partitions: usize,
    pub query_timeout: Duration,
    pub partial_results: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_partitions: 8,
            query_timeout: Duration::from_secs(120),
            partial_results: false,
        }
    }
}

/// Rows returned by one partition.
#[derive(Debug, Clone)]
pub struct PartitionRows {
    pub key: PartitionKey,
    pub location: PartitionLocation,
    pub rows: Vec<RawRow>,
}

#[derive(Debug, Default)]
pub struct Execution {
    pub partitions: Vec<PartitionRows>,
    /// Partitions that failed in partial mode.
    pub warnings: Vec<String>,
}

#[derive(Clone)]
pub struct FanOutExecutor {
    probe: Arc<dyn PartitionProbe>,
    runner: Arc<dyn PartitionRunner>,
    config: ExecutorConfig,
    metrics: ServerMetrics,
}

impl FanOutExecutor {
    pub fn new(
        probe: Arc<dyn PartitionProbe>,
        runner: Arc<dyn PartitionRunner>,
        config: ExecutorConfig,
        metrics: ServerMetrics,
    ) -> Self {
        Self {
            probe,
            runner,
            config,
            metrics,
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Drop the partitions whose file does not exist.
    ///
    /// A missing explicitly named partition fails the request; missing
    /// enumerated partitions are skipped. Fails with `NoDataForSelector`
    /// when nothing is left.
    pub async fn resolve(&self, mut plan: QueryPlan) -> Result<QueryPlan, ApiError> {
        let probe = self.probe.clone();
        let exists: Vec<bool> = stream::iter(plan.queries.iter())
            .map(probe_fn(move |query| {
                let probe = probe.clone();
                async move {
                    match probe.exists(&query.location).await {
                        Ok(found) => found,
                        Err(e) => {
                            warn!("Probe failed for {}, treating as missing: {}", query.location, e);
                            false
                        }
                    }
                }
                .boxed()
            }))
            .buffered(self.config.max_concurrent_partitions)
            .collect()
            .await;

        if plan.selection == Selection::Explicit {
            if let Some((query, _)) = plan.queries.iter().zip(&exists).find(|(_, found)| !**found) {
                return Err(ConnectorError::LocationUnavailable(query.location.to_string()).into());
            }
        }

        let before = plan.queries.len();
        for (query, _) in plan.queries.iter().zip(&exists).filter(|(_, found)| !**found) {
            debug!("Skipping unavailable partition {} ({})", query.key, query.location);
        }
        plan.retain_existing(&exists);
        self.metrics
            .partitions_skipped
            .inc_by((before - plan.queries.len()) as u64);

        if plan.is_empty() {
            return Err(QueryError::NoDataForSelector(plan.intent.to_string()).into());
        }
        Ok(plan)
    }

    /// Run every partition query of a resolved plan.
    pub async fn run(&self, plan: &QueryPlan) -> Result<Execution, ApiError> {
        info!(
            "Running {} partition queries for {} (max {} in flight)",
            plan.queries.len(),
            plan.intent,
            self.config.max_concurrent_partitions
        );
        self.metrics
            .partitions_queried
            .inc_by(plan.queries.len() as u64);

        let runner = self.runner.clone();
        let results = stream::iter(plan.queries.iter()).map(run_fn(move |query| {
            let runner = runner.clone();
            async move {
                let rows = runner.run(query).await.map_err(|e| (query, e))?;
                debug!("Partition {} returned {} rows", query.key, rows.len());
                Ok::<_, (&PartitionQuery, anyhow::Error)>(PartitionRows {
                    key: query.key,
                    location: query.location.clone(),
                    rows,
                })
            }
            .boxed()
        }));
        let results = results.buffered(self.config.max_concurrent_partitions);

        if !self.config.partial_results {
            let partitions = results
                .try_collect::<Vec<_>>()
                .await
                .map_err(|(query, e)| engine_failure(query, e))?;
            return Ok(Execution {
                partitions,
                warnings: Vec::new(),
            });
        }

        let mut execution = Execution::default();
        let outcomes: Vec<_> = results.collect().await;
        for outcome in outcomes {
            match outcome {
                Ok(partition) => execution.partitions.push(partition),
                Err((query, e)) => {
                    warn!("Partition {} failed, continuing: {:#}", query.location, e);
                    execution
                        .warnings
                        .push(format!("Partition {} failed", query.key));
                }
            }
        }
        if execution.partitions.is_empty() {
            return Err(ApiError::EngineQueryFailure(
                "every partition query failed".to_string(),
            ));
        }
        Ok(execution)
    }

    /// Bound `fut` by the per-request deadline.
    pub async fn within_deadline<T, F>(&self, fut: F) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        match tokio::time::timeout(self.config.query_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Request exceeded {:?}", self.config.query_timeout);
                Err(ApiError::QueryTimeout(self.config.query_timeout))
            }
        }
    }
}

fn engine_failure(query: &PartitionQuery, e: anyhow::Error) -> ApiError {
    ApiError::EngineQueryFailure(format!("{}: {:#}", query.location, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_core::{CatalogConfig, Granularity, PartitionCatalog};
    use drift_query::{build_plan, QueryIntent, QuerySpec, TimeSelector};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Reports every location as present except the listed months.
    struct FakeProbe {
        missing: HashSet<String>,
    }

    #[async_trait]
    impl PartitionProbe for FakeProbe {
        async fn exists(&self, location: &PartitionLocation) -> Result<bool, ConnectorError> {
            let location = location.to_string();
            if location.contains("broken") {
                return Err(ConnectorError::ProbeFailed("connection reset".into()));
            }
            Ok(!self.missing.iter().any(|m| location.contains(m.as_str())))
        }
    }

    /// Returns one row per partition after a delay, tracking peak concurrency.
    #[derive(Default)]
    struct FakeRunner {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        fail: HashSet<String>,
        delay: Duration,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PartitionRunner for FakeRunner {
        async fn run(&self, query: &PartitionQuery) -> anyhow::Result<Vec<RawRow>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.seen.lock().unwrap().push(query.key.to_string());
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail.contains(&query.key.to_string()) {
                anyhow::bail!("corrupt parquet footer");
            }
            Ok(vec![RawRow {
                trajectory: query.key.month_of_year() as i64,
                obs: 0,
                ci: None,
                eez: None,
                mpw: None,
                ri: None,
                ri_annual: None,
                age: None,
                distcoast: None,
                time: query.key.start_date().and_hms_opt(0, 0, 0).unwrap().and_utc(),
                travelled_distance: None,
                z: None,
                geometry: r#"{"type":"Point","coordinates":[0,0]}"#.into(),
            }])
        }
    }

    fn catalog(template: &str) -> PartitionCatalog {
        PartitionCatalog::build(&CatalogConfig {
            years: vec![2010],
            months: (1..=12).collect(),
            days: vec![],
            granularity: Granularity::Month,
            template: template.to_string(),
            default_key: None,
        })
        .unwrap()
    }

    fn plan(intent: QueryIntent, selector: &str, catalog: &PartitionCatalog) -> QueryPlan {
        let spec = QuerySpec {
            polygon: Some("POLYGON((0 0, 0 1, 1 1, 1 0, 0 0))".into()),
            time_selector: Some(TimeSelector::parse("datetime", selector).unwrap()),
            ..Default::default()
        };
        build_plan(intent, &spec, catalog).unwrap()
    }

    fn executor(missing: &[&str], runner: Arc<FakeRunner>, config: ExecutorConfig) -> FanOutExecutor {
        let probe = FakeProbe {
            missing: missing.iter().map(|m| m.to_string()).collect(),
        };
        FanOutExecutor::new(Arc::new(probe), runner, config, ServerMetrics::new())
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded_and_order_kept() {
        let runner = Arc::new(FakeRunner {
            delay: Duration::from_millis(20),
            ..Default::default()
        });
        let config = ExecutorConfig {
            max_concurrent_partitions: 3,
            ..Default::default()
        };
        let exec = executor(&[], runner.clone(), config);
        let catalog = catalog("/data/{year}-{month0}.parquet");
        let plan = exec
            .resolve(plan(QueryIntent::Origin, "2010-12", &catalog))
            .await
            .unwrap();

        let execution = exec.run(&plan).await.unwrap();
        assert_eq!(execution.partitions.len(), 12);
        assert!(runner.peak.load(Ordering::SeqCst) <= 3);
        let months: Vec<i64> = execution.partitions.iter().map(|p| p.rows[0].trajectory).collect();
        assert_eq!(months, (1..=12).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_first_failure_aborts_request() {
        let runner = Arc::new(FakeRunner {
            fail: HashSet::from(["2010-02".to_string()]),
            ..Default::default()
        });
        let exec = executor(&[], runner, ExecutorConfig::default());
        let catalog = catalog("/data/{year}-{month0}.parquet");
        let plan = exec
            .resolve(plan(QueryIntent::Origin, "2010-04", &catalog))
            .await
            .unwrap();

        let err = exec.run(&plan).await.unwrap_err();
        assert!(matches!(err, ApiError::EngineQueryFailure(ref m) if m.contains("2010-02")));
    }

    #[tokio::test]
    async fn test_partial_mode_reports_failed_partitions() {
        let runner = Arc::new(FakeRunner {
            fail: HashSet::from(["2010-02".to_string()]),
            ..Default::default()
        });
        let config = ExecutorConfig {
            partial_results: true,
            ..Default::default()
        };
        let exec = executor(&[], runner, config);
        let catalog = catalog("/data/{year}-{month0}.parquet");
        let plan = exec
            .resolve(plan(QueryIntent::Origin, "2010-04", &catalog))
            .await
            .unwrap();

        let execution = exec.run(&plan).await.unwrap();
        assert_eq!(execution.partitions.len(), 3);
        assert_eq!(execution.warnings, vec!["Partition 2010-02 failed".to_string()]);
    }

    #[tokio::test]
    async fn test_deadline_expiry_is_a_timeout() {
        let runner = Arc::new(FakeRunner {
            delay: Duration::from_secs(5),
            ..Default::default()
        });
        let config = ExecutorConfig {
            query_timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let exec = executor(&[], runner, config);
        let catalog = catalog("/data/{year}-{month0}.parquet");
        let plan = plan(QueryIntent::Destination, "2010-01", &catalog);

        let err = exec
            .within_deadline(async {
                let plan = exec.resolve(plan).await?;
                exec.run(&plan).await
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::QueryTimeout(_)));
    }

    #[tokio::test]
    async fn test_missing_explicit_partition_is_unavailable() {
        let exec = executor(&["2010-03"], Arc::new(FakeRunner::default()), ExecutorConfig::default());
        let catalog = catalog("/data/{year}-{month0}.parquet");

        let err = exec
            .resolve(plan(QueryIntent::Destination, "2010-03", &catalog))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Parquet file is not available /data/2010-03.parquet");
    }

    #[tokio::test]
    async fn test_missing_enumerated_partitions_are_skipped() {
        let runner = Arc::new(FakeRunner::default());
        let exec = executor(&["2010-01", "2010-03"], runner.clone(), ExecutorConfig::default());
        let catalog = catalog("/data/{year}-{month0}.parquet");

        let plan = exec
            .resolve(plan(QueryIntent::Origin, "2010-04", &catalog))
            .await
            .unwrap();
        let keys: Vec<String> = plan.queries.iter().map(|q| q.key.to_string()).collect();
        assert_eq!(keys, vec!["2010-02", "2010-04"]);

        exec.run(&plan).await.unwrap();
        assert_eq!(runner.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_probe_errors_count_as_missing() {
        let exec = executor(&[], Arc::new(FakeRunner::default()), ExecutorConfig::default());
        let catalog = catalog("/data/broken/{year}-{month0}.parquet");

        let err = exec
            .resolve(plan(QueryIntent::Origin, "2010-02", &catalog))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Query(QueryError::NoDataForSelector(_))));
    }
}

/// Pins a closure to a higher-ranked signature so the futures it returns
/// stay `Send` inside axum handlers (works around rust-lang/rust#110338).
fn probe_fn<F>(f: F) -> F
where
    F: for<'a> FnMut(&'a PartitionQuery) -> BoxFuture<'a, bool>,
{
    f
}

type RunOutcome<'a> = Result<PartitionRows, (&'a PartitionQuery, anyhow::Error)>;

/// See [`probe_fn`].
fn run_fn<F>(f: F) -> F
where
    F: for<'a> FnMut(&'a PartitionQuery) -> BoxFuture<'a, RunOutcome<'a>>,
{
    f
}
