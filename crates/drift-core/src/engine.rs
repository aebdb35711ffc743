//! Trajectory query engine built on DataFusion

use std::sync::Arc;

use datafusion::arrow::record_batch::RecordBatch;
use datafusion::error::Result as DFResult;
use datafusion::execution::runtime_env::{RuntimeEnv, RuntimeEnvBuilder};
use datafusion::prelude::*;
use tracing::{debug, info};

use crate::udf;

/// Table name every partition query selects from.
pub const PARTITION_TABLE: &str = "drift_partition";

/// Shared DataFusion runtime plus a factory for per-query sessions.
///
/// Object stores are registered once on the runtime; each partition query
/// then gets its own short-lived `SessionContext` so concurrent queries never
/// race on table registration.
#[derive(Clone)]
pub struct TrajectoryEngine {
    runtime: Arc<RuntimeEnv>,
}

impl TrajectoryEngine {
    /// Create an engine with a default runtime
    pub fn new() -> DFResult<Self> {
        let runtime = Arc::new(RuntimeEnvBuilder::new().build()?);
        info!("TrajectoryEngine initialized with spatial UDFs");
        Ok(Self { runtime })
    }

    pub fn with_runtime(runtime: Arc<RuntimeEnv>) -> Self {
        Self { runtime }
    }

    /// Runtime holding the registered object stores
    pub fn runtime(&self) -> &Arc<RuntimeEnv> {
        &self.runtime
    }

    /// Fresh session sharing the runtime, with spatial UDFs registered
    pub fn session(&self) -> SessionContext {
        let ctx = SessionContext::new_with_config_rt(SessionConfig::new(), self.runtime.clone());
        udf::register_spatial_udfs(&ctx);
        ctx
    }

    /// Register one GeoParquet file as [`PARTITION_TABLE`] and run `sql` against it
    pub async fn query_parquet(&self, table_uri: &str, sql: &str) -> DFResult<Vec<RecordBatch>> {
        let ctx = self.session();
        ctx.register_parquet(PARTITION_TABLE, table_uri, ParquetReadOptions::default())
            .await?;
        debug!(table_uri, "running partition query");
        ctx.sql(sql).await?.collect().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::udf::tests::point_wkb;
    use arrow::array::{BinaryArray, Int64Array};
    use arrow::datatypes::{DataType, Field, Schema};
    use parquet::arrow::ArrowWriter;
    use std::fs::File;
    use tempfile::TempDir;

    fn write_points(dir: &TempDir, name: &str, points: &[(i64, f64, f64)]) -> String {
        let schema = Arc::new(Schema::new(vec![
            Field::new("trajectory", DataType::Int64, false),
            Field::new("geometry", DataType::Binary, false),
        ]));
        let ids: Vec<i64> = points.iter().map(|p| p.0).collect();
        let wkb: Vec<Vec<u8>> = points.iter().map(|p| point_wkb(p.1, p.2)).collect();
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int64Array::from(ids)),
                Arc::new(BinaryArray::from_iter_values(wkb.iter())),
            ],
        )
        .unwrap();

        let path = dir.path().join(name);
        let file = File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
        path.to_string_lossy().into_owned()
    }

    fn ids(batches: &[RecordBatch]) -> Vec<i64> {
        batches
            .iter()
            .flat_map(|b| {
                let col = b.column(0).as_any().downcast_ref::<Int64Array>().unwrap();
                col.values().to_vec()
            })
            .collect()
    }

    #[tokio::test]
    async fn test_query_parquet_with_spatial_filter() {
        let dir = TempDir::new().unwrap();
        let uri = write_points(&dir, "p.parquet", &[(1, 2.0, 45.0), (2, -30.0, 10.0), (3, 3.0, 44.5)]);

        let engine = TrajectoryEngine::new().unwrap();
        let sql = format!(
            "SELECT \"trajectory\" FROM {} WHERE st_intersects(\"geometry\", \
             'POLYGON((0 40, 0 50, 10 50, 10 40, 0 40))') ORDER BY \"trajectory\"",
            PARTITION_TABLE
        );
        let batches = engine.query_parquet(&uri, &sql).await.unwrap();
        assert_eq!(ids(&batches), vec![1, 3]);
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let dir = TempDir::new().unwrap();
        let a = write_points(&dir, "a.parquet", &[(1, 0.0, 0.0)]);
        let b = write_points(&dir, "b.parquet", &[(7, 0.0, 0.0), (8, 1.0, 1.0)]);

        let engine = TrajectoryEngine::new().unwrap();
        let sql = format!("SELECT \"trajectory\" FROM {} ORDER BY 1", PARTITION_TABLE);
        let (ra, rb) = tokio::join!(engine.query_parquet(&a, &sql), engine.query_parquet(&b, &sql));
        assert_eq!(ids(&ra.unwrap()), vec![1]);
        assert_eq!(ids(&rb.unwrap()), vec![7, 8]);
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let engine = TrajectoryEngine::new().unwrap();
        let result = engine
            .query_parquet("/nonexistent/drift.parquet", "SELECT 1")
            .await;
        assert!(result.is_err());
    }
}
