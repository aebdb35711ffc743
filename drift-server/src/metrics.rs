//! Prometheus metrics for query observability.

use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;
use std::sync::Arc;

#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct IntentLabel(pub &'static str);

impl prometheus_client::encoding::EncodeLabelSet for IntentLabel {
    fn encode(
        &self,
        mut encoder: prometheus_client::encoding::LabelSetEncoder,
    ) -> Result<(), std::fmt::Error> {
        use prometheus_client::encoding::EncodeLabel;
        ("intent", self.0).encode(encoder.encode_label())?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct ServerMetrics {
    pub requests: Family<IntentLabel, Counter>,
    pub query_failures: Family<IntentLabel, Counter>,
    pub partitions_queried: Counter,
    pub partitions_skipped: Counter,
    pub features_returned: Counter,
    pub cache_hits: Counter,
    pub registry: Arc<Registry>,
}

impl ServerMetrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let requests = Family::<IntentLabel, Counter>::default();
        registry.register(
            "drift_requests",
            "Query requests received by intent",
            requests.clone(),
        );

        let query_failures = Family::<IntentLabel, Counter>::default();
        registry.register(
            "drift_query_failures",
            "Requests that failed with a server-side error, by intent",
            query_failures.clone(),
        );

        let partitions_queried = Counter::default();
        registry.register(
            "drift_partitions_queried",
            "Partition queries dispatched to the engine",
            partitions_queried.clone(),
        );

        let partitions_skipped = Counter::default();
        registry.register(
            "drift_partitions_skipped",
            "Enumerated partitions skipped because the file is unavailable",
            partitions_skipped.clone(),
        );

        let features_returned = Counter::default();
        registry.register(
            "drift_features_returned",
            "Features returned across all responses",
            features_returned.clone(),
        );

        let cache_hits = Counter::default();
        registry.register(
            "drift_cache_hits",
            "Responses served from the result cache",
            cache_hits.clone(),
        );

        Self {
            requests,
            query_failures,
            partitions_queried,
            partitions_skipped,
            features_returned,
            cache_hits,
            registry: Arc::new(registry),
        }
    }

    /// Encode all metrics as Prometheus text format.
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buf = String::new();
        encode(&mut buf, &self.registry)?;
        Ok(buf)
    }
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}
