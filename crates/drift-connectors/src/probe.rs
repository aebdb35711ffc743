//! Partition file existence checks.

use std::io::ErrorKind;
use std::time::Duration;

use async_trait::async_trait;
use drift_core::PartitionLocation;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use reqwest::StatusCode;
use tracing::debug;

use crate::error::ConnectorError;
use crate::s3::{build_store, parse_s3_uri, S3Config};
use crate::PartitionProbe;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Probe backed by the filesystem, an HTTP client and S3 `HEAD` requests.
#[derive(Debug, Clone)]
pub struct LocationProbe {
    http: reqwest::Client,
    s3: Option<S3Config>,
}

impl LocationProbe {
    pub fn new(s3: Option<S3Config>) -> Result<Self, ConnectorError> {
        let http = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .map_err(|e| ConnectorError::ConfigError(format!("http client: {}", e)))?;
        Ok(Self { http, s3 })
    }

    pub fn with_client(http: reqwest::Client, s3: Option<S3Config>) -> Self {
        Self { http, s3 }
    }

    async fn local_exists(&self, path: &std::path::Path) -> Result<bool, ConnectorError> {
        match tokio::fs::metadata(path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ConnectorError::ProbeFailed(format!("{}: {}", path.display(), e))),
        }
    }

    async fn http_exists(&self, url: &url::Url) -> Result<bool, ConnectorError> {
        let response = self.http.head(url.as_str()).send().await?;
        let status = response.status();
        debug!(%url, %status, "HEAD partition");
        Ok(status == StatusCode::OK)
    }

    async fn s3_exists(&self, url: &url::Url) -> Result<bool, ConnectorError> {
        let (bucket, key) = parse_s3_uri(url.as_str())?;
        let store = build_store(self.s3.as_ref(), &bucket)?;
        match store.head(&ObjectPath::from(key)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl PartitionProbe for LocationProbe {
    async fn exists(&self, location: &PartitionLocation) -> Result<bool, ConnectorError> {
        match location {
            PartitionLocation::Local(path) => self.local_exists(path).await,
            PartitionLocation::Http(url) => self.http_exists(url).await,
            PartitionLocation::S3(url) => self.s3_exists(url).await,
        }
    }
}
