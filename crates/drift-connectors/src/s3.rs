//! S3 utilities for drift connectors
//!
//! Provides `S3Config` (credentials / endpoint), `parse_s3_uri` (bucket/key
//! extraction) and `build_store`, which turns both into an object store.
//! Without credentials the store is built unsigned, which is how public
//! dataset buckets are read.

use anyhow::{Context, Result};
use object_store::aws::{AmazonS3, AmazonS3Builder};
use url::Url;

/// Configuration for connecting to S3-compatible storage.
///
/// Secrets (`access_key_id`, `secret_access_key`) are redacted in `Debug`
/// output.
#[derive(Clone)]
pub struct S3Config {
    /// AWS region (e.g. "us-east-1")
    pub region: String,
    /// Access key id (redacted in Debug output)
    pub access_key_id: String,
    /// Secret access key (redacted in Debug output)
    pub secret_access_key: String,
    /// Optional custom endpoint URL (for MinIO / LocalStack)
    pub endpoint_url: Option<String>,
    /// Allow HTTP (non-TLS) connections, for local MinIO
    pub allow_http: bool,
}

impl std::fmt::Debug for S3Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Config")
            .field("region", &self.region)
            .field("access_key_id", &"***")
            .field("secret_access_key", &"***")
            .field("endpoint_url", &self.endpoint_url)
            .field("allow_http", &self.allow_http)
            .finish()
    }
}

impl S3Config {
    /// Build an S3Config from environment variables:
    ///   AWS_REGION, AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY, AWS_ENDPOINT_URL
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            region: std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            access_key_id: std::env::var("AWS_ACCESS_KEY_ID")
                .context("AWS_ACCESS_KEY_ID not set")?,
            secret_access_key: std::env::var("AWS_SECRET_ACCESS_KEY")
                .context("AWS_SECRET_ACCESS_KEY not set")?,
            endpoint_url: std::env::var("AWS_ENDPOINT_URL").ok(),
            allow_http: std::env::var("AWS_ALLOW_HTTP")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        })
    }
}

/// Parse an `s3://bucket/key` URI into (bucket, key).
pub fn parse_s3_uri(uri: &str) -> Result<(String, String)> {
    let url = Url::parse(uri).context("invalid S3 URI")?;
    anyhow::ensure!(url.scheme() == "s3", "URI scheme must be s3://");
    let bucket = url
        .host_str()
        .context("missing bucket in S3 URI")?
        .to_string();
    let key = url.path().trim_start_matches('/').to_string();
    anyhow::ensure!(!key.is_empty(), "missing object key in S3 URI");
    Ok((bucket, key))
}

/// Build an S3 store for `bucket`; `None` config yields an unsigned client.
pub fn build_store(config: Option<&S3Config>, bucket: &str) -> Result<AmazonS3> {
    let mut builder = AmazonS3Builder::new().with_bucket_name(bucket);

    match config {
        Some(config) => {
            builder = builder
                .with_region(&config.region)
                .with_access_key_id(&config.access_key_id)
                .with_secret_access_key(&config.secret_access_key);
            if let Some(ref endpoint) = config.endpoint_url {
                builder = builder.with_endpoint(endpoint);
            }
            if config.allow_http {
                builder = builder.with_allow_http(true);
            }
        }
        None => {
            builder = builder.with_region("us-east-1").with_skip_signature(true);
        }
    }

    builder
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build S3 object store: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_s3_uri_valid() {
        let (bucket, key) = parse_s3_uri("s3://drift-data/RUN_2010/part.parquet").unwrap();
        assert_eq!(bucket, "drift-data");
        assert_eq!(key, "RUN_2010/part.parquet");
    }

    #[test]
    fn test_parse_s3_uri_no_key() {
        assert!(parse_s3_uri("s3://bucket/").is_err());
    }

    #[test]
    fn test_parse_s3_uri_wrong_scheme() {
        assert!(parse_s3_uri("https://bucket/key").is_err());
    }

    #[test]
    fn test_parse_s3_uri_invalid() {
        assert!(parse_s3_uri("not a uri").is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = S3Config {
            region: "eu-west-1".to_string(),
            access_key_id: "AKIAEXAMPLE".to_string(),
            secret_access_key: "very-secret".to_string(),
            endpoint_url: Some("http://localhost:9000".to_string()),
            allow_http: true,
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("AKIAEXAMPLE"));
        assert!(!rendered.contains("very-secret"));
        assert!(rendered.contains("eu-west-1"));
    }

    #[test]
    fn test_build_store_signed_and_anonymous() {
        let config = S3Config {
            region: "eu-west-1".to_string(),
            access_key_id: "ak".to_string(),
            secret_access_key: "sk".to_string(),
            endpoint_url: Some("http://localhost:9000".to_string()),
            allow_http: true,
        };
        assert!(build_store(Some(&config), "drift-data").is_ok());
        assert!(build_store(None, "public-drift").is_ok());
    }
}
