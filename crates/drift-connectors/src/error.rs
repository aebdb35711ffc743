//! Typed errors for the connectors crate.

use std::fmt;

/// Errors that can occur while locating partition files.
#[derive(Debug)]
pub enum ConnectorError {
    /// An explicitly requested partition file does not exist.
    LocationUnavailable(String),
    /// The location cannot be handled by any store.
    InvalidLocation(String),
    /// The existence check itself failed (network, permissions).
    ProbeFailed(String),
    /// Invalid or missing configuration.
    ConfigError(String),
}

impl fmt::Display for ConnectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectorError::LocationUnavailable(loc) => {
                write!(f, "Parquet file is not available {}", loc)
            }
            ConnectorError::InvalidLocation(msg) => write!(f, "invalid location: {}", msg),
            ConnectorError::ProbeFailed(msg) => write!(f, "probe failed: {}", msg),
            ConnectorError::ConfigError(msg) => write!(f, "config error: {}", msg),
        }
    }
}

impl std::error::Error for ConnectorError {}

impl From<anyhow::Error> for ConnectorError {
    fn from(e: anyhow::Error) -> Self {
        ConnectorError::ConfigError(e.to_string())
    }
}

impl From<object_store::Error> for ConnectorError {
    fn from(e: object_store::Error) -> Self {
        ConnectorError::ProbeFailed(e.to_string())
    }
}

impl From<reqwest::Error> for ConnectorError {
    fn from(e: reqwest::Error) -> Self {
        ConnectorError::ProbeFailed(e.to_string())
    }
}
