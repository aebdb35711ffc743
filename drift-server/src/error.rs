//! API errors and their HTTP mapping.

use std::time::Duration;

use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use drift_connectors::ConnectorError;
use drift_query::QueryError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Query string that does not deserialize, e.g. a repeated parameter.
    #[error("{}", .0.body_text())]
    QueryString(#[from] QueryRejection),

    #[error(transparent)]
    Connector(#[from] ConnectorError),

    /// Engine or decoding failure; the detail stays in the logs.
    #[error("query failed: {0}")]
    EngineQueryFailure(String),

    #[error("query exceeded its {0:?} deadline")]
    QueryTimeout(Duration),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Query(_) | ApiError::QueryString(_) => StatusCode::BAD_REQUEST,
            ApiError::Connector(ConnectorError::LocationUnavailable(_)) => StatusCode::BAD_REQUEST,
            ApiError::Connector(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::EngineQueryFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::QueryTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message sent to the client.
    fn public_message(&self) -> String {
        match self {
            ApiError::Query(_)
            | ApiError::QueryString(_)
            | ApiError::Connector(ConnectorError::LocationUnavailable(_)) => self.to_string(),
            ApiError::QueryTimeout(_) => "Query timed out".to_string(),
            _ => "Query failed".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{}", self);
        }
        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}
