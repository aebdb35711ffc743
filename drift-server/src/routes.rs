//! HTTP routes.

use std::time::Instant;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use drift_cache::{CacheKey, ResultCache};
use drift_query::{build_plan, parse_params, parse_track_id, QueryIntent, RawParams};
use geojson::JsonValue;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::assemble::{assemble, with_processing_time, AssemblyOptions};
use crate::error::ApiError;
use crate::metrics::IntentLabel;
use crate::state::AppState;

const GEO_JSON: &str = "application/geo+json";

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(hello))
        .route("/tracks", get(tracks))
        .route("/tracks/:id", get(track_by_id))
        .route("/origin", get(origin))
        .route("/destination", get(destination))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn hello() -> Json<JsonValue> {
    Json(json!({ "message": "hello" }))
}

async fn health() -> &'static str {
    "OK"
}

async fn metrics(State(state): State<AppState>) -> Result<String, StatusCode> {
    state
        .metrics
        .encode()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Query strings are extracted fallibly so malformed ones get the JSON error body.
type Params = Result<Query<RawParams>, QueryRejection>;

async fn tracks(State(state): State<AppState>, params: Params) -> Result<Response, ApiError> {
    let Query(raw) = params?;
    answer(&state, QueryIntent::Tracks, raw).await
}

async fn track_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
    params: Params,
) -> Result<Response, ApiError> {
    let id = parse_track_id(&id)?;
    let Query(raw) = params?;
    answer(&state, QueryIntent::TrackById(id), raw).await
}

async fn origin(State(state): State<AppState>, params: Params) -> Result<Response, ApiError> {
    let Query(raw) = params?;
    answer(&state, QueryIntent::Origin, raw).await
}

async fn destination(State(state): State<AppState>, params: Params) -> Result<Response, ApiError> {
    let Query(raw) = params?;
    answer(&state, QueryIntent::Destination, raw).await
}

async fn answer(state: &AppState, intent: QueryIntent, raw: RawParams) -> Result<Response, ApiError> {
    let started = Instant::now();
    let label = IntentLabel(intent.name());
    state.metrics.requests.get_or_create(&label).inc();

    let result = query(state, intent, &raw, started).await;
    if let Err(ref e) = result {
        if e.status().is_server_error() {
            state.metrics.query_failures.get_or_create(&label).inc();
        }
    }
    let body = result?;

    let returned = body["context"]["returned"].as_u64().unwrap_or(0);
    state.metrics.features_returned.inc_by(returned);
    info!(
        "{} returned {} features in {:.1} ms",
        intent,
        returned,
        elapsed_ms(started)
    );

    let bytes = serde_json::to_vec(&body).map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(([(CONTENT_TYPE, GEO_JSON)], bytes).into_response())
}

async fn query(
    state: &AppState,
    intent: QueryIntent,
    raw: &RawParams,
    started: Instant,
) -> Result<JsonValue, ApiError> {
    let spec = parse_params(raw)?;
    let plan = build_plan(intent, &spec, &state.catalog)?;
    let executor = &state.executor;

    executor
        .within_deadline(async {
            let plan = executor.resolve(plan).await?;
            let key = CacheKey::for_query(&format!(
                "{}minimalist={}\n",
                plan.cache_text(),
                spec.minimalist
            ));
            if let Some(body) = cache_get(state.cache.clone(), key.clone()).await {
                debug!("Cache hit {}", key);
                state.metrics.cache_hits.inc();
                return Ok(with_processing_time(body, elapsed_ms(started)));
            }

            let execution = executor.run(&plan).await?;
            let options = AssemblyOptions {
                intent,
                limit: plan.limit,
                minimalist: spec.minimalist,
            };
            let body = assemble(&execution, options, &state.geocoder, elapsed_ms(started))?;
            if execution.warnings.is_empty() {
                cache_put(state.cache.clone(), key, body.clone()).await;
            }
            Ok(body)
        })
        .await
}

/// Cache failures never fail the request.
async fn cache_get(cache: Arc<dyn ResultCache>, key: CacheKey) -> Option<JsonValue> {
    match tokio::task::spawn_blocking(move || cache.get(&key)).await {
        Ok(Ok(hit)) => hit,
        Ok(Err(e)) => {
            warn!("Cache read failed: {:#}", e);
            None
        }
        Err(e) => {
            warn!("Cache read task failed: {}", e);
            None
        }
    }
}

async fn cache_put(cache: Arc<dyn ResultCache>, key: CacheKey, body: JsonValue) {
    match tokio::task::spawn_blocking(move || cache.put(&key, &body)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Cache write failed: {:#}", e),
        Err(e) => warn!("Cache write task failed: {}", e),
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
