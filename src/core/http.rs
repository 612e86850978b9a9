//! HTTP endpoint server using Axum.

use axum::{
    extract::{Path, Query, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{Json, Response},
    routing::{delete, get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{error, info, Level};

use crate::engine::NumericResult;
use crate::error::ServiceError;
use crate::indicators::{fingerprint, Fingerprint, IndicatorOptions, UpdateCallback};
use crate::metrics::Metrics;
use crate::models::Candle;
use crate::services::{IndicatorService, RequestOutcome};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<IndicatorService>,
    /// Latest computation result per streamed indicator, for polling.
    pub latest: Arc<RwLock<HashMap<Fingerprint, NumericResult>>>,
    pub metrics: Arc<Metrics>,
    pub health: Arc<RwLock<HealthStatus>>,
    pub start_time: Arc<Instant>,
}

#[derive(Clone, Debug)]
pub struct HealthStatus {
    pub status: String,
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self {
            status: "healthy".to_string(),
        }
    }
}

pub async fn health_check(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    let health = state.health.read().await;
    let uptime_seconds = state.start_time.elapsed().as_secs();
    Ok(Json(json!({
        "status": health.status,
        "uptime_seconds": uptime_seconds,
        "service": "tastream-indicator-service"
    })))
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<String, StatusCode> {
    state
        .metrics
        .export()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Middleware to track HTTP request metrics
async fn metrics_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    state.metrics.http_requests_in_flight.inc();
    let response = next.run(request).await;
    let status = response.status();
    let duration = start.elapsed();
    state.metrics.http_requests_in_flight.dec();

    state.metrics.http_requests_total.inc();
    state
        .metrics
        .http_request_duration_seconds
        .observe(duration.as_secs_f64());

    if status.is_server_error() {
        tracing::error!(
            method = %method,
            path = %path,
            status = %status,
            duration_ms = duration.as_millis(),
            "HTTP request error"
        );
    }

    response
}

fn status_of(error: &ServiceError) -> StatusCode {
    match error {
        ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
        ServiceError::Configuration(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ServiceError::DuplicateIndicator(_) => StatusCode::CONFLICT,
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::Upstream(_) => StatusCode::BAD_GATEWAY,
    }
}

#[derive(Debug, Deserialize)]
struct CreateIndicatorRequest {
    symbol: String,
    interval: String,
    name: String,
    #[serde(default)]
    options: IndicatorOptions,
    /// Historical backfill in the venue's REST kline-row layout. When
    /// absent, history is fetched from the feed.
    klines: Option<Vec<Value>>,
    #[serde(default)]
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ValuesQuery {
    selector: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KlinesQuery {
    symbol: String,
    interval: String,
    until: Option<i64>,
}

/// List all ACTIVE streaming indicators
async fn list_indicators(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    let active = state.service.active().await;
    Ok(Json(json!(active)))
}

/// Create an indicator: one-shot compute, or a streamed registration whose
/// latest result is retained for polling
async fn create_indicator(
    State(state): State<AppState>,
    Json(request): Json<CreateIndicatorRequest>,
) -> Result<Json<Value>, StatusCode> {
    let klines = match request.klines {
        Some(rows) => Some(
            rows.iter()
                .map(Candle::from_rest_row)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| {
                    error!(error = %e, "rejecting malformed kline rows");
                    status_of(&e)
                })?,
        ),
        None => None,
    };

    let callback: Option<UpdateCallback> = if request.stream {
        let handle = fingerprint(
            &request.symbol,
            &request.interval,
            &request.name,
            &request.options,
        );
        let store = state.latest.clone();
        Some(Box::new(move |result| {
            let store = store.clone();
            tokio::spawn(async move {
                store.write().await.insert(handle, result);
            });
        }))
    } else {
        None
    };

    let outcome = state
        .service
        .request(
            &request.symbol,
            &request.interval,
            &request.name,
            request.options,
            klines,
            callback,
        )
        .await
        .map_err(|e| {
            error!(error = %e, name = %request.name, "indicator request failed");
            status_of(&e)
        })?;

    match outcome {
        RequestOutcome::Computed(result) => Ok(Json(json!({ "result": result }))),
        RequestOutcome::Streaming(handle) => Ok(Json(json!({ "fingerprint": handle }))),
    }
}

/// Series arrays of an ACTIVE indicator
async fn get_values(
    State(state): State<AppState>,
    Path(handle): Path<Fingerprint>,
    Query(params): Query<ValuesQuery>,
) -> Result<Json<Value>, StatusCode> {
    let selector = params.selector.as_deref().unwrap_or("close");
    let values = state
        .service
        .values(handle, selector)
        .await
        .map_err(|e| status_of(&e))?;
    Ok(Json(json!({ "fingerprint": handle, "values": values })))
}

/// Latest streamed computation result, if one has arrived yet
async fn get_latest(
    State(state): State<AppState>,
    Path(handle): Path<Fingerprint>,
) -> Result<Json<Value>, StatusCode> {
    let is_active = state
        .service
        .active()
        .await
        .iter()
        .any(|summary| summary.fingerprint == handle);
    if !is_active {
        return Err(StatusCode::NOT_FOUND);
    }

    let latest = state.latest.read().await;
    Ok(Json(json!({
        "fingerprint": handle,
        "result": latest.get(&handle)
    })))
}

/// Stop a streaming indicator
async fn stop_indicator(
    State(state): State<AppState>,
    Path(handle): Path<Fingerprint>,
) -> Result<StatusCode, StatusCode> {
    state.service.stop(handle).await.map_err(|e| {
        error!(error = %e, fingerprint = handle, "failed to stop indicator");
        status_of(&e)
    })?;
    state.latest.write().await.remove(&handle);
    Ok(StatusCode::NO_CONTENT)
}

/// Raw historical candles, passed through from the feed
async fn get_klines(
    State(state): State<AppState>,
    Query(params): Query<KlinesQuery>,
) -> Result<Json<Value>, StatusCode> {
    let candles = state
        .service
        .history(&params.symbol, &params.interval, params.until)
        .await
        .map_err(|e| {
            error!(error = %e, symbol = %params.symbol, "kline fetch failed");
            status_of(&e)
        })?;
    Ok(Json(json!(candles)))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/api/indicators", get(list_indicators))
        .route("/api/indicators", post(create_indicator))
        .route("/api/indicators/{fingerprint}/values", get(get_values))
        .route("/api/indicators/{fingerprint}/latest", get(get_latest))
        .route("/api/indicators/{fingerprint}", delete(stop_indicator))
        .route("/api/klines", get(get_klines))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                        .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
                )
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    metrics_middleware,
                ))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

pub fn app_state(service: Arc<IndicatorService>, metrics: Arc<Metrics>) -> AppState {
    AppState {
        service,
        latest: Arc::new(RwLock::new(HashMap::new())),
        metrics,
        health: Arc::new(RwLock::new(HealthStatus::default())),
        start_time: Arc::new(Instant::now()),
    }
}

pub async fn start_server(
    service: Arc<IndicatorService>,
    metrics: Arc<Metrics>,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = app_state(service, metrics);
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!(port = port, "HTTP server listening on port {}", port);
    axum::serve(listener, app).await?;

    Ok(())
}
