//! Request handlers

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use super::{client_ip, AppState};
use crate::models::HoneypotEvent;

const DEFAULT_ALERT_LIMIT: usize = 50;
const MAX_ALERT_LIMIT: usize = 500;

/// `POST /honeypot`: acknowledge and enqueue a mirrored-traffic event.
///
/// Always answers 202; the acknowledgment is independent of downstream
/// processing. Events with an unparseable source IP are dropped before
/// the queue.
pub async fn receive_honeypot(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(event): Json<HoneypotEvent>,
) -> impl IntoResponse {
    let client = client_ip(&headers, connect_info.map(|ci| ci.0));
    log::info!(
        "Received honeypot trigger from client {}, source IP {}",
        client,
        event.source_ip
    );

    state.pipeline.submit(event);

    (
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "Honeypot data received and queued for processing.",
            "client_ip": client,
        })),
    )
}

#[derive(Debug, Deserialize)]
pub struct RecentAlertsQuery {
    pub limit: Option<usize>,
}

/// `GET /alerts/recent?limit=N`: most recent stored alerts, newest first.
pub async fn recent_alerts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecentAlertsQuery>,
) -> Response {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_ALERT_LIMIT)
        .min(MAX_ALERT_LIMIT);

    let store = Arc::clone(&state.store);
    match tokio::task::spawn_blocking(move || store.recent_alerts(limit)).await {
        Ok(Ok(alerts)) => Json(alerts).into_response(),
        Ok(Err(e)) => {
            log::error!("Failed to read recent alerts: {}", e);
            storage_error()
        }
        Err(e) => {
            log::error!("Recent-alerts task failed: {}", e);
            storage_error()
        }
    }
}

fn storage_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "storage unavailable"})),
    )
        .into_response()
}

/// `GET /health`: liveness probe, outside caching and rate limiting.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

/// `GET /stats`: cache, limiter and pipeline counters.
pub async fn stats(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "pipeline": state.pipeline.stats(),
        "response_cache": state.response_cache.stats(),
        "enrichment_cache": state.enrichment.cache_stats(),
        "rate_limit": {
            "max_requests": state.limiter.max_requests(),
            "window_seconds": state.limiter.window().as_secs(),
        },
    }))
}
