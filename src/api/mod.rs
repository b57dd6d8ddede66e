//! HTTP surface: ingestion endpoint, read endpoints and middleware
//!
//! Routes other than `/health` pass through two layers: a per-client-IP
//! rate limit (outermost) and a response cache for the cacheable read
//! surface. `/health` is registered outside both.

pub mod handlers;
pub mod ratelimit;
pub mod response_cache;

pub use response_cache::CachedResponse;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderMap;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::cache::TtlCache;
use crate::enrichment::EnrichmentService;
use crate::persistence::AlertStore;
use crate::pipeline::EventIngestionPipeline;
use crate::ratelimit::SlidingWindowLimiter;

/// Shared state handed to every handler and middleware
pub struct AppState {
    pub limiter: Arc<SlidingWindowLimiter>,
    pub response_cache: Arc<TtlCache<CachedResponse>>,
    pub pipeline: Arc<EventIngestionPipeline>,
    pub store: Arc<dyn AlertStore>,
    pub enrichment: Arc<EnrichmentService>,
}

/// Build the router with all routes and middleware attached.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/honeypot", post(handlers::receive_honeypot))
        .route("/alerts/recent", get(handlers::recent_alerts))
        .route("/stats", get(handlers::stats))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            response_cache::response_cache_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            ratelimit::rate_limit_middleware,
        ))
        .route("/health", get(handlers::health))
        .with_state(state)
}

/// Client identity: first hop of `X-Forwarded-For` when present, else
/// the socket peer address.
pub(crate) fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
