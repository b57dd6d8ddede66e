//! Per-client-IP rate-limit middleware
//!
//! Every non-excluded request consumes one slot of the shared sliding
//! window keyed by client IP. Responses carry the standard
//! `X-RateLimit-*` headers; rejections answer 429 with a plain-text
//! body and the reset instant in epoch seconds.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::{client_ip, AppState};

/// Paths never subject to rate limiting (probes must stay reachable)
const EXCLUDED_PATHS: &[&str] = &["/health"];

pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if EXCLUDED_PATHS.iter().any(|p| path.starts_with(p)) {
        return next.run(request).await;
    }

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0);
    let key = client_ip(request.headers(), peer);

    let allowed = state.limiter.check(&key);
    let limit = state.limiter.max_requests();
    let remaining = state.limiter.remaining(&key);

    if !allowed {
        log::warn!("Rate limit exceeded for {} on {}", key, path);
        let reset = state.limiter.reset_epoch(&key).unwrap_or_else(|| {
            let epoch_now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
            epoch_now + state.limiter.window().as_secs()
        });

        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            "Rate limit exceeded. Please try again later.",
        )
            .into_response();
        let headers = response.headers_mut();
        headers.insert("X-RateLimit-Limit", HeaderValue::from(limit));
        headers.insert("X-RateLimit-Remaining", HeaderValue::from(0));
        headers.insert("X-RateLimit-Reset", HeaderValue::from(reset));
        return response;
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Limit", HeaderValue::from(limit));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(remaining));
    response
}
