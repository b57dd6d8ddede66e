//! Response-cache middleware
//!
//! Caches successful GET/HEAD responses on the cacheable read surface.
//! The cache key is a sha256 digest over path, sorted query string
//! (minus cache-buster parameters) and the selected Vary headers, so
//! clients negotiating different representations never share entries.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};

use super::AppState;

/// Path prefixes eligible for caching
const CACHEABLE_PREFIXES: &[&str] = &["/alerts"];

/// Path prefixes never cached regardless of method
const EXCLUDED_PREFIXES: &[&str] = &["/health", "/stats", "/honeypot"];

/// Query parameters ignored when building the key (cache busters)
const EXCLUDED_QUERY_PARAMS: &[&str] = &["_", "timestamp"];

/// Request headers folded into the key
const VARY_HEADERS: &[&str] = &["accept", "accept-encoding"];

/// A buffered response held by the cache
#[derive(Clone)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

fn is_cacheable(request: &Request) -> bool {
    if request.method() != Method::GET && request.method() != Method::HEAD {
        return false;
    }
    let path = request.uri().path();
    if EXCLUDED_PREFIXES.iter().any(|p| path.starts_with(p)) {
        return false;
    }
    CACHEABLE_PREFIXES.iter().any(|p| path.starts_with(p))
}

fn cache_key(request: &Request) -> String {
    let mut params: Vec<(&str, &str)> = request
        .uri()
        .query()
        .map(|q| {
            q.split('&')
                .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
                .filter(|(name, _)| !EXCLUDED_QUERY_PARAMS.contains(name))
                .collect()
        })
        .unwrap_or_default();
    params.sort_unstable();

    let mut material = request.uri().path().to_string();
    for (name, value) in &params {
        material.push('&');
        material.push_str(name);
        material.push('=');
        material.push_str(value);
    }
    for name in VARY_HEADERS {
        if let Some(value) = request.headers().get(*name).and_then(|v| v.to_str().ok()) {
            material.push('|');
            material.push_str(name);
            material.push(':');
            material.push_str(value);
        }
    }

    let digest = Sha256::digest(material.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

pub async fn response_cache_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if !is_cacheable(&request) {
        return next.run(request).await;
    }

    let key = cache_key(&request);
    if let Some(cached) = state.response_cache.get(&key) {
        log::debug!("Response cache hit for {}", request.uri().path());
        let mut response = Response::new(Body::from(cached.body));
        *response.status_mut() = cached.status;
        *response.headers_mut() = cached.headers;
        response
            .headers_mut()
            .insert("X-Cache", HeaderValue::from_static("HIT"));
        return response;
    }

    let response = next.run(request).await;
    let status = response.status();
    if !(status.is_success() || status.is_redirection()) {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            log::error!("Failed to buffer response body for caching: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    state.response_cache.set(
        &key,
        CachedResponse {
            status,
            headers: parts.headers.clone(),
            body: bytes.clone(),
        },
    );

    parts.headers.insert("X-Cache", HeaderValue::from_static("MISS"));
    Response::from_parts(parts, Body::from(bytes))
}
