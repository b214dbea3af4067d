//! Response cache middleware.
//!
//! Serves GET requests from the store when a live entry exists and memoizes
//! `200 OK` responses that do not set cookies.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::BodyExt;
use tracing::{debug, instrument, warn};

use super::{
    CacheConfig,
    keys::ResponseKey,
    store::{CachedResponse, ResponseStore},
};

/// Shared cache state for the middleware.
#[derive(Clone)]
pub struct CacheState {
    pub config: CacheConfig,
    pub store: Arc<ResponseStore>,
    pub prefix: &'static str,
}

impl CacheState {
    pub fn new(config: CacheConfig, prefix: &'static str) -> Self {
        let store = Arc::new(ResponseStore::new(&config));
        Self {
            config,
            store,
            prefix,
        }
    }

    /// Drop every cached response.
    pub fn flush(&self) {
        self.store.flush();
    }
}

#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn response_cache_layer(
    State(cache): State<CacheState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !cache.config.is_enabled() || request.method() != Method::GET {
        return next.run(request).await;
    }

    let key = ResponseKey::new(cache.prefix, request.uri().path(), request.uri().query());

    if let Some(cached) = cache.store.get(&key) {
        debug!(outcome = "hit", "serving cached response");
        return cached.into_response();
    }

    debug!(outcome = "miss", "cache miss, executing handler");
    let response = next.run(request).await;

    if !should_store_response(&response) {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match BodyExt::collect(body).await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            warn!(error = %err, "failed to buffer response for caching");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let cached = CachedResponse::new(parts.status, &parts.headers, bytes.clone());
    if let Some(evicted) = cache.store.insert(key, cached) {
        debug!(evicted = evicted.path(), "evicted oldest cached response");
    }

    Response::from_parts(parts, Body::from(bytes))
}

/// Only plain `200 OK` responses without cookies are memoized.
pub fn should_store_response(response: &Response) -> bool {
    response.status() == StatusCode::OK && !response.headers().contains_key(header::SET_COOKIE)
}
