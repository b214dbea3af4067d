//! Response store with a fixed time-to-live.

use std::sync::RwLock;
use std::time::Duration;

use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::Response,
};
use bytes::Bytes;
use lru::LruCache;
use metrics::counter;
use tokio::time::Instant;

use super::config::CacheConfig;
use super::keys::ResponseKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

/// A buffered response ready to be replayed.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    status: StatusCode,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: Bytes,
}

impl CachedResponse {
    pub fn new(status: StatusCode, headers: &HeaderMap, body: Bytes) -> Self {
        let headers = headers
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        Self {
            status,
            headers,
            body,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        for (name, value) in self.headers {
            headers.append(name, value);
        }
        response
    }
}

#[derive(Debug, Clone)]
struct Entry {
    response: CachedResponse,
    expires_at: Instant,
}

/// Bounded map of cached responses.
///
/// Lookups use `peek`, so recency never changes and the LRU order is the
/// insertion order: a full store evicts the oldest insertion.
pub struct ResponseStore {
    entries: RwLock<LruCache<ResponseKey, Entry>>,
    ttl: Duration,
}

impl ResponseStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.max_entries_non_zero())),
            ttl: config.ttl,
        }
    }

    /// Return a live entry. An expired entry is removed and reported as a miss.
    pub fn get(&self, key: &ResponseKey) -> Option<CachedResponse> {
        let now = Instant::now();
        {
            let entries = rw_read(&self.entries, SOURCE, "get");
            match entries.peek(key) {
                Some(entry) if entry.expires_at > now => {
                    counter!("yatube_cache_hit_total").increment(1);
                    return Some(entry.response.clone());
                }
                Some(_) => {}
                None => {
                    counter!("yatube_cache_miss_total").increment(1);
                    return None;
                }
            }
        }

        let mut entries = rw_write(&self.entries, SOURCE, "expire");
        // Another request may have refreshed the entry between the two locks.
        if let Some(entry) = entries.peek(key) {
            if entry.expires_at > now {
                counter!("yatube_cache_hit_total").increment(1);
                return Some(entry.response.clone());
            }
            entries.pop(key);
            counter!("yatube_cache_expired_total").increment(1);
        }
        counter!("yatube_cache_miss_total").increment(1);
        None
    }

    /// Store a response; returns the key evicted to make room, if any.
    pub fn insert(&self, key: ResponseKey, response: CachedResponse) -> Option<ResponseKey> {
        let entry = Entry {
            response,
            expires_at: Instant::now() + self.ttl,
        };
        counter!("yatube_cache_store_total").increment(1);

        let mut entries = rw_write(&self.entries, SOURCE, "insert");
        // Re-inserting a key replaces it in place; that is not an eviction.
        entries.pop(&key);
        let evicted = entries.push(key, entry).map(|(evicted, _)| evicted);
        if evicted.is_some() {
            counter!("yatube_cache_evict_total").increment(1);
        }
        evicted
    }

    /// Drop every entry immediately.
    pub fn flush(&self) {
        rw_write(&self.entries, SOURCE, "flush").clear();
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
