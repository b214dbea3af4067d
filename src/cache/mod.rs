//! Short-lived response cache for the global feed.
//!
//! Rendered responses are memoized under a key built from a static prefix,
//! the request path and the query string. Entries live for a fixed TTL
//! measured from insertion; reads never extend it. A capacity bound evicts
//! the oldest insertion first and only limits memory.
//!
//! ```toml
//! [cache]
//! enabled = true
//! ttl_seconds = 20
//! max_entries = 256
//! ```

mod config;
mod keys;
mod lock;
mod middleware;
mod store;

pub use config::CacheConfig;
pub use keys::{INDEX_PAGE_PREFIX, ResponseKey, hash_query};
pub use middleware::{CacheState, response_cache_layer, should_store_response};
pub use store::{CachedResponse, ResponseStore};
