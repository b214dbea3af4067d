//! Cache key definitions.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Prefix for entries produced by the global feed.
pub const INDEX_PAGE_PREFIX: &str = "index_page";

/// Identifies one cached response. Deliberately blind to the caller: two
/// viewers requesting the same URL share an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResponseKey {
    prefix: &'static str,
    path: String,
    query_hash: u64,
}

impl ResponseKey {
    pub fn new(prefix: &'static str, path: &str, query: Option<&str>) -> Self {
        Self {
            prefix,
            path: path.to_string(),
            query_hash: hash_query(query.unwrap_or("")),
        }
    }

    pub fn prefix(&self) -> &'static str {
        self.prefix
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Hash a raw query string.
pub fn hash_query(query: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    query.hash(&mut hasher);
    hasher.finish()
}
