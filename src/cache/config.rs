//! Cache configuration.

use std::{num::NonZeroUsize, time::Duration};

const DEFAULT_TTL_SECS: u64 = 20;
const DEFAULT_MAX_ENTRIES: usize = 256;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Serve and store cached responses.
    pub enabled: bool,
    /// Lifetime of an entry, counted from insertion.
    pub ttl: Duration,
    /// Entries kept before the oldest insertion is evicted.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            ttl: settings.ttl,
            max_entries: settings.max_entries.get(),
        }
    }
}

impl CacheConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled && !self.ttl.is_zero()
    }

    /// Capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn max_entries_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_entries).unwrap_or(NonZeroUsize::MIN)
    }
}
