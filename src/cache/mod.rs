//! Storage for fetched indicator data
//!
//! Two stores live here: the cache of upstream payloads keyed by
//! `(indicator, region, year)` with a one hour time-to-live, and the durable
//! metrics table holding the latest resolved value per
//! `(indicator, region, year, gender)`. Both are last-write-wins upserts.

mod manager;
mod metrics;

pub use manager::{CacheManager, CachedData, MemoryCache};
pub use metrics::{MetricKey, MetricRecord, MetricsTable};

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

/// Time-to-live for cached upstream payloads
pub fn cache_ttl() -> Duration {
    Duration::hours(1)
}

/// Cache key for the raw points upstream returned for exactly this year
pub fn cache_key(indicator_id: u32, region: &str, year: i32) -> String {
    format!("data_{}_{}_{}", indicator_id, region, year)
}

/// Cache key for the points backing a resolved metric of the requested year.
///
/// The points may come from an earlier year when the requested one had no
/// data, so they never share a key with `cache_key`.
pub fn metric_cache_key(indicator_id: u32, region: &str, year: i32) -> String {
    format!("metric_{}_{}_{}", indicator_id, region, year)
}

/// Errors from cache or metrics writes
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize stored data: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("storage lock poisoned")]
    Poisoned,
}

/// A cached upstream payload with its freshness window
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub payload: serde_json::Value,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Key-value cache for upstream payloads
///
/// `get` never returns an entry whose expiry has passed.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Option<CacheEntry>;

    fn put(
        &self,
        key: &str,
        payload: &serde_json::Value,
        ttl: Duration,
    ) -> Result<(), StorageError>;
}
