//! Disk-backed cache for upstream indicator payloads
//!
//! Stores each entry as a JSON file with an expiry timestamp. Expired entries
//! stay on disk until the same key is written again; `CacheStore::get` treats
//! them as absent.

use chrono::{DateTime, Duration, Utc};
use directories::ProjectDirs;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{CacheEntry, CacheStore, StorageError};

/// On-disk wrapper around a cached payload
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry<T> {
    data: T,
    cached_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// Result of reading from cache, including metadata about cache freshness
#[derive(Debug)]
pub struct CachedData<T> {
    /// The cached data
    pub data: T,
    /// When the data was originally cached
    pub cached_at: DateTime<Utc>,
    /// When the entry stops being served
    pub expires_at: DateTime<Utc>,
    /// Whether the cache entry has expired
    pub is_expired: bool,
}

/// Manages reading and writing cached data to disk
///
/// Entries live in an XDG-compliant cache directory (`~/.cache/kpiboard/` on
/// Linux) unless a directory is given explicitly.
#[derive(Debug, Clone)]
pub struct CacheManager {
    cache_dir: PathBuf,
}

impl CacheManager {
    /// Creates a CacheManager in the XDG cache directory.
    ///
    /// Returns `None` if the cache directory cannot be determined (e.g., no home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "kpiboard")?;
        let cache_dir = project_dirs.cache_dir().to_path_buf();
        Some(Self { cache_dir })
    }

    /// Creates a CacheManager with a custom cache directory
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Directory holding the cache files
    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    fn cache_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", key))
    }

    /// Writes data to the cache, replacing any previous entry for `key`.
    ///
    /// # Arguments
    /// * `key` - Cache key, see `cache_key` and `metric_cache_key`
    /// * `data` - The payload to cache
    /// * `ttl` - How long the entry is served by `get`
    ///
    /// # Returns
    /// * `Ok(())` on success
    /// * `Err` if directory creation, encoding or the file write fails
    pub fn write<T: Serialize>(
        &self,
        key: &str,
        data: &T,
        ttl: Duration,
    ) -> Result<(), StorageError> {
        fs::create_dir_all(&self.cache_dir)?;

        let now = Utc::now();
        let entry = StoredEntry {
            data,
            cached_at: now,
            expires_at: now + ttl,
        };

        let json = serde_json::to_string_pretty(&entry)?;
        fs::write(self.cache_path(key), json)?;
        Ok(())
    }

    /// Reads data from the cache
    ///
    /// Returns `None` if the entry doesn't exist or cannot be parsed. Expired
    /// entries are still returned, flagged with `is_expired = true`.
    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Option<CachedData<T>> {
        let content = fs::read_to_string(self.cache_path(key)).ok()?;
        let entry: StoredEntry<T> = serde_json::from_str(&content).ok()?;

        Some(CachedData {
            data: entry.data,
            cached_at: entry.cached_at,
            expires_at: entry.expires_at,
            is_expired: Utc::now() > entry.expires_at,
        })
    }
}

impl CacheStore for CacheManager {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        let cached = self.read::<serde_json::Value>(key)?;
        if cached.is_expired {
            return None;
        }
        Some(CacheEntry {
            payload: cached.data,
            cached_at: cached.cached_at,
            expires_at: cached.expires_at,
        })
    }

    fn put(
        &self,
        key: &str,
        payload: &serde_json::Value,
        ttl: Duration,
    ) -> Result<(), StorageError> {
        self.write(key, payload, ttl)
    }
}

/// Process-local cache used when no cache directory is available
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        let guard = self.entries.lock().ok()?;
        let entry = guard.get(key)?;
        if Utc::now() > entry.expires_at {
            return None;
        }
        Some(entry.clone())
    }

    fn put(
        &self,
        key: &str,
        payload: &serde_json::Value,
        ttl: Duration,
    ) -> Result<(), StorageError> {
        let now = Utc::now();
        let mut guard = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        guard.insert(
            key.to_string(),
            CacheEntry {
                payload: payload.clone(),
                cached_at: now,
                expires_at: now + ttl,
            },
        );
        Ok(())
    }
}
