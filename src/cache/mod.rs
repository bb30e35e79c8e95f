//! In-memory memoization of report results.
//!
//! Results are stored as JSON under keys that combine the warehouse version
//! with a content hash of the request, so a reload can never serve a stale
//! table or metric.
//!
//! # Key Format
//!
//! ```text
//! v{version}:table:{request_hash}     -> TableView
//! v{version}:formula:{request_hash}   -> FormulaResult
//! v{version}:series:{request_hash}    -> [SeriesPoint, ...]
//! ```

mod hash;
pub use hash::compute_hash;

use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};

/// Errors that can occur during cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;

struct Entry {
    version: u64,
    json: String,
}

/// Concurrent key-value store of serialized results.
#[derive(Default)]
pub struct ReportCache {
    entries: DashMap<String, Entry>,
}

impl ReportCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value from the cache.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        match self.entries.get(key) {
            Some(entry) => Ok(Some(serde_json::from_str(&entry.json)?)),
            None => Ok(None),
        }
    }

    /// Set a value in the cache, tagged with the warehouse version it was
    /// computed from.
    pub fn set<T: Serialize>(&self, key: &str, version: u64, value: &T) -> CacheResult<()> {
        let json = serde_json::to_string(value)?;
        self.entries.insert(key.to_string(), Entry { version, json });
        Ok(())
    }

    /// Return the cached value for `key`, computing and storing it on a miss.
    pub fn get_or_compute<T, F>(&self, key: &str, version: u64, compute: F) -> CacheResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        if let Some(hit) = self.get(key)? {
            return Ok(hit);
        }
        let value = compute();
        self.set(key, version, &value)?;
        Ok(value)
    }

    /// Delete a value from the cache.
    pub fn delete(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drop every entry computed from a version other than `version`.
    /// Returns the number of entries removed.
    pub fn retain_version(&self, version: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.version == version);
        before - self.entries.len()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.entries.len(),
            total_size_bytes: self.entries.iter().map(|e| e.json.len()).sum(),
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub entry_count: usize,
    pub total_size_bytes: usize,
}

/// Helper for generating cache keys.
pub struct CacheKey;

impl CacheKey {
    /// Key for a materialized, filtered and sorted table.
    pub fn table(version: u64, request_hash: &str) -> String {
        format!("v{}:table:{}", version, request_hash)
    }

    /// Key for a formula evaluation (block results plus calculation).
    pub fn formula(version: u64, request_hash: &str) -> String {
        format!("v{}:formula:{}", version, request_hash)
    }

    /// Key for a block series.
    pub fn series(version: u64, request_hash: &str) -> String {
        format!("v{}:series:{}", version, request_hash)
    }
}
