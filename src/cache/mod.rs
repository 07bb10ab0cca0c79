//! Response cache subsystem.
//!
//! # Data Flow
//! ```text
//! read action (list/count/read)
//!     → manager.rs (key = prefix:table:action:digest(params, variation))
//!     → CacheStore::get → hit: serve payload, skip handler
//!                       → miss: run handler, CacheStore::set with table TTL
//!
//! write action (create/update/delete/bulk_*)
//!     → run handler
//!     → CacheStore::delete_pattern("prefix:table:*")
//! ```
//!
//! # Design Decisions
//! - Keys are built from sorted parameters so equivalent requests share entries
//! - Invalidation is table-wide, across every variation key
//! - Storage failures degrade to a miss, never to a failed request

pub mod file;
pub mod manager;
pub mod memory;

use globset::{Glob, GlobMatcher};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;

pub use file::FileCacheStore;
pub use manager::CacheManager;
pub use memory::MemoryCacheStore;

/// Errors raised by a cache store.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache entry is corrupt: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid key pattern: {0}")]
    Pattern(#[from] globset::Error),
}

/// A stored value with its expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: String,
    pub created_at_ms: u64,
    pub ttl_secs: u64,
    pub expires_at_ms: u64,
}

impl CacheEntry {
    pub fn new(key: &str, value: &str, now_ms: u64, ttl: Duration) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
            created_at_ms: now_ms,
            ttl_secs: ttl.as_secs(),
            expires_at_ms: now_ms + ttl.as_millis() as u64,
        }
    }

    /// Entries are gone once `expires_at <= now`.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at_ms <= now_ms
    }
}

/// Snapshot of store counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub driver: &'static str,
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub deletes: u64,
}

/// Storage driver contract.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value` under `key`, replacing any previous entry atomically.
    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Returns whether an entry was removed.
    fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Remove every key matching a `*` glob. Returns the number removed.
    fn delete_pattern(&self, pattern: &str) -> Result<usize, CacheError>;

    fn clear(&self) -> Result<(), CacheError>;

    fn has(&self, key: &str) -> Result<bool, CacheError>;

    fn stats(&self) -> CacheStats;

    /// Remove expired entries. Returns the number removed.
    fn purge_expired(&self) -> Result<usize, CacheError>;
}

/// Counters shared by the bundled drivers.
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn deleted(&self, count: usize) {
        self.deletes.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, driver: &'static str, size: usize) -> CacheStats {
        CacheStats {
            driver,
            size,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
        }
    }
}

/// Compile a key pattern for `delete_pattern`; `*` matches any run of characters.
pub(crate) fn key_matcher(pattern: &str) -> Result<GlobMatcher, CacheError> {
    Ok(Glob::new(pattern)?.compile_matcher())
}
