//! Sliding-window rate limiting.
//!
//! Each identifier owns a list of admitted request timestamps. A check
//! prunes entries older than the window, compares the remaining count
//! against the limit, and only appends the new timestamp when admitted.
//! The pruned list is persisted either way so that rejected traffic still
//! bounds storage.
//!
//! # Design Decisions
//! - Storage keys are SHA-256 digests, never the raw identifier
//! - Storage failures fail open: unreadable state counts as empty, failed
//!   writes are logged and ignored
//! - Read-prune-append is not atomic across concurrent requests; the limit
//!   is a soft bound under contention

use dashmap::DashMap;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use thiserror::Error;

use crate::clock::Clock;
use crate::config::{RateLimitConfig, RateLimitStorage};
use crate::persist::write_atomically;
use crate::security::digest::sha256_hex;

/// Errors raised by a rate-limit store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("stored window is corrupt: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Persistence for request windows, keyed by hashed identifier.
pub trait RateLimitStore: Send + Sync {
    /// Timestamps (unix millis) for `key`; empty when absent.
    fn load(&self, key: &str) -> Result<Vec<u64>, StoreError>;

    /// Replace the stored timestamps for `key`.
    fn save(&self, key: &str, timestamps: &[u64]) -> Result<(), StoreError>;

    /// Remove records not modified within `max_age`. Returns the number removed.
    fn sweep(&self, max_age: Duration) -> Result<usize, StoreError>;
}

#[derive(Debug, Clone)]
struct WindowRecord {
    timestamps: Vec<u64>,
    modified_ms: u64,
}

/// Sharded in-process store.
#[derive(Debug)]
pub struct MemoryRateLimitStore {
    records: DashMap<String, WindowRecord>,
    clock: Arc<dyn Clock>,
}

impl MemoryRateLimitStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: DashMap::new(),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RateLimitStore for MemoryRateLimitStore {
    fn load(&self, key: &str) -> Result<Vec<u64>, StoreError> {
        Ok(self
            .records
            .get(key)
            .map(|r| r.timestamps.clone())
            .unwrap_or_default())
    }

    fn save(&self, key: &str, timestamps: &[u64]) -> Result<(), StoreError> {
        self.records.insert(
            key.to_string(),
            WindowRecord {
                timestamps: timestamps.to_vec(),
                modified_ms: self.clock.now_millis(),
            },
        );
        Ok(())
    }

    fn sweep(&self, max_age: Duration) -> Result<usize, StoreError> {
        let cutoff = self
            .clock
            .now_millis()
            .saturating_sub(max_age.as_millis() as u64);
        let before = self.records.len();
        self.records.retain(|_, record| record.modified_ms >= cutoff);
        Ok(before.saturating_sub(self.records.len()))
    }
}

/// One JSON file per hashed identifier.
///
/// Writes land in a temporary file that is renamed over the target, so a
/// reader sees either the old or the new window, never a partial one.
#[derive(Debug)]
pub struct FileRateLimitStore {
    dir: PathBuf,
}

impl FileRateLimitStore {
    /// Open (and create if needed) the storage directory.
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl RateLimitStore for FileRateLimitStore {
    fn load(&self, key: &str) -> Result<Vec<u64>, StoreError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, key: &str, timestamps: &[u64]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(timestamps)?;
        write_atomically(&self.path_for(key), &bytes)?;
        Ok(())
    }

    fn sweep(&self, max_age: Duration) -> Result<usize, StoreError> {
        let now = SystemTime::now();
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let modified = match entry.metadata().and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(_) => continue,
            };
            let age = now.duration_since(modified).unwrap_or_default();
            if age > max_age && fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Outcome of one admission check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    /// Requests counted in the window after this check.
    pub request_count: u32,
    pub remaining: u32,
    pub window_secs: u64,
    /// Seconds until the oldest retained request leaves the window.
    pub reset_after_secs: u64,
    /// Unix time (seconds) at which the window frees a slot.
    pub reset_at: u64,
}

/// Sliding-window limiter over a pluggable store.
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
    enabled: bool,
    max_requests: u32,
    window_secs: u64,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("enabled", &self.enabled)
            .field("max_requests", &self.max_requests)
            .field("window_secs", &self.window_secs)
            .finish()
    }
}

impl RateLimiter {
    pub fn new(
        store: Arc<dyn RateLimitStore>,
        clock: Arc<dyn Clock>,
        max_requests: u32,
        window_secs: u64,
    ) -> Self {
        Self {
            store,
            clock,
            enabled: true,
            max_requests,
            window_secs,
        }
    }

    /// Build the limiter and its configured store.
    pub fn from_config(config: &RateLimitConfig, clock: Arc<dyn Clock>) -> io::Result<Self> {
        let store: Arc<dyn RateLimitStore> = match config.storage {
            RateLimitStorage::Memory => Arc::new(MemoryRateLimitStore::new(clock.clone())),
            RateLimitStorage::File => Arc::new(FileRateLimitStore::open(&config.storage_path)?),
        };
        let mut limiter = Self::new(store, clock, config.max_requests, config.window_seconds);
        limiter.enabled = config.enabled;
        Ok(limiter)
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window_secs(&self) -> u64 {
        self.window_secs
    }

    /// Storage key for an identifier.
    pub fn storage_key(identifier: &str) -> String {
        sha256_hex(identifier)
    }

    /// Admit or reject one request for `identifier`.
    pub fn check_limit(
        &self,
        identifier: &str,
        max_requests: Option<u32>,
        window_secs: Option<u64>,
    ) -> RateLimitDecision {
        let limit = max_requests.unwrap_or(self.max_requests);
        let window_secs = window_secs.unwrap_or(self.window_secs);
        let now_ms = self.clock.now_millis();

        if !self.enabled {
            return RateLimitDecision {
                allowed: true,
                limit,
                request_count: 0,
                remaining: limit,
                window_secs,
                reset_after_secs: 0,
                reset_at: now_ms / 1000,
            };
        }

        let key = Self::storage_key(identifier);
        let mut timestamps = self.active_window(&key, now_ms, window_secs);

        let allowed = (timestamps.len() as u64) < u64::from(limit);
        if allowed {
            timestamps.push(now_ms);
        }

        if let Err(e) = self.store.save(&key, &timestamps) {
            tracing::warn!(error = %e, "Failed to persist rate limit window, continuing");
        }

        let count = timestamps.len() as u32;
        let reset_after_secs = reset_after(&timestamps, now_ms, window_secs);
        RateLimitDecision {
            allowed,
            limit,
            request_count: count,
            remaining: limit.saturating_sub(count),
            window_secs,
            reset_after_secs,
            reset_at: now_ms / 1000 + reset_after_secs,
        }
    }

    /// Requests currently counted in the window for `identifier`.
    pub fn request_count(&self, identifier: &str) -> u32 {
        let key = Self::storage_key(identifier);
        self.active_window(&key, self.clock.now_millis(), self.window_secs)
            .len() as u32
    }

    /// `max(0, limit - count)` for the configured limit.
    pub fn remaining(&self, identifier: &str) -> u32 {
        self.max_requests
            .saturating_sub(self.request_count(identifier))
    }

    /// Seconds until the oldest retained request ages out (0 when empty).
    pub fn reset_time(&self, identifier: &str) -> u64 {
        let now_ms = self.clock.now_millis();
        let key = Self::storage_key(identifier);
        let timestamps = self.active_window(&key, now_ms, self.window_secs);
        reset_after(&timestamps, now_ms, self.window_secs)
    }

    /// Remove records untouched for longer than `max_age`.
    pub fn sweep(&self, max_age: Duration) -> usize {
        match self.store.sweep(max_age) {
            Ok(removed) => {
                tracing::debug!(removed, "Rate limit sweep finished");
                removed
            }
            Err(e) => {
                tracing::warn!(error = %e, "Rate limit sweep failed");
                0
            }
        }
    }

    /// Load and prune; unreadable state counts as no prior requests.
    fn active_window(&self, key: &str, now_ms: u64, window_secs: u64) -> Vec<u64> {
        let mut timestamps = self.store.load(key).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to read rate limit window, treating as empty");
            Vec::new()
        });
        let cutoff = now_ms.saturating_sub(window_secs.saturating_mul(1000));
        timestamps.retain(|&ts| ts > cutoff);
        timestamps.sort_unstable();
        timestamps
    }
}

fn reset_after(timestamps: &[u64], now_ms: u64, window_secs: u64) -> u64 {
    match timestamps.first() {
        Some(&oldest) => {
            let frees_at = oldest + window_secs * 1000;
            frees_at.saturating_sub(now_ms).div_ceil(1000)
        }
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn limiter(max: u32, window: u64) -> (RateLimiter, Arc<ManualClock>, Arc<MemoryRateLimitStore>) {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(MemoryRateLimitStore::new(clock.clone()));
        let limiter = RateLimiter::new(store.clone(), clock.clone(), max, window);
        (limiter, clock, store)
    }

    #[test]
    fn test_rejects_after_limit_within_window() {
        let (limiter, clock, _) = limiter(3, 60);
        for expected_remaining in [2, 1, 0] {
            let decision = limiter.check_limit("ip:1.2.3.4", None, None);
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
            clock.advance(Duration::from_secs(1));
        }

        let rejected = limiter.check_limit("ip:1.2.3.4", None, None);
        assert!(!rejected.allowed);
        assert_eq!(rejected.remaining, 0);
        assert_eq!(rejected.request_count, 3);
        // Oldest request was 3 seconds ago in a 60 second window
        assert_eq!(rejected.reset_after_secs, 57);
        assert_eq!(rejected.reset_at, clock.now_secs() + 57);

        // Other identifiers are independent
        assert!(limiter.check_limit("ip:5.6.7.8", None, None).allowed);
    }

    #[test]
    fn test_admission_resumes_when_oldest_ages_out() {
        let (limiter, clock, _) = limiter(2, 10);
        assert!(limiter.check_limit("u", None, None).allowed);
        clock.advance(Duration::from_secs(5));
        assert!(limiter.check_limit("u", None, None).allowed);
        assert!(!limiter.check_limit("u", None, None).allowed);

        // First request leaves the window, one slot frees up
        clock.advance(Duration::from_secs(5));
        assert!(limiter.check_limit("u", None, None).allowed);
        assert!(!limiter.check_limit("u", None, None).allowed);
    }

    #[test]
    fn test_rejection_persists_pruned_window() {
        let (limiter, clock, store) = limiter(1, 10);
        let key = RateLimiter::storage_key("u");
        let now = clock.now_millis();
        store.save(&key, &[1, 2, now]).unwrap();
        assert!(!limiter.check_limit("u", None, None).allowed);
        assert_eq!(store.load(&key).unwrap(), vec![now]);
    }

    #[test]
    fn test_overrides_take_precedence() {
        let (limiter, _, _) = limiter(100, 60);
        assert!(limiter.check_limit("u", Some(1), Some(30)).allowed);
        let decision = limiter.check_limit("u", Some(1), Some(30));
        assert!(!decision.allowed);
        assert_eq!(decision.limit, 1);
        assert_eq!(decision.window_secs, 30);
    }

    #[test]
    fn test_derived_values() {
        let (limiter, clock, _) = limiter(5, 60);
        assert_eq!(limiter.remaining("u"), 5);
        assert_eq!(limiter.reset_time("u"), 0);

        limiter.check_limit("u", None, None);
        clock.advance(Duration::from_millis(20_500));
        limiter.check_limit("u", None, None);

        assert_eq!(limiter.request_count("u"), 2);
        assert_eq!(limiter.remaining("u"), 3);
        // 60s - 20.5s, rounded up
        assert_eq!(limiter.reset_time("u"), 40);
    }

    #[test]
    fn test_storage_key_hides_identifier() {
        let key = RateLimiter::storage_key("key:secret-api-key");
        assert_eq!(key.len(), 64);
        assert!(!key.contains("secret"));
    }

    #[test]
    fn test_disabled_limiter_always_admits() {
        let (limiter, _, store) = limiter(1, 60);
        let limiter = limiter.disabled();
        for _ in 0..5 {
            assert!(limiter.check_limit("u", None, None).allowed);
        }
        assert!(store.is_empty());
    }

    #[test]
    fn test_sweep_removes_stale_records() {
        let (limiter, clock, store) = limiter(5, 10);
        limiter.check_limit("old", None, None);
        // A rejected-only identifier leaves an empty record behind
        limiter.check_limit("empty", Some(0), None);
        clock.advance(Duration::from_secs(120));
        limiter.check_limit("fresh", None, None);

        assert_eq!(store.len(), 3);
        assert_eq!(limiter.sweep(Duration::from_secs(60)), 2);
        assert_eq!(store.len(), 1);
    }

    struct FailingStore;

    impl RateLimitStore for FailingStore {
        fn load(&self, _key: &str) -> Result<Vec<u64>, StoreError> {
            Err(StoreError::Io(io::Error::other("disk gone")))
        }
        fn save(&self, _key: &str, _timestamps: &[u64]) -> Result<(), StoreError> {
            Err(StoreError::Io(io::Error::other("disk gone")))
        }
        fn sweep(&self, _max_age: Duration) -> Result<usize, StoreError> {
            Err(StoreError::Io(io::Error::other("disk gone")))
        }
    }

    #[test]
    fn test_store_failures_fail_open() {
        let clock = Arc::new(ManualClock::default());
        let limiter = RateLimiter::new(Arc::new(FailingStore), clock, 1, 60);
        for _ in 0..3 {
            assert!(limiter.check_limit("u", None, None).allowed);
        }
        assert_eq!(limiter.sweep(Duration::ZERO), 0);
    }

    #[test]
    fn test_file_store_round_trip_and_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRateLimitStore::open(dir.path().join("windows")).unwrap();

        assert_eq!(store.load("abc").unwrap(), Vec::<u64>::new());
        store.save("abc", &[10, 20]).unwrap();
        assert_eq!(store.load("abc").unwrap(), vec![10, 20]);

        fs::write(dir.path().join("windows/abc.json"), b"{not json").unwrap();
        assert!(matches!(store.load("abc"), Err(StoreError::Decode(_))));

        // The limiter treats the corrupt record as empty
        let clock = Arc::new(ManualClock::default());
        let limiter = RateLimiter::new(Arc::new(store), clock, 1, 60);
        let key = RateLimiter::storage_key("someone");
        fs::write(dir.path().join(format!("windows/{key}.json")), b"garbage").unwrap();
        assert!(limiter.check_limit("someone", None, None).allowed);
        assert!(!limiter.check_limit("someone", None, None).allowed);
    }

    #[test]
    fn test_file_store_sweep() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRateLimitStore::open(dir.path()).unwrap();
        store.save("a", &[]).unwrap();
        store.save("b", &[1]).unwrap();

        assert_eq!(store.sweep(Duration::from_secs(3600)).unwrap(), 0);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(store.sweep(Duration::from_millis(1)).unwrap(), 2);
        assert_eq!(store.load("a").unwrap(), Vec::<u64>::new());
    }
}
