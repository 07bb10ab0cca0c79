//! In-process cache driver.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

use super::{key_matcher, CacheEntry, CacheError, CacheStats, CacheStore, StatsCounters};
use crate::clock::Clock;

/// Entries in a concurrent map; each `set` replaces the whole entry.
#[derive(Debug)]
pub struct MemoryCacheStore {
    entries: DashMap<String, CacheEntry>,
    counters: StatsCounters,
    clock: Arc<dyn Clock>,
}

impl MemoryCacheStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            counters: StatsCounters::default(),
            clock,
        }
    }

    fn live_entry(&self, key: &str) -> Option<CacheEntry> {
        let now = self.clock.now_millis();
        let entry = self.entries.get(key).map(|e| e.value().clone())?;
        if entry.is_expired(now) {
            self.entries.remove_if(key, |_, e| e.is_expired(now));
            return None;
        }
        Some(entry)
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        match self.live_entry(key) {
            Some(entry) => {
                self.counters.hit();
                Ok(Some(entry.value))
            }
            None => {
                self.counters.miss();
                Ok(None)
            }
        }
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let entry = CacheEntry::new(key, value, self.clock.now_millis(), ttl);
        self.entries.insert(key.to_string(), entry);
        self.counters.write();
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.counters.deleted(1);
        }
        Ok(removed)
    }

    fn delete_pattern(&self, pattern: &str) -> Result<usize, CacheError> {
        let matcher = key_matcher(pattern)?;
        let before = self.entries.len();
        self.entries.retain(|key, _| !matcher.is_match(key));
        let removed = before.saturating_sub(self.entries.len());
        self.counters.deleted(removed);
        Ok(removed)
    }

    fn clear(&self) -> Result<(), CacheError> {
        let removed = self.entries.len();
        self.entries.clear();
        self.counters.deleted(removed);
        Ok(())
    }

    fn has(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.live_entry(key).is_some())
    }

    fn stats(&self) -> CacheStats {
        self.counters.snapshot("memory", self.entries.len())
    }

    fn purge_expired(&self) -> Result<usize, CacheError> {
        let now = self.clock.now_millis();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        Ok(before.saturating_sub(self.entries.len()))
    }
}
