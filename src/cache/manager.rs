//! Cache policy: key derivation, TTL resolution, table-scoped invalidation.

use serde_json::json;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::sync::Arc;
use std::time::Duration;

use super::{CacheStats, CacheStore, FileCacheStore, MemoryCacheStore};
use crate::clock::Clock;
use crate::config::{CacheConfig, CacheDriver};
use crate::observability::metrics;
use crate::security::digest::sha256_hex;

pub struct CacheManager {
    store: Arc<dyn CacheStore>,
    enabled: bool,
    prefix: String,
    default_ttl: Duration,
    table_ttl: HashMap<String, Duration>,
    excluded: HashSet<String>,
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("enabled", &self.enabled)
            .field("prefix", &self.prefix)
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl CacheManager {
    pub fn new(store: Arc<dyn CacheStore>, config: &CacheConfig) -> Self {
        Self {
            store,
            enabled: config.enabled,
            prefix: config.key_prefix.clone(),
            default_ttl: Duration::from_secs(config.default_ttl_secs),
            table_ttl: config
                .table_ttl
                .iter()
                .map(|(table, secs)| (table.clone(), Duration::from_secs(*secs)))
                .collect(),
            excluded: config.excluded_tables.iter().cloned().collect(),
        }
    }

    /// Build the manager with the configured driver.
    pub fn from_config(config: &CacheConfig, clock: Arc<dyn Clock>) -> io::Result<Self> {
        let store: Arc<dyn CacheStore> = match config.driver {
            CacheDriver::Memory => Arc::new(MemoryCacheStore::new(clock)),
            CacheDriver::File => Arc::new(FileCacheStore::open(&config.path, clock)?),
        };
        Ok(Self::new(store, config))
    }

    /// Whether `table` participates in caching at all.
    pub fn applies_to(&self, table: &str) -> bool {
        self.enabled && !self.excluded.contains(table)
    }

    /// Per-table override, else the global default.
    pub fn ttl_for(&self, table: &str) -> Duration {
        self.table_ttl
            .get(table)
            .copied()
            .unwrap_or(self.default_ttl)
    }

    /// `prefix:table:action:digest`; parameter order does not matter.
    pub fn cache_key(
        &self,
        table: &str,
        action: &str,
        params: &BTreeMap<String, String>,
        variation: Option<&str>,
    ) -> String {
        let canonical = json!({ "params": params, "variation": variation }).to_string();
        format!("{}:{}:{}:{}", self.prefix, table, action, sha256_hex(&canonical))
    }

    /// Cached payload for `key`; storage errors count as a miss.
    pub fn lookup(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(Some(payload)) => {
                metrics::record_cache_event("hit");
                Some(payload)
            }
            Ok(None) => {
                metrics::record_cache_event("miss");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cache read failed, treating as miss");
                metrics::record_cache_event("error");
                None
            }
        }
    }

    pub fn store(&self, key: &str, table: &str, payload: &str) {
        if let Err(e) = self.store.set(key, payload, self.ttl_for(table)) {
            tracing::warn!(error = %e, table, "Cache write failed");
            metrics::record_cache_event("error");
        }
    }

    /// Drop every entry of `table`, whatever its variation key.
    pub fn invalidate_table(&self, table: &str) -> usize {
        if !self.applies_to(table) {
            return 0;
        }
        let pattern = format!("{}:{}:*", self.prefix, table);
        match self.store.delete_pattern(&pattern) {
            Ok(removed) => {
                tracing::debug!(table, removed, "Cache invalidated");
                metrics::record_cache_event("invalidate");
                removed
            }
            Err(e) => {
                tracing::warn!(error = %e, table, "Cache invalidation failed");
                0
            }
        }
    }

    pub fn clear(&self) -> bool {
        match self.store.clear() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Cache clear failed");
                false
            }
        }
    }

    pub fn purge_expired(&self) -> usize {
        self.store.purge_expired().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Cache purge failed");
            0
        })
    }

    pub fn stats(&self) -> CacheStats {
        self.store.stats()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}
