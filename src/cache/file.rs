//! File-backed cache driver.
//!
//! One JSON-encoded [`CacheEntry`] per file, named by the SHA-256 of the
//! key. Writes go through a temp file and a rename.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::{key_matcher, CacheEntry, CacheError, CacheStats, CacheStore, StatsCounters};
use crate::clock::Clock;
use crate::persist::write_atomically;
use crate::security::digest::sha256_hex;

#[derive(Debug)]
pub struct FileCacheStore {
    dir: PathBuf,
    counters: StatsCounters,
    clock: Arc<dyn Clock>,
}

impl FileCacheStore {
    /// Open (and create if needed) the cache directory.
    pub fn open(dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            counters: StatsCounters::default(),
            clock,
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sha256_hex(key)))
    }

    fn read_entry(&self, path: &PathBuf) -> Result<Option<CacheEntry>, CacheError> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn live_entry(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let path = self.path_for(key);
        let Some(entry) = self.read_entry(&path)? else {
            return Ok(None);
        };
        if entry.key != key || entry.is_expired(self.clock.now_millis()) {
            let _ = fs::remove_file(&path);
            return Ok(None);
        }
        Ok(Some(entry))
    }

    /// Every entry file in the directory.
    fn entry_paths(&self) -> Result<Vec<PathBuf>, CacheError> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    /// Remove every entry file for which `doomed` holds. Unreadable files
    /// count as doomed.
    fn remove_where(&self, doomed: impl Fn(&CacheEntry) -> bool) -> Result<usize, CacheError> {
        let mut removed = 0;
        for path in self.entry_paths()? {
            let remove = match self.read_entry(&path) {
                Ok(Some(entry)) => doomed(&entry),
                Ok(None) => false,
                Err(_) => true,
            };
            if remove && fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

impl CacheStore for FileCacheStore {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let entry = self.live_entry(key);
        match &entry {
            Ok(Some(_)) => self.counters.hit(),
            _ => self.counters.miss(),
        }
        Ok(entry?.map(|e| e.value))
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let entry = CacheEntry::new(key, value, self.clock.now_millis(), ttl);
        write_atomically(&self.path_for(key), &serde_json::to_vec(&entry)?)?;
        self.counters.write();
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, CacheError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => {
                self.counters.deleted(1);
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn delete_pattern(&self, pattern: &str) -> Result<usize, CacheError> {
        let matcher = key_matcher(pattern)?;
        let removed = self.remove_where(|entry| matcher.is_match(&entry.key))?;
        self.counters.deleted(removed);
        Ok(removed)
    }

    fn clear(&self) -> Result<(), CacheError> {
        let removed = self.remove_where(|_| true)?;
        self.counters.deleted(removed);
        Ok(())
    }

    fn has(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.live_entry(key)?.is_some())
    }

    fn stats(&self) -> CacheStats {
        let size = self.entry_paths().map(|p| p.len()).unwrap_or(0);
        self.counters.snapshot("file", size)
    }

    fn purge_expired(&self) -> Result<usize, CacheError> {
        let now = self.clock.now_millis();
        self.remove_where(|entry| entry.is_expired(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn store() -> (FileCacheStore, Arc<ManualClock>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::default());
        let store = FileCacheStore::open(dir.path().join("cache"), clock.clone()).unwrap();
        (store, clock, dir)
    }

    #[test]
    fn test_set_get_and_expiry() {
        let (store, clock, _dir) = store();
        store.set("gw:orders:list:x", "[1,2]", Duration::from_secs(30)).unwrap();
        assert_eq!(store.get("gw:orders:list:x").unwrap().as_deref(), Some("[1,2]"));

        clock.advance(Duration::from_secs(30));
        assert_eq!(store.get("gw:orders:list:x").unwrap(), None);
        assert!(!store.has("gw:orders:list:x").unwrap());
        assert_eq!(store.stats().size, 0);
    }

    #[test]
    fn test_pattern_delete_and_clear() {
        let (store, _, _dir) = store();
        let ttl = Duration::from_secs(60);
        store.set("gw:orders:list:1", "a", ttl).unwrap();
        store.set("gw:orders:count:1", "b", ttl).unwrap();
        store.set("gw:users:list:1", "c", ttl).unwrap();

        assert_eq!(store.delete_pattern("gw:orders:*").unwrap(), 2);
        assert_eq!(store.stats().size, 1);

        store.clear().unwrap();
        assert_eq!(store.stats().size, 0);
        assert_eq!(store.stats().driver, "file");
    }

    #[test]
    fn test_corrupt_entry_is_an_error_then_purged() {
        let (store, _, _dir) = store();
        fs::write(store.path_for("k"), b"not json").unwrap();
        assert!(store.get("k").is_err());
        assert_eq!(store.purge_expired().unwrap(), 1);
        assert_eq!(store.get("k").unwrap(), None);
    }
}
