//! Cache Store Module
//!
//! Main cache engine combining the recency table with TTL expiration,
//! statistics, and an optional disk mirror.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::cache::{
    current_timestamp_ms, CacheEntry, CacheStats, CacheValue, LruTable, StatsTracker,
};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::persistence::{Completion, PersistenceCoordinator};

/// A store shared between tasks, e.g. callers and the cleanup task.
pub type SharedCache<V> = Arc<RwLock<CacheStore<V>>>;

// == Cache Store ==
/// Main cache storage with LRU eviction and TTL support.
///
/// Calls are expected from one logical context at a time; wrap the store in
/// a [`SharedCache`] to use it from several tasks. Mutations are mirrored to
/// disk without waiting when persistence is enabled; [`CacheStore::flush`]
/// is the synchronization point.
#[derive(Debug)]
pub struct CacheStore<V> {
    /// Resident entries in recency order
    table: LruTable<V>,
    /// Performance statistics
    stats: StatsTracker,
    /// Maximum number of entries allowed
    max_size: usize,
    /// Lifetime of every entry in milliseconds
    ttl_ms: u64,
    /// Disk mirror, if enabled
    persistence: Option<PersistenceCoordinator<V>>,
}

impl<V: CacheValue> CacheStore<V> {
    // == Constructor ==
    /// Creates a new CacheStore from `config`.
    ///
    /// With persistence enabled this must run inside a Tokio runtime; the
    /// previous snapshot is loaded and its unexpired entries seed the table.
    /// If loading dropped anything, the snapshot is rewritten to match.
    ///
    /// # Arguments
    /// * `config` - Capacity, TTL and optional disk mirror settings
    ///
    /// # Returns
    /// - `Err(CacheError::InvalidConfig)` for unusable parameters
    /// - `Err(CacheError::NoRuntime)` if persistence is enabled outside a runtime
    /// - `Err(CacheError::Io)` if the cache directory cannot be created
    pub fn new(config: CacheConfig) -> Result<Self> {
        config.validate()?;

        let persistence = if config.persist {
            let path = config.snapshot_path().ok_or_else(|| {
                CacheError::InvalidConfig("persistence enabled without a cache directory".to_string())
            })?;
            Some(PersistenceCoordinator::spawn(
                path,
                config.debounce,
                config.flush_timeout,
            )?)
        } else {
            None
        };

        let mut store = Self {
            table: LruTable::new(),
            stats: StatsTracker::new(),
            max_size: config.max_size,
            ttl_ms: u64::try_from(config.ttl.as_millis()).unwrap_or(u64::MAX),
            persistence,
        };

        let loaded = store.persistence.as_ref().map(|c| c.load_all());
        if let Some(entries) = loaded {
            let on_disk = entries.len();
            store.seed(entries);
            if store.table.len() < on_disk {
                if let Some(coordinator) = &store.persistence {
                    drop(coordinator.save_all(store.table.iter().cloned().collect()));
                }
                debug!(
                    dropped = on_disk - store.table.len(),
                    "compacting snapshot after load"
                );
            }
        }

        info!(
            max_size = store.max_size,
            ttl_ms = store.ttl_ms,
            persist = store.persistence.is_some(),
            entries = store.table.len(),
            "cache store initialized"
        );
        Ok(store)
    }

    /// Wraps the store for use from several tasks.
    pub fn into_shared(self) -> SharedCache<V> {
        Arc::new(RwLock::new(self))
    }

    /// Loads snapshot entries oldest first, skipping expired ones and
    /// keeping at most `max_size` of the most recent.
    fn seed(&mut self, entries: Vec<CacheEntry<V>>) {
        let now = current_timestamp_ms();
        let mut skipped = 0usize;

        for entry in entries {
            if entry.is_expired_at(now) {
                skipped += 1;
                continue;
            }
            self.stats.admit(entry.access_count);
            if let Some(previous) = self.table.insert(entry) {
                self.stats.release(previous.access_count);
            }
            while self.table.len() > self.max_size {
                match self.table.pop_oldest() {
                    Some(dropped) => self.stats.release(dropped.access_count),
                    None => break,
                }
            }
        }

        info!(loaded = self.table.len(), skipped, "cache seeded from snapshot");
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// Returns the value if found and not expired, making the entry the most
    /// recently used. Expired entries are removed and counted as misses.
    ///
    /// # Arguments
    /// * `key` - The key to look up
    ///
    /// # Returns
    /// A clone of the stored value, or None on a miss.
    pub fn get(&mut self, key: &str) -> Option<V> {
        let now = current_timestamp_ms();

        let expired = match self.table.get(key) {
            Some(entry) => entry.is_expired_at(now),
            None => {
                self.stats.record_miss();
                return None;
            }
        };

        if expired {
            if let Some(entry) = self.table.remove(key) {
                self.stats.record_expiration(entry.access_count);
            }
            self.stats.record_miss();
            self.mirror_delete(key);
            debug!(key, "lazily expired entry");
            return None;
        }

        self.table.touch(key);
        let entry = self.table.get_mut(key)?;
        entry.touch(now);
        let value = entry.value.clone();
        self.stats.record_hit();
        Some(value)
    }

    // == Set ==
    /// Stores a key-value pair.
    ///
    /// If the key already exists, the value is overwritten and TTL is reset.
    /// If the cache is at capacity, the least recently used entry is evicted.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - The value to store
    pub fn set(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();

        if !self.table.contains(&key) && self.table.len() >= self.max_size {
            if let Some(evicted) = self.table.pop_oldest() {
                self.stats.record_eviction(evicted.access_count);
                self.mirror_delete(&evicted.key);
                debug!(key = %evicted.key, "evicted least recently used entry");
            }
        }

        let entry = CacheEntry::new(key, value, current_timestamp_ms(), self.ttl_ms);
        if let Some(coordinator) = &self.persistence {
            drop(coordinator.save(entry.clone()));
        }
        if let Some(previous) = self.table.insert(entry) {
            self.stats.release(previous.access_count);
        }
    }

    // == Has ==
    /// True if `key` is resident and unexpired. Does not touch recency or stats.
    pub fn has(&self, key: &str) -> bool {
        let now = current_timestamp_ms();
        self.table
            .get(key)
            .is_some_and(|entry| !entry.is_expired_at(now))
    }

    // == Peek ==
    /// Returns the entry for `key` without touching recency or stats.
    pub fn peek(&self, key: &str) -> Option<&CacheEntry<V>> {
        self.table.get(key)
    }

    // == Delete ==
    /// Removes an entry by key. Returns false if it was not resident.
    pub fn delete(&mut self, key: &str) -> bool {
        match self.table.remove(key) {
            Some(entry) => {
                self.stats.release(entry.access_count);
                self.mirror_delete(key);
                true
            }
            None => false,
        }
    }

    // == Clear ==
    /// Removes every entry and, if persisted, the snapshot file.
    pub fn clear(&mut self) {
        self.table.clear();
        self.stats.reset_access_total();
        if let Some(coordinator) = &self.persistence {
            drop(coordinator.clear());
        }
        info!("cache cleared");
    }

    // == Cleanup ==
    /// Removes all expired entries from the cache.
    ///
    /// Each removal counts as an expiration and is mirrored to the snapshot.
    ///
    /// # Returns
    /// The number of entries removed.
    pub fn cleanup(&mut self) -> usize {
        let now = current_timestamp_ms();
        let expired_keys: Vec<String> = self
            .table
            .iter()
            .filter(|entry| entry.is_expired_at(now))
            .map(|entry| entry.key.clone())
            .collect();

        for key in &expired_keys {
            if let Some(entry) = self.table.remove(key) {
                self.stats.record_expiration(entry.access_count);
                self.mirror_delete(key);
            }
        }

        expired_keys.len()
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.table.len(), self.max_size)
    }

    // == Persistence ==
    /// Replaces the snapshot with the full in-memory table.
    pub fn persist_all(&self) -> Completion {
        match &self.persistence {
            Some(coordinator) => coordinator.save_all(self.table.iter().cloned().collect()),
            None => Completion::ready(Ok(())),
        }
    }

    /// Waits until every mirrored mutation issued so far is on disk.
    pub async fn flush(&self) -> Result<()> {
        match &self.persistence {
            Some(coordinator) => coordinator.flush().await,
            None => Ok(()),
        }
    }

    /// Flushes and stops the background writer.
    pub async fn shutdown(self) -> Result<()> {
        match &self.persistence {
            Some(coordinator) => coordinator.shutdown().await,
            None => Ok(()),
        }
    }

    /// The disk mirror, if persistence is enabled.
    pub fn persistence(&self) -> Option<&PersistenceCoordinator<V>> {
        self.persistence.as_ref()
    }

    fn mirror_delete(&self, key: &str) {
        if let Some(coordinator) = &self.persistence {
            drop(coordinator.delete(key));
        }
    }

    // == Length ==
    /// Returns the current number of entries in the cache.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Keys from least to most recently used.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.table.iter().map(|entry| entry.key.as_str())
    }
}
