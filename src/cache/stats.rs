//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, evictions and
//! expirations, plus the running access total behind the average access count.

use serde::Serialize;

// == Stats Tracker ==
/// Counters embedded in the store and updated on every relevant event.
#[derive(Debug, Clone, Default)]
pub struct StatsTracker {
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
    /// Sum of `access_count` over all resident entries
    running_access_total: u64,
}

impl StatsTracker {
    // == Constructor ==
    /// Creates a new tracker with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Record Hit ==
    /// Counts a hit; the touched entry's access count grew by one.
    pub fn record_hit(&mut self) {
        self.hits += 1;
        self.running_access_total += 1;
    }

    // == Record Miss ==
    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    // == Record Eviction ==
    /// Counts an LRU eviction of an entry with `access_count` hits.
    pub fn record_eviction(&mut self, access_count: u64) {
        self.evictions += 1;
        self.release(access_count);
    }

    // == Record Expiration ==
    /// Counts a TTL expiry of an entry with `access_count` hits.
    pub fn record_expiration(&mut self, access_count: u64) {
        self.expirations += 1;
        self.release(access_count);
    }

    /// Adds hits carried by an entry that became resident (snapshot load).
    pub fn admit(&mut self, access_count: u64) {
        self.running_access_total += access_count;
    }

    /// Drops hits carried by an entry that left the table.
    pub fn release(&mut self, access_count: u64) {
        self.running_access_total = self.running_access_total.saturating_sub(access_count);
    }

    /// Resets the running access total after the table was emptied.
    pub fn reset_access_total(&mut self) {
        self.running_access_total = 0;
    }

    #[cfg(test)]
    pub(crate) fn running_access_total(&self) -> u64 {
        self.running_access_total
    }

    // == Snapshot ==
    /// Builds a read-only view for a table holding `current_size` entries.
    pub fn snapshot(&self, current_size: usize, max_size: usize) -> CacheStats {
        let requests = self.hits + self.misses;
        let hit_rate = if requests == 0 {
            0.0
        } else {
            self.hits as f64 / requests as f64
        };
        let average_access_count = if current_size == 0 {
            0.0
        } else {
            self.running_access_total as f64 / current_size as f64
        };

        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            expirations: self.expirations,
            current_size,
            max_size,
            hit_rate,
            average_access_count,
        }
    }
}

// == Cache Stats ==
/// Point-in-time statistics returned by `CacheStore::stats`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (key not found or expired)
    pub misses: u64,
    /// Number of entries evicted due to LRU policy
    pub evictions: u64,
    /// Number of entries removed because their TTL lapsed
    pub expirations: u64,
    /// Current number of entries in the cache
    pub current_size: usize,
    /// Configured capacity
    pub max_size: usize,
    /// hits / (hits + misses), 0 before any request
    pub hit_rate: f64,
    /// Mean access count over resident entries, 0 when empty
    pub average_access_count: f64,
}
