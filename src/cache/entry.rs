//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use chrono::Utc;
use serde::{Deserialize, Serialize};

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
///
/// Field names on disk follow the snapshot format: `key`, `value`,
/// `timestamp`, `lastAccessed`, `accessCount`, `expiresAt` (epoch ms).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<V> {
    /// Cache key
    pub key: String,
    /// The stored value
    pub value: V,
    /// Creation timestamp (Unix milliseconds)
    #[serde(rename = "timestamp")]
    pub created_at: u64,
    /// Last successful read (Unix milliseconds)
    #[serde(rename = "lastAccessed")]
    pub last_accessed_at: u64,
    /// Number of hits since the entry was written
    pub access_count: u64,
    /// Expiration timestamp (Unix milliseconds)
    pub expires_at: u64,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new entry written at `now` that lives for `ttl_ms`.
    pub fn new(key: String, value: V, now: u64, ttl_ms: u64) -> Self {
        Self {
            key,
            value,
            created_at: now,
            last_accessed_at: now,
            access_count: 0,
            expires_at: now.saturating_add(ttl_ms),
        }
    }

    // == Is Expired ==
    /// Checks if the entry had expired at `now`.
    ///
    /// An entry is still live at exactly `expires_at`; it is stale once the
    /// clock has moved past it.
    pub fn is_expired_at(&self, now: u64) -> bool {
        now > self.expires_at
    }

    /// Checks if the entry has expired against the wall clock.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    // == Touch ==
    /// Records a hit. Expiry is write-anchored and is not extended.
    pub fn touch(&mut self, now: u64) {
        self.access_count += 1;
        self.last_accessed_at = now;
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, `0` once expired.
    pub fn ttl_remaining_ms(&self) -> u64 {
        self.expires_at.saturating_sub(current_timestamp_ms())
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}
