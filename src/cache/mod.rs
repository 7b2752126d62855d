//! Cache Module
//!
//! Provides in-memory caching with TTL expiration and LRU eviction.

mod entry;
mod lru;
mod stats;
mod store;


use serde::de::DeserializeOwned;
use serde::Serialize;

// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry};
pub use lru::LruTable;
pub use stats::{CacheStats, StatsTracker};
pub use store::{CacheStore, SharedCache};

/// Values the cache can hold and mirror to disk.
pub trait CacheValue: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> CacheValue for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}
