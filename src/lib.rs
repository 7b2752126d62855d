//! Mini Cache - An embeddable result cache
//!
//! Combines LRU eviction and write-anchored TTL expiration with an optional
//! crash-safe disk mirror written by a single background task.

pub mod cache;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod persistence;
pub mod tasks;

pub use cache::{CacheEntry, CacheStats, CacheStore, SharedCache};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use fingerprint::fingerprint;
pub use persistence::{Completion, PersistenceCoordinator};
pub use tasks::{spawn_cleanup_task, spawn_configured_cleanup_task};
