//! TTL Cleanup Task
//!
//! Background task that periodically removes expired cache entries.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::{CacheValue, SharedCache};
use crate::config::CacheConfig;

/// Spawns a background task that periodically sweeps expired entries.
///
/// The task runs until aborted, sleeping for `interval` between sweeps and
/// holding the write lock only for the duration of `cleanup`.
///
/// # Arguments
/// * `cache` - Shared store to sweep
/// * `interval` - Time between sweeps
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during shutdown.
///
/// # Example
/// ```ignore
/// let cache = CacheStore::<String>::new(CacheConfig::default())?.into_shared();
/// let cleanup_handle = spawn_cleanup_task(cache.clone(), Duration::from_secs(60));
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task<V: CacheValue>(cache: SharedCache<V>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval = ?interval, "starting TTL cleanup task");

        loop {
            tokio::time::sleep(interval).await;

            let removed = {
                let mut cache_guard = cache.write().await;
                cache_guard.cleanup()
            };

            if removed > 0 {
                info!(removed, "TTL cleanup removed expired entries");
            } else {
                debug!("TTL cleanup: no expired entries found");
            }
        }
    })
}

/// Spawns the cleanup task with the interval configured in `config`.
pub fn spawn_configured_cleanup_task<V: CacheValue>(
    cache: SharedCache<V>,
    config: &CacheConfig,
) -> JoinHandle<()> {
    spawn_cleanup_task(cache, config.cleanup_interval)
}
