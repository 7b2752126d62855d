//! Configuration Module
//!
//! Handles loading, validating and expanding cache construction parameters.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CacheError, Result};

/// Default location of the on-disk mirror, before home expansion.
pub const DEFAULT_CACHE_DIR: &str = "~/.cache/mini-cache";

/// Default snapshot file name inside the cache directory.
pub const DEFAULT_FILE_NAME: &str = "cache.json";

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries the cache can hold
    pub max_size: usize,
    /// Lifetime assigned to every entry at write time
    pub ttl: Duration,
    /// Whether mutations are mirrored to disk
    pub persist: bool,
    /// Directory holding the snapshot file
    pub cache_dir: Option<PathBuf>,
    /// Snapshot file name
    pub file_name: String,
    /// Quiet period before buffered saves are written
    pub debounce: Duration,
    /// Upper bound on how long `flush` waits for the writer
    pub flush_timeout: Duration,
    /// Interval of the background expiry sweep
    pub cleanup_interval: Duration,
}

impl CacheConfig {
    /// Creates an in-memory configuration with the given capacity and TTL.
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            max_size,
            ttl,
            ..Self::default()
        }
    }

    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_SIZE` - Maximum cache entries (default: 1000)
    /// - `CACHE_TTL_MS` - Entry lifetime in milliseconds (default: 3600000)
    /// - `CACHE_PERSIST` - `true`/`1` enables the disk mirror (default: false)
    /// - `CACHE_DIR` - Snapshot directory, `~` is expanded (default: ~/.cache/mini-cache)
    /// - `CACHE_DEBOUNCE_MS` - Write debounce in milliseconds (default: 100)
    /// - `CACHE_FLUSH_TIMEOUT_MS` - Flush deadline in milliseconds (default: 30000)
    /// - `CACHE_CLEANUP_INTERVAL_MS` - Expiry sweep interval in milliseconds (default: 60000)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_size: parse_env("CACHE_MAX_SIZE").unwrap_or(defaults.max_size),
            ttl: parse_env("CACHE_TTL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.ttl),
            persist: env::var("CACHE_PERSIST")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.persist),
            cache_dir: env::var("CACHE_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(|v| expand_home(Path::new(&v)))
                .or(defaults.cache_dir),
            file_name: defaults.file_name,
            debounce: parse_env("CACHE_DEBOUNCE_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.debounce),
            flush_timeout: parse_env("CACHE_FLUSH_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.flush_timeout),
            cleanup_interval: parse_env("CACHE_CLEANUP_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.cleanup_interval),
        }
    }

    /// Enables the disk mirror under `dir` (a leading `~` is expanded).
    pub fn with_persistence(mut self, dir: impl AsRef<Path>) -> Self {
        self.persist = true;
        self.cache_dir = Some(expand_home(dir.as_ref()));
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_flush_timeout(mut self, flush_timeout: Duration) -> Self {
        self.flush_timeout = flush_timeout;
        self
    }

    pub fn with_cleanup_interval(mut self, cleanup_interval: Duration) -> Self {
        self.cleanup_interval = cleanup_interval;
        self
    }

    // == Validate ==
    /// Rejects parameters the cache cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(CacheError::InvalidConfig(
                "max_size must be greater than 0".to_string(),
            ));
        }
        if self.ttl.is_zero() {
            return Err(CacheError::InvalidConfig(
                "ttl must be greater than 0".to_string(),
            ));
        }
        if self.persist {
            if self.cache_dir.is_none() {
                return Err(CacheError::InvalidConfig(
                    "persistence enabled without a cache directory".to_string(),
                ));
            }
            if self.file_name.trim().is_empty() {
                return Err(CacheError::InvalidConfig(
                    "snapshot file name must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Full path of the snapshot file, if a cache directory is configured.
    pub fn snapshot_path(&self) -> Option<PathBuf> {
        self.cache_dir.as_ref().map(|dir| dir.join(&self.file_name))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            ttl: Duration::from_secs(3600),
            persist: false,
            cache_dir: Some(expand_home(Path::new(DEFAULT_CACHE_DIR))),
            file_name: DEFAULT_FILE_NAME.to_string(),
            debounce: Duration::from_millis(100),
            flush_timeout: Duration::from_secs(30),
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

/// Replaces a leading `~` component with the user's home directory.
///
/// Paths without the shorthand, or hosts without a home directory, are
/// returned unchanged.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
