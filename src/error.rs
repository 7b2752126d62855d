//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use std::time::Duration;

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
///
/// Payloads are plain strings so a single failed disk write can be reported
/// to every caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Invalid construction parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Filesystem read/write failure
    #[error("I/O error: {0}")]
    Io(String),

    /// Snapshot content could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Flush did not drain the write queue in time
    #[error("Flush timed out after {0:?}")]
    FlushTimeout(Duration),

    /// The background writer is no longer running
    #[error("Persistence writer closed")]
    Closed,

    /// Persistence was requested outside of a Tokio runtime
    #[error("Persistence requires a Tokio runtime")]
    NoRuntime,
}

impl CacheError {
    pub(crate) fn io(context: &str, err: std::io::Error) -> Self {
        CacheError::Io(format!("{}: {}", context, err))
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CacheError::InvalidConfig("max_size must be greater than 0".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: max_size must be greater than 0"
        );

        let err = CacheError::FlushTimeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "Flush timed out after 250ms");
    }

    #[test]
    fn test_from_serde_json_error() {
        let parse_err = serde_json::from_str::<Vec<u8>>("not json").unwrap_err();
        let err: CacheError = parse_err.into();
        assert!(matches!(err, CacheError::Serialization(_)));
    }
}
