//! Key Fingerprint Module
//!
//! Maps arbitrary content (plus optional context) to a fixed-length cache key.

use sha2::{Digest, Sha256};

/// Length in characters of every fingerprint (hex-encoded SHA-256).
pub const FINGERPRINT_LEN: usize = 64;

/// Computes the cache key for `content`, optionally scoped by `context`
/// (for example a caller or tool identity).
///
/// The context is hashed ahead of the content with a NUL separator, so
/// `("ab", "c")` and `("a", "bc")` never collide.
pub fn fingerprint(content: &str, context: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    if let Some(context) = context {
        hasher.update(context.as_bytes());
        hasher.update([0u8]);
    }
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
