//! Snapshot File Module
//!
//! Reads and atomically replaces the JSON array of entries mirrored on disk.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tracing::{debug, warn};

use crate::cache::CacheEntry;
use crate::error::{CacheError, Result};

// == Load ==
/// Reads the snapshot at `path`.
///
/// A missing file yields no entries. Unreadable or malformed content is
/// logged and also yields no entries; this never fails.
pub fn load_entries<V: DeserializeOwned>(path: &Path) -> Vec<CacheEntry<V>> {
    match std::fs::read(path) {
        Ok(bytes) => decode(path, &bytes),
        Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read cache snapshot");
            Vec::new()
        }
    }
}

/// Async counterpart of [`load_entries`] used by the background writer.
pub(crate) async fn read_entries<V: DeserializeOwned>(path: &Path) -> Vec<CacheEntry<V>> {
    match fs::read(path).await {
        Ok(bytes) => decode(path, &bytes),
        Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read cache snapshot");
            Vec::new()
        }
    }
}

fn decode<V: DeserializeOwned>(path: &Path, bytes: &[u8]) -> Vec<CacheEntry<V>> {
    match serde_json::from_slice(bytes) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring corrupt cache snapshot");
            Vec::new()
        }
    }
}

// == Atomic Write ==
/// Replaces the snapshot at `path` with exactly `entries`.
///
/// Content goes to a sibling temp file first and is then renamed over the
/// target, so readers see either the old or the new file in full.
pub(crate) async fn write_atomic<V: Serialize>(path: &Path, entries: &[CacheEntry<V>]) -> Result<()> {
    let data = serde_json::to_vec(entries)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| CacheError::io("failed to create cache directory", e))?;
    }

    let temp_path = temp_path_for(path);
    fs::write(&temp_path, &data)
        .await
        .map_err(|e| CacheError::io("failed to write temp snapshot", e))?;

    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(CacheError::io("failed to rename temp snapshot", e));
    }

    debug!(path = %path.display(), entries = entries.len(), "snapshot written");
    Ok(())
}

// == Remove ==
/// Deletes the snapshot file. Returns false if there was none.
pub(crate) async fn remove_snapshot(path: &Path) -> Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(CacheError::io("failed to remove snapshot", e)),
    }
}

// == Merge ==
/// Overlays `updates` on `existing`, keyed by cache key.
///
/// Untouched entries keep their order; updated keys move to the end in
/// update order, matching their new most-recently-written position.
pub(crate) fn merge_entries<V>(
    existing: Vec<CacheEntry<V>>,
    updates: Vec<CacheEntry<V>>,
) -> Vec<CacheEntry<V>> {
    let updated: HashSet<String> = updates.iter().map(|e| e.key.clone()).collect();
    existing
        .into_iter()
        .filter(|e| !updated.contains(&e.key))
        .chain(updates)
        .collect()
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
