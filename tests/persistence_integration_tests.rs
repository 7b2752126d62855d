//! Integration Tests for the Disk Mirror
//!
//! Exercises full store lifecycles against a real snapshot file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use mini_cache::cache::current_timestamp_ms;
use mini_cache::persistence::load_entries;
use mini_cache::{fingerprint, CacheConfig, CacheEntry, CacheError, CacheStore};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

// == Helper Functions ==

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn config(dir: &Path, max_size: usize) -> CacheConfig {
    CacheConfig::new(max_size, Duration::from_secs(300))
        .with_persistence(dir)
        .with_debounce(Duration::from_millis(20))
        .with_flush_timeout(Duration::from_secs(5))
}

fn snapshot_path(dir: &Path) -> PathBuf {
    dir.join(mini_cache::config::DEFAULT_FILE_NAME)
}

fn snapshot_keys(dir: &Path) -> Vec<String> {
    load_entries::<String>(&snapshot_path(dir))
        .into_iter()
        .map(|e| e.key)
        .collect()
}

// == Round Trip ==

#[tokio::test]
async fn test_round_trip_across_instances() {
    init_tracing();
    let dir = TempDir::new().unwrap();

    let mut first = CacheStore::<String>::new(config(dir.path(), 10)).unwrap();
    first.set("k1", "v1".to_string());
    first.set("k2", "v2".to_string());
    first.flush().await.unwrap();
    first.shutdown().await.unwrap();

    let mut second = CacheStore::<String>::new(config(dir.path(), 10)).unwrap();
    assert_eq!(second.len(), 2);
    assert_eq!(second.get("k1").as_deref(), Some("v1"));
    assert_eq!(second.get("k2").as_deref(), Some("v2"));
}

#[tokio::test]
async fn test_round_trip_with_fingerprint_keys() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let content = r#"{"users":[{"id":1},{"id":2}]}"#;
    let key = fingerprint(content, Some("encoder"));

    let mut first = CacheStore::<serde_json::Value>::new(config(dir.path(), 10)).unwrap();
    first.set(key.clone(), serde_json::json!({ "encoded": "users[2]{id}:1,2" }));
    first.shutdown().await.unwrap();

    let mut second = CacheStore::<serde_json::Value>::new(config(dir.path(), 10)).unwrap();
    let lookup = fingerprint(content, Some("encoder"));
    assert_eq!(
        second.get(&lookup),
        Some(serde_json::json!({ "encoded": "users[2]{id}:1,2" }))
    );
}

#[tokio::test]
async fn test_loaded_recency_order_is_preserved() {
    init_tracing();
    let dir = TempDir::new().unwrap();

    let mut first = CacheStore::<String>::new(config(dir.path(), 3)).unwrap();
    first.set("a", "1".to_string());
    first.set("b", "2".to_string());
    first.set("c", "3".to_string());
    first.shutdown().await.unwrap();

    let mut second = CacheStore::<String>::new(config(dir.path(), 3)).unwrap();
    assert_eq!(second.keys().collect::<Vec<_>>(), vec!["a", "b", "c"]);

    second.set("d", "4".to_string());
    assert!(!second.has("a"), "oldest loaded entry is evicted first");
}

// == Loading ==

#[tokio::test]
async fn test_load_skips_expired_entries() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let now = current_timestamp_ms();

    let mut expired = CacheEntry::new("old".to_string(), "x".to_string(), now - 10_000, 1_000);
    expired.access_count = 7;
    let mut live = CacheEntry::new("new".to_string(), "y".to_string(), now, 60_000);
    live.access_count = 4;
    std::fs::write(
        snapshot_path(dir.path()),
        serde_json::to_vec(&vec![expired, live]).unwrap(),
    )
    .unwrap();

    let store = CacheStore::<String>::new(config(dir.path(), 10)).unwrap();

    assert_eq!(store.len(), 1);
    assert!(store.has("new"));
    assert!(!store.has("old"));
    assert_eq!(store.stats().average_access_count, 4.0);
}

#[tokio::test]
async fn test_load_respects_max_size() {
    init_tracing();
    let dir = TempDir::new().unwrap();

    let mut first = CacheStore::<String>::new(config(dir.path(), 5)).unwrap();
    for i in 0..5 {
        first.set(format!("k{}", i), i.to_string());
    }
    first.shutdown().await.unwrap();

    let second = CacheStore::<String>::new(config(dir.path(), 2)).unwrap();
    assert_eq!(second.keys().collect::<Vec<_>>(), vec!["k3", "k4"]);
}

#[tokio::test]
async fn test_load_compacts_dropped_entries() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let now = current_timestamp_ms();

    let expired = CacheEntry::new("old".to_string(), "x".to_string(), now - 10_000, 1_000);
    let a = CacheEntry::new("a".to_string(), "1".to_string(), now, 60_000);
    let b = CacheEntry::new("b".to_string(), "2".to_string(), now, 60_000);
    std::fs::write(
        snapshot_path(dir.path()),
        serde_json::to_vec(&vec![expired, a, b]).unwrap(),
    )
    .unwrap();

    let mut store = CacheStore::<String>::new(config(dir.path(), 1)).unwrap();
    store.flush().await.unwrap();
    assert_eq!(store.keys().collect::<Vec<_>>(), vec!["b"]);
    assert_eq!(snapshot_keys(dir.path()), vec!["b"]);

    store.set("c", "3".to_string());
    store.flush().await.unwrap();

    let resident: Vec<String> = store.keys().map(str::to_string).collect();
    assert_eq!(resident, vec!["c"]);
    assert_eq!(snapshot_keys(dir.path()), resident);
}

#[tokio::test]
async fn test_corrupt_snapshot_starts_empty_and_recovers() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    std::fs::write(snapshot_path(dir.path()), b"\x00\x01 definitely not json").unwrap();

    let mut store = CacheStore::<String>::new(config(dir.path(), 10)).unwrap();
    assert!(store.is_empty());

    store.set("k", "v".to_string());
    store.flush().await.unwrap();

    assert_eq!(snapshot_keys(dir.path()), vec!["k"]);
}

#[tokio::test]
async fn test_missing_cache_directory_is_created() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("one").join("two");

    let mut store = CacheStore::<String>::new(config(&nested, 10)).unwrap();
    assert!(nested.is_dir());

    store.set("k", "v".to_string());
    store.flush().await.unwrap();
    assert_eq!(snapshot_keys(&nested), vec!["k"]);
}

// == Mirrored Mutations ==

#[tokio::test]
async fn test_set_then_delete_is_absent_after_flush() {
    init_tracing();
    let dir = TempDir::new().unwrap();

    let mut store = CacheStore::<String>::new(config(dir.path(), 10)).unwrap();
    store.set("keep", "1".to_string());
    store.set("k", "a".to_string());
    store.delete("k");
    store.flush().await.unwrap();

    assert_eq!(snapshot_keys(dir.path()), vec!["keep"]);
}

#[tokio::test]
async fn test_eviction_is_mirrored() {
    init_tracing();
    let dir = TempDir::new().unwrap();

    let mut store = CacheStore::<String>::new(config(dir.path(), 2)).unwrap();
    store.set("a", "1".to_string());
    store.set("b", "2".to_string());
    store.flush().await.unwrap();

    store.set("c", "3".to_string());
    store.flush().await.unwrap();

    assert_eq!(snapshot_keys(dir.path()), vec!["b", "c"]);
}

#[tokio::test]
async fn test_cleanup_is_mirrored() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let config = config(dir.path(), 10).with_debounce(Duration::from_millis(5));

    let mut store = CacheStore::<String>::new(CacheConfig {
        ttl: Duration::from_millis(100),
        ..config
    })
    .unwrap();
    store.set("short", "1".to_string());
    store.flush().await.unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(store.cleanup(), 1);
    store.flush().await.unwrap();

    assert!(snapshot_keys(dir.path()).is_empty());
}

#[tokio::test]
async fn test_clear_removes_snapshot() {
    init_tracing();
    let dir = TempDir::new().unwrap();

    let mut store = CacheStore::<String>::new(config(dir.path(), 10)).unwrap();
    store.set("a", "1".to_string());
    store.flush().await.unwrap();
    assert!(snapshot_path(dir.path()).exists());

    store.set("b", "2".to_string());
    store.clear();
    store.flush().await.unwrap();

    assert!(!snapshot_path(dir.path()).exists());
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_persist_all_replaces_snapshot() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let now = current_timestamp_ms();
    let foreign = CacheEntry::new("foreign".to_string(), "z".to_string(), now, 60_000);
    std::fs::write(
        snapshot_path(dir.path()),
        serde_json::to_vec(&vec![foreign]).unwrap(),
    )
    .unwrap();

    let mut store = CacheStore::<String>::new(config(dir.path(), 10)).unwrap();
    store.delete("foreign");
    store.set("a", "1".to_string());
    store.get("a");
    store.persist_all().await.unwrap();

    let entries = load_entries::<String>(&snapshot_path(dir.path()));
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].key, "a");
    assert_eq!(entries[0].access_count, 1);
}

// == Failure Handling ==

#[tokio::test]
async fn test_write_failure_does_not_affect_memory() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(snapshot_path(dir.path()).join("blocker")).unwrap();

    let mut store = CacheStore::<String>::new(config(dir.path(), 10)).unwrap();
    store.set("k", "v".to_string());

    assert!(matches!(store.flush().await, Err(CacheError::Io(_))));
    assert_eq!(store.get("k").as_deref(), Some("v"));
}

// A FIFO at the snapshot path parks the writer's read until a peer opens it.
#[cfg(unix)]
#[tokio::test]
async fn test_flush_timeout_is_reported() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = snapshot_path(dir.path());
    let config = config(dir.path(), 10).with_flush_timeout(Duration::from_millis(200));

    let mut store = CacheStore::<String>::new(config).unwrap();
    store.set("k", "v".to_string());

    let status = std::process::Command::new("mkfifo").arg(&path).status().unwrap();
    assert!(status.success());

    assert!(matches!(
        store.flush().await,
        Err(CacheError::FlushTimeout(_))
    ));

    // Release the writer; the queue keeps working afterwards.
    drop(std::fs::OpenOptions::new().write(true).open(&path).unwrap());
    store.flush().await.unwrap();
    assert_eq!(snapshot_keys(dir.path()), vec!["k"]);
}
