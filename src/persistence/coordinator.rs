//! Persistence Coordinator
//!
//! Single background writer that owns the snapshot file. Every mutation is
//! sent over one channel and applied strictly in arrival order; saves are
//! buffered and written together once the debounce window closes.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::cache::{CacheEntry, CacheValue};
use crate::error::{CacheError, Result};
use crate::persistence::snapshot;

type Responder = oneshot::Sender<Result<()>>;

enum Command<V> {
    Save {
        entry: CacheEntry<V>,
        done: Responder,
    },
    Delete {
        key: String,
        done: Responder,
    },
    SaveAll {
        entries: Vec<CacheEntry<V>>,
        done: Responder,
    },
    Clear {
        done: Responder,
    },
    Flush {
        done: Responder,
    },
    Shutdown {
        done: Responder,
    },
}

// == Completion ==
/// Completion signal of one queued persistence operation.
///
/// Dropping it leaves the operation running (fire-and-forget); awaiting it
/// yields that operation's own outcome.
#[derive(Debug)]
pub struct Completion {
    rx: oneshot::Receiver<Result<()>>,
}

impl Completion {
    /// An already-resolved completion.
    pub fn ready(result: Result<()>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self { rx }
    }
}

impl Future for Completion {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(CacheError::Closed)))
    }
}

// == Persistence Coordinator ==
/// Cloneable handle to the background snapshot writer.
#[derive(Debug)]
pub struct PersistenceCoordinator<V> {
    tx: mpsc::UnboundedSender<Command<V>>,
    path: PathBuf,
    flush_timeout: Duration,
}

impl<V> Clone for PersistenceCoordinator<V> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            path: self.path.clone(),
            flush_timeout: self.flush_timeout,
        }
    }
}

impl<V> std::fmt::Debug for Command<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Command::Save { .. } => "Save",
            Command::Delete { .. } => "Delete",
            Command::SaveAll { .. } => "SaveAll",
            Command::Clear { .. } => "Clear",
            Command::Flush { .. } => "Flush",
            Command::Shutdown { .. } => "Shutdown",
        };
        f.write_str(name)
    }
}

impl<V: CacheValue> PersistenceCoordinator<V> {
    // == Spawn ==
    /// Creates the cache directory and starts the writer task for `path`.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Arguments
    /// * `path` - Snapshot file; missing parent directories are created
    /// * `debounce` - Quiet period before buffered saves are written
    /// * `flush_timeout` - Upper bound for `flush` and `shutdown`
    ///
    /// # Returns
    /// A handle sharing the writer, or `NoRuntime` / `Io` on failure.
    pub fn spawn(path: PathBuf, debounce: Duration, flush_timeout: Duration) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| CacheError::NoRuntime)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CacheError::io("failed to create cache directory", e))?;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let writer = SnapshotWriter {
            path: path.clone(),
            debounce,
            pending: HashMap::new(),
            next_seq: 0,
            waiters: Vec::new(),
            deadline: None,
        };
        runtime.spawn(writer.run(rx));

        info!(path = %path.display(), "persistence writer started");
        Ok(Self {
            tx,
            path,
            flush_timeout,
        })
    }

    /// Location of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    // == Save ==
    /// Buffers `entry` and schedules a debounced write.
    ///
    /// Completes once the write containing this entry has finished.
    pub fn save(&self, entry: CacheEntry<V>) -> Completion {
        self.send(|done| Command::Save { entry, done })
    }

    // == Delete ==
    /// Drops `key` from the buffer and rewrites the snapshot if it held `key`.
    pub fn delete(&self, key: impl Into<String>) -> Completion {
        let key = key.into();
        self.send(|done| Command::Delete { key, done })
    }

    // == Save All ==
    /// Replaces the whole snapshot with exactly `entries`, discarding buffered saves.
    pub fn save_all(&self, entries: Vec<CacheEntry<V>>) -> Completion {
        self.send(|done| Command::SaveAll { entries, done })
    }

    // == Clear ==
    /// Discards buffered saves and deletes the snapshot file.
    pub fn clear(&self) -> Completion {
        self.send(|done| Command::Clear { done })
    }

    // == Flush ==
    /// Writes buffered saves now and waits until every operation queued
    /// before this call has finished.
    ///
    /// # Returns
    /// The outcome of the write performed by this flush.
    /// Fails with [`CacheError::FlushTimeout`] if that takes longer than the
    /// configured flush timeout.
    pub async fn flush(&self) -> Result<()> {
        let completion = self.send(|done| Command::Flush { done });
        match time::timeout(self.flush_timeout, completion).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout = ?self.flush_timeout, "flush timed out");
                Err(CacheError::FlushTimeout(self.flush_timeout))
            }
        }
    }

    // == Shutdown ==
    /// Flushes and stops the writer. Later operations fail with `Closed`.
    pub async fn shutdown(&self) -> Result<()> {
        let completion = self.send(|done| Command::Shutdown { done });
        match time::timeout(self.flush_timeout, completion).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::FlushTimeout(self.flush_timeout)),
        }
    }

    // == Load All ==
    /// Reads the snapshot synchronously; missing or corrupt files yield no entries.
    pub fn load_all(&self) -> Vec<CacheEntry<V>> {
        snapshot::load_entries(&self.path)
    }

    fn send(&self, command: impl FnOnce(Responder) -> Command<V>) -> Completion {
        let (done, rx) = oneshot::channel();
        // On a closed channel the command and its responder are dropped,
        // which resolves the completion as `Closed`.
        let _ = self.tx.send(command(done));
        Completion { rx }
    }
}

// == Snapshot Writer ==
/// State owned by the background task.
struct SnapshotWriter<V> {
    path: PathBuf,
    debounce: Duration,
    /// Buffered saves keyed by cache key, with arrival sequence
    pending: HashMap<String, (u64, CacheEntry<V>)>,
    next_seq: u64,
    /// Responders of buffered saves, resolved by the next write
    waiters: Vec<Responder>,
    /// When the buffered saves are due
    deadline: Option<Instant>,
}

enum Wake<V> {
    Command(Option<Command<V>>),
    Deadline,
}

impl<V: CacheValue> SnapshotWriter<V> {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command<V>>) {
        loop {
            let wake = match self.deadline {
                Some(deadline) => tokio::select! {
                    command = rx.recv() => Wake::Command(command),
                    _ = time::sleep_until(deadline) => Wake::Deadline,
                },
                None => Wake::Command(rx.recv().await),
            };

            match wake {
                Wake::Deadline => {
                    let _ = self.write_pending().await;
                }
                Wake::Command(Some(Command::Shutdown { done })) => {
                    let result = self.write_pending().await;
                    let _ = done.send(result);
                    break;
                }
                Wake::Command(Some(command)) => self.handle(command).await,
                Wake::Command(None) => {
                    let _ = self.write_pending().await;
                    break;
                }
            }
        }
        debug!(path = %self.path.display(), "persistence writer stopped");
    }

    async fn handle(&mut self, command: Command<V>) {
        debug!(op = ?command, "persistence op");
        match command {
            Command::Save { entry, done } => {
                self.next_seq += 1;
                self.pending
                    .insert(entry.key.clone(), (self.next_seq, entry));
                self.waiters.push(done);
                if self.deadline.is_none() {
                    self.deadline = Some(Instant::now() + self.debounce);
                }
            }
            Command::Delete { key, done } => {
                self.pending.remove(&key);
                let result = self.delete_from_snapshot(&key).await;
                let _ = done.send(result);
            }
            Command::SaveAll { entries, done } => {
                self.discard_pending();
                let result = snapshot::write_atomic(&self.path, &entries).await;
                if let Err(e) = &result {
                    warn!(path = %self.path.display(), error = %e, "snapshot replace failed");
                }
                let _ = done.send(result);
            }
            Command::Clear { done } => {
                self.discard_pending();
                let result = snapshot::remove_snapshot(&self.path).await.map(|removed| {
                    if removed {
                        info!(path = %self.path.display(), "snapshot removed");
                    }
                });
                let _ = done.send(result);
            }
            Command::Flush { done } => {
                let result = self.write_pending().await;
                let _ = done.send(result);
            }
            Command::Shutdown { done } => {
                // Handled by the run loop; kept for exhaustiveness.
                let _ = done.send(Ok(()));
            }
        }
    }

    /// Merges buffered saves over the on-disk snapshot and writes the result.
    ///
    /// Every buffered save's responder receives the outcome. On failure the
    /// buffer is kept so a later flush can retry it.
    async fn write_pending(&mut self) -> Result<()> {
        self.deadline = None;
        let waiters = std::mem::take(&mut self.waiters);

        let result = if self.pending.is_empty() {
            Ok(())
        } else {
            let mut batch: Vec<(u64, CacheEntry<V>)> =
                self.pending.drain().map(|(_, pending)| pending).collect();
            batch.sort_by_key(|(seq, _)| *seq);

            let existing = snapshot::read_entries::<V>(&self.path).await;
            let updates = batch.iter().map(|(_, entry)| entry.clone()).collect();
            let merged = snapshot::merge_entries(existing, updates);

            let result = snapshot::write_atomic(&self.path, &merged).await;
            match &result {
                Ok(()) => debug!(written = batch.len(), total = merged.len(), "debounced write"),
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "debounced write failed");
                    for (seq, entry) in batch {
                        self.pending.insert(entry.key.clone(), (seq, entry));
                    }
                }
            }
            result
        };

        for waiter in waiters {
            let _ = waiter.send(result.clone());
        }
        result
    }

    async fn delete_from_snapshot(&self, key: &str) -> Result<()> {
        let existing = snapshot::read_entries::<V>(&self.path).await;
        let before = existing.len();
        let remaining: Vec<CacheEntry<V>> =
            existing.into_iter().filter(|e| e.key != key).collect();

        if remaining.len() == before {
            return Ok(());
        }
        snapshot::write_atomic(&self.path, &remaining).await
    }

    /// Drops buffered saves superseded by a full replace or clear.
    fn discard_pending(&mut self) {
        self.pending.clear();
        self.deadline = None;
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(Ok(()));
        }
    }
}
