//! Persistence Module
//!
//! Crash-safe disk mirror of a cache store, written by a single background task.

mod coordinator;
mod snapshot;

pub use coordinator::{Completion, PersistenceCoordinator};
pub use snapshot::load_entries;
