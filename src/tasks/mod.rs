//! Background Tasks Module
//!
//! Contains background tasks that run periodically alongside a shared cache.
//!
//! # Tasks
//! - TTL Cleanup: Removes expired cache entries at configured intervals

mod cleanup;

pub use cleanup::{spawn_cleanup_task, spawn_configured_cleanup_task};
