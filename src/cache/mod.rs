//! Local, synchronous persistence for roadmaps.
//!
//! This module provides the read path of record:
//! - A pluggable key-value backend (SQLite on disk, in-memory for tests)
//! - A whole-collection cache stored under a single well-known key
//! - Typed errors for quota, serialization and not-found conditions

mod layer;
mod storage;

pub use layer::{LocalCache, STORAGE_KEY};
pub use storage::{CacheStorage, SqliteStorage};

#[cfg(test)]
pub use storage::MemoryStorage;
