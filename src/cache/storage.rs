//! Key-value storage backends for the local cache.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Error, Result};

/// Trait for local storage backends.
///
/// Values are opaque byte blobs under string keys, the same contract a
/// browser's local storage offers.
pub trait CacheStorage: Send + Sync {
  /// Read the value stored under `key`.
  fn get_item(&self, key: &str) -> Result<Option<Vec<u8>>>;

  /// Replace the value stored under `key`.
  fn set_item(&self, key: &str, value: &[u8]) -> Result<()>;
}

/// Storage that lives only as long as the process.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStorage {
  items: Mutex<std::collections::HashMap<String, Vec<u8>>>,
}

#[cfg(test)]
impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }
}

#[cfg(test)]
impl CacheStorage for MemoryStorage {
  fn get_item(&self, key: &str) -> Result<Option<Vec<u8>>> {
    let items = self.items.lock().map_err(|e| lock_poisoned(&e))?;
    Ok(items.get(key).cloned())
  }

  fn set_item(&self, key: &str, value: &[u8]) -> Result<()> {
    let mut items = self.items.lock().map_err(|e| lock_poisoned(&e))?;
    items.insert(key.to_string(), value.to_vec());
    Ok(())
  }
}

/// SQLite-based storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open or create the database at the default location.
  pub fn open_default() -> Result<Self> {
    Self::open(&Self::default_path()?)
  }

  /// Open or create the database at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| Error::Storage(format!("Failed to create cache directory: {}", e)))?;
    }

    let conn = Connection::open(path).map_err(|e| {
      Error::Storage(format!(
        "Failed to open cache database at {}: {}",
        path.display(),
        e
      ))
    })?;

    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;

    tracing::debug!(path = %path.display(), "opened local cache");
    Ok(storage)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| Error::Storage("Could not determine data directory".to_string()))?;

    Ok(data_dir.join("roadmap").join("cache.db"))
  }

  /// Run database migrations for the storage table.
  fn run_migrations(&self) -> Result<()> {
    let conn = self.conn.lock().map_err(|e| lock_poisoned(&e))?;

    conn
      .execute_batch(STORAGE_SCHEMA)
      .map_err(|e| Error::Storage(format!("Failed to run cache migrations: {}", e)))?;

    Ok(())
  }
}

/// Schema for the storage table.
const STORAGE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS local_storage (
    key TEXT PRIMARY KEY,
    value BLOB NOT NULL,
    written_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl CacheStorage for SqliteStorage {
  fn get_item(&self, key: &str) -> Result<Option<Vec<u8>>> {
    let conn = self.conn.lock().map_err(|e| lock_poisoned(&e))?;

    let value = conn
      .query_row(
        "SELECT value FROM local_storage WHERE key = ?",
        params![key],
        |row| row.get::<_, Vec<u8>>(0),
      )
      .optional()?;

    Ok(value)
  }

  fn set_item(&self, key: &str, value: &[u8]) -> Result<()> {
    let conn = self.conn.lock().map_err(|e| lock_poisoned(&e))?;

    conn.execute(
      "INSERT OR REPLACE INTO local_storage (key, value, written_at)
       VALUES (?, ?, datetime('now'))",
      params![key, value],
    )?;

    Ok(())
  }
}

fn lock_poisoned(e: &dyn std::fmt::Display) -> Error {
  Error::Storage(format!("Lock poisoned: {}", e))
}
