//! The local roadmap cache: the read path of record.

use std::sync::{Arc, Mutex};

use super::storage::CacheStorage;
use crate::error::{Error, Result};
use crate::roadmap::Roadmap;

/// Well-known key holding the whole serialized collection.
pub const STORAGE_KEY: &str = "crispr-roadmaps";

/// Local cache of every roadmap known to this client.
///
/// The collection is stored as one JSON array under [`STORAGE_KEY`]. Every
/// mutation reads the whole collection, changes it and writes it back while
/// holding `write_lock`, so concurrent callers cannot lose each other's writes.
pub struct LocalCache<S: CacheStorage> {
  storage: Arc<S>,
  /// Maximum size of the serialized collection
  quota_bytes: Option<usize>,
  write_lock: Arc<Mutex<()>>,
}

impl<S: CacheStorage> LocalCache<S> {
  /// Create a new cache with the given storage backend.
  pub fn new(storage: S) -> Self {
    Self {
      storage: Arc::new(storage),
      quota_bytes: None,
      write_lock: Arc::new(Mutex::new(())),
    }
  }

  /// Reject writes whose serialized collection exceeds `quota_bytes`.
  pub fn with_quota(mut self, quota_bytes: usize) -> Self {
    self.quota_bytes = Some(quota_bytes);
    self
  }

  /// All stored roadmaps in insertion order.
  ///
  /// Never fails: unreadable or malformed storage is logged and reads as empty.
  pub fn list(&self) -> Vec<Roadmap> {
    match self.load() {
      Ok(roadmaps) => roadmaps,
      Err(e) => {
        tracing::warn!(error = %e, "failed to read roadmaps from local storage");
        Vec::new()
      }
    }
  }

  /// Look up a roadmap by id.
  pub fn get(&self, id: &str) -> Option<Roadmap> {
    self.list().into_iter().find(|r| r.id == id)
  }

  /// Append a new roadmap.
  pub fn create(&self, roadmap: &Roadmap) -> Result<()> {
    roadmap.validate()?;
    let _guard = self.lock()?;

    let mut roadmaps = self.load()?;
    if roadmaps.iter().any(|r| r.id == roadmap.id) {
      return Err(Error::Validation(format!(
        "roadmap '{}' already exists",
        roadmap.id
      )));
    }
    roadmaps.push(roadmap.clone());

    self.persist(&roadmaps)
  }

  /// Replace the stored roadmap with the same id.
  ///
  /// Returns `NotFound` and leaves the collection untouched if there is none.
  pub fn update(&self, roadmap: &Roadmap) -> Result<()> {
    roadmap.validate()?;
    let _guard = self.lock()?;

    let mut roadmaps = self.load()?;
    let slot = roadmaps
      .iter_mut()
      .find(|r| r.id == roadmap.id)
      .ok_or_else(|| Error::roadmap_not_found(&roadmap.id))?;
    *slot = roadmap.clone();

    self.persist(&roadmaps)
  }

  /// Remove the roadmap with the given id. Returns whether anything was removed.
  pub fn delete(&self, id: &str) -> Result<bool> {
    let _guard = self.lock()?;

    let mut roadmaps = self.load()?;
    let before = roadmaps.len();
    roadmaps.retain(|r| r.id != id);
    if roadmaps.len() == before {
      return Ok(false);
    }

    self.persist(&roadmaps)?;
    Ok(true)
  }

  /// Strict read used by mutations, so a corrupt collection is reported
  /// instead of being silently overwritten.
  fn load(&self) -> Result<Vec<Roadmap>> {
    match self.storage.get_item(STORAGE_KEY)? {
      Some(data) => Ok(serde_json::from_slice(&data)?),
      None => Ok(Vec::new()),
    }
  }

  fn persist(&self, roadmaps: &[Roadmap]) -> Result<()> {
    let data = serde_json::to_vec(roadmaps)?;

    if let Some(quota) = self.quota_bytes {
      if data.len() > quota {
        return Err(Error::StorageFull(format!(
          "{} bytes exceeds quota of {} bytes",
          data.len(),
          quota
        )));
      }
    }

    self.storage.set_item(STORAGE_KEY, &data)?;
    tracing::debug!(count = roadmaps.len(), bytes = data.len(), "persisted roadmaps");
    Ok(())
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
    self
      .write_lock
      .lock()
      .map_err(|e| Error::Storage(format!("Lock poisoned: {}", e)))
  }
}

impl<S: CacheStorage> Clone for LocalCache<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      quota_bytes: self.quota_bytes,
      write_lock: Arc::clone(&self.write_lock),
    }
  }
}
