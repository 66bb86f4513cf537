use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use super::DocumentStore;
use crate::error::SyncError;
use crate::roadmap::Roadmap;

/// In-memory document store with the same status semantics as the real API,
/// plus knobs for injecting failures.
#[derive(Default)]
pub struct FakeStore {
  pub documents: Mutex<Vec<Roadmap>>,
  pub calls: AtomicU64,
  /// Calls rejected by `offline` or `fail_next`
  pub failures: AtomicU64,
  /// Number of upcoming calls that fail with a network error
  pub fail_next: AtomicU32,
  /// Fail every call with a network error
  pub offline: AtomicBool,
  pub delay: Option<Duration>,
}

impl FakeStore {
  pub fn offline() -> Self {
    let store = Self::default();
    store.offline.store(true, Ordering::SeqCst);
    store
  }

  pub fn failing(times: u32) -> Self {
    let store = Self::default();
    store.fail_next.store(times, Ordering::SeqCst);
    store
  }

  pub async fn ids(&self) -> Vec<String> {
    self
      .documents
      .lock()
      .await
      .iter()
      .map(|d| d.id.clone())
      .collect()
  }

  async fn enter(&self) -> Result<(), SyncError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
    if self.offline.load(Ordering::SeqCst) {
      self.failures.fetch_add(1, Ordering::SeqCst);
      return Err(SyncError::Network("connection refused".to_string()));
    }
    let failed = self
      .fail_next
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
      .is_ok();
    if failed {
      self.failures.fetch_add(1, Ordering::SeqCst);
      return Err(SyncError::Network("connection reset".to_string()));
    }
    Ok(())
  }
}

/// Wait until `check` holds, giving the sync worker time to catch up.
pub async fn eventually<F: FnMut() -> bool>(mut check: F) {
  let waited = tokio::time::timeout(Duration::from_secs(5), async {
    while !check() {
      tokio::time::sleep(Duration::from_millis(1)).await;
    }
  })
  .await;
  assert!(waited.is_ok(), "condition not reached within 5s");
}

fn status(status: u16, message: &str) -> SyncError {
  SyncError::Status {
    status,
    message: message.to_string(),
  }
}

#[async_trait]
impl DocumentStore for FakeStore {
  async fn create(&self, roadmap: &Roadmap) -> Result<Roadmap, SyncError> {
    self.enter().await?;
    let mut docs = self.documents.lock().await;
    if docs.iter().any(|d| d.id == roadmap.id) {
      return Err(status(500, "Error saving document: duplicate key"));
    }
    docs.push(roadmap.clone());
    Ok(roadmap.clone())
  }

  async fn update(&self, roadmap: &Roadmap) -> Result<Roadmap, SyncError> {
    self.enter().await?;
    if roadmap.id.is_empty() {
      return Err(status(400, "Missing document id"));
    }
    let mut docs = self.documents.lock().await;
    let doc = docs
      .iter_mut()
      .find(|d| d.id == roadmap.id)
      .ok_or_else(|| status(404, "Document not found"))?;
    *doc = roadmap.clone();
    Ok(doc.clone())
  }

  async fn delete(&self, id: &str) -> Result<(), SyncError> {
    self.enter().await?;
    if id.is_empty() {
      return Err(status(400, "Missing document id"));
    }
    let mut docs = self.documents.lock().await;
    let before = docs.len();
    docs.retain(|d| d.id != id);
    if docs.len() == before {
      return Err(status(404, "Document not found"));
    }
    Ok(())
  }

  async fn list_all(&self) -> Result<Vec<Roadmap>, SyncError> {
    self.enter().await?;
    Ok(self.documents.lock().await.clone())
  }

  async fn list_by_author(&self, author: &str) -> Result<Vec<Roadmap>, SyncError> {
    self.enter().await?;
    if author.is_empty() {
      return Err(status(400, "Missing author"));
    }
    let mut docs: Vec<Roadmap> = self
      .documents
      .lock()
      .await
      .iter()
      .filter(|d| d.author == author)
      .cloned()
      .collect();
    docs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    Ok(docs)
  }
}
