//! Best-effort mirroring of local mutations to the remote document store.
//!
//! The remote store is advisory: the local cache has already committed by the
//! time an op reaches this queue, and nothing here ever reports back to the
//! caller. Ops run one at a time in enqueue order, each retried with
//! exponential backoff while its failure looks transient. Whatever still fails
//! is logged and dropped, leaving the mirror diverged until the next write of
//! the same roadmap.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::error::SyncError;
use crate::remote::DocumentStore;
use crate::roadmap::Roadmap;

/// A local mutation to replay against the remote store.
#[derive(Debug, Clone)]
pub enum SyncOp {
  Create(Roadmap),
  Update(Roadmap),
  Delete(String),
}

impl SyncOp {
  fn label(&self) -> &'static str {
    match self {
      Self::Create(_) => "create",
      Self::Update(_) => "update",
      Self::Delete(_) => "delete",
    }
  }

  fn roadmap_id(&self) -> &str {
    match self {
      Self::Create(r) | Self::Update(r) => &r.id,
      Self::Delete(id) => id,
    }
  }

  /// Updates of documents the mirror never received become creates, and
  /// deletes of documents it no longer has count as done.
  async fn apply(&self, store: &dyn DocumentStore) -> Result<(), SyncError> {
    match self {
      Self::Create(r) => store.create(r).await.map(|_| ()),
      Self::Update(r) => match store.update(r).await {
        Err(e) if e.is_not_found() => {
          tracing::debug!(id = %r.id, "remote copy missing, creating it");
          store.create(r).await.map(|_| ())
        }
        result => result.map(|_| ()),
      },
      Self::Delete(id) => match store.delete(id).await {
        Err(e) if e.is_not_found() => Ok(()),
        result => result,
      },
    }
  }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
  pub max_attempts: u32,
  pub base_backoff: Duration,
  pub max_backoff: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_attempts: 4,
      base_backoff: Duration::from_millis(200),
      max_backoff: Duration::from_secs(5),
    }
  }
}

impl RetryPolicy {
  /// Delay after the given failed attempt (1-based): base * 2^(attempt-1), capped.
  pub fn backoff(&self, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    self
      .base_backoff
      .checked_mul(factor)
      .unwrap_or(self.max_backoff)
      .min(self.max_backoff)
  }
}

/// Running totals kept by the sync worker.
#[derive(Debug, Default)]
struct SyncStats {
  /// Accepted into the queue and not yet finished
  pending: AtomicU64,
  synced: AtomicU64,
  retried: AtomicU64,
  dropped: AtomicU64,
}

/// Point-in-time copy of the worker's totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncCounts {
  /// Ops the remote store accepted
  pub synced: u64,
  /// Individual attempts that failed and were tried again
  pub retried: u64,
  /// Ops given up on, including ones rejected because the queue was full
  /// and ones still pending when shutdown ran out of time
  pub dropped: u64,
}

impl SyncStats {
  fn snapshot(&self) -> SyncCounts {
    SyncCounts {
      synced: self.synced.load(Ordering::Relaxed),
      retried: self.retried.load(Ordering::Relaxed),
      dropped: self.dropped.load(Ordering::Relaxed),
    }
  }
}

/// Handle to the background sync worker.
pub struct SyncQueue {
  tx: Option<mpsc::Sender<SyncOp>>,
  worker: Option<JoinHandle<()>>,
  stats: Arc<SyncStats>,
}

impl SyncQueue {
  /// Start a worker draining a queue of at most `capacity` pending ops.
  pub fn spawn(store: Arc<dyn DocumentStore>, policy: RetryPolicy, capacity: usize) -> Self {
    let (tx, mut rx) = mpsc::channel::<SyncOp>(capacity.max(1));
    let stats = Arc::new(SyncStats::default());

    let worker_stats = Arc::clone(&stats);
    let worker = tokio::spawn(async move {
      while let Some(op) = rx.recv().await {
        process(store.as_ref(), &policy, &worker_stats, op).await;
        worker_stats.pending.fetch_sub(1, Ordering::Relaxed);
      }
    });

    Self {
      tx: Some(tx),
      worker: Some(worker),
      stats,
    }
  }

  /// A queue that discards everything, for when the remote is turned off.
  pub fn disabled() -> Self {
    Self {
      tx: None,
      worker: None,
      stats: Arc::new(SyncStats::default()),
    }
  }

  /// Hand an op to the worker without waiting for it.
  pub fn enqueue(&self, op: SyncOp) {
    let Some(tx) = &self.tx else {
      tracing::trace!(op = op.label(), id = op.roadmap_id(), "remote sync disabled");
      return;
    };

    // Counted before sending so the worker never sees it go negative
    self.stats.pending.fetch_add(1, Ordering::Relaxed);
    match tx.try_send(op) {
      Ok(()) => {}
      Err(TrySendError::Full(op)) => {
        self.stats.pending.fetch_sub(1, Ordering::Relaxed);
        self.stats.dropped.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
          op = op.label(),
          id = op.roadmap_id(),
          "sync queue full, remote copy will diverge"
        );
      }
      Err(TrySendError::Closed(op)) => {
        self.stats.pending.fetch_sub(1, Ordering::Relaxed);
        self.stats.dropped.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(op = op.label(), id = op.roadmap_id(), "sync worker stopped");
      }
    }
  }

  /// Stop accepting ops and wait up to `grace` for the queue to drain.
  pub async fn shutdown(mut self, grace: Duration) -> SyncCounts {
    drop(self.tx.take());

    if let Some(mut worker) = self.worker.take() {
      if tokio::time::timeout(grace, &mut worker).await.is_err() {
        worker.abort();
        let _ = worker.await;
        let abandoned = self.stats.pending.swap(0, Ordering::Relaxed);
        self.stats.dropped.fetch_add(abandoned, Ordering::Relaxed);
        tracing::warn!(
          grace_ms = grace.as_millis() as u64,
          abandoned,
          "pending remote writes abandoned at shutdown"
        );
      }
    }

    self.stats.snapshot()
  }
}

async fn process(store: &dyn DocumentStore, policy: &RetryPolicy, stats: &SyncStats, op: SyncOp) {
  let mut attempt = 0;
  loop {
    attempt += 1;
    match op.apply(store).await {
      Ok(()) => {
        stats.synced.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(op = op.label(), id = op.roadmap_id(), attempt, "synced to remote");
        return;
      }
      Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
        stats.retried.fetch_add(1, Ordering::Relaxed);
        let delay = policy.backoff(attempt);
        tracing::info!(
          op = op.label(),
          id = op.roadmap_id(),
          attempt,
          delay_ms = delay.as_millis() as u64,
          error = %e,
          "remote sync failed, retrying"
        );
        tokio::time::sleep(delay).await;
      }
      Err(e) => {
        stats.dropped.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
          op = op.label(),
          id = op.roadmap_id(),
          attempt,
          error = %e,
          "remote sync gave up, local copy stays authoritative"
        );
        return;
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::remote::fake::{eventually, FakeStore};

  fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
      max_attempts,
      base_backoff: Duration::from_millis(1),
      max_backoff: Duration::from_millis(5),
    }
  }

  fn roadmap(id: &str) -> Roadmap {
    let mut r = Roadmap::new("CRISPR Basics", "", "Alice");
    r.id = id.to_string();
    r
  }

  const GRACE: Duration = Duration::from_secs(5);

  #[test]
  fn test_backoff_doubles_and_caps() {
    let policy = RetryPolicy {
      max_attempts: 10,
      base_backoff: Duration::from_millis(100),
      max_backoff: Duration::from_millis(500),
    };
    assert_eq!(policy.backoff(1), Duration::from_millis(100));
    assert_eq!(policy.backoff(2), Duration::from_millis(200));
    assert_eq!(policy.backoff(3), Duration::from_millis(400));
    assert_eq!(policy.backoff(4), Duration::from_millis(500));
    assert_eq!(policy.backoff(64), Duration::from_millis(500));
  }

  #[tokio::test]
  async fn test_ops_apply_in_order() {
    let store = Arc::new(FakeStore::default());
    let queue = SyncQueue::spawn(store.clone(), fast_policy(3), 16);

    let mut r1 = roadmap("r1");
    queue.enqueue(SyncOp::Create(r1.clone()));
    r1.title = "Renamed".to_string();
    queue.enqueue(SyncOp::Update(r1));
    queue.enqueue(SyncOp::Create(roadmap("r2")));
    queue.enqueue(SyncOp::Delete("r2".to_string()));

    let counts = queue.shutdown(GRACE).await;
    assert_eq!(counts.synced, 4);
    assert_eq!(counts.dropped, 0);
    let docs = store.documents.lock().await;
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].title, "Renamed");
  }

  #[tokio::test]
  async fn test_transient_failures_are_retried() {
    let store = Arc::new(FakeStore::failing(2));
    let queue = SyncQueue::spawn(store.clone(), fast_policy(4), 16);

    queue.enqueue(SyncOp::Create(roadmap("r1")));
    let counts = queue.shutdown(GRACE).await;

    assert_eq!(counts.synced, 1);
    assert_eq!(counts.retried, 2);
    assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    assert_eq!(store.ids().await, vec!["r1".to_string()]);
  }

  #[tokio::test]
  async fn test_gives_up_after_max_attempts() {
    let store = Arc::new(FakeStore::offline());
    let queue = SyncQueue::spawn(store.clone(), fast_policy(3), 16);

    queue.enqueue(SyncOp::Create(roadmap("r1")));
    let counts = queue.shutdown(GRACE).await;

    assert_eq!(counts.synced, 0);
    assert_eq!(counts.dropped, 1);
    assert_eq!(store.calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn test_client_error_is_not_retried() {
    let store = Arc::new(FakeStore::default());
    let queue = SyncQueue::spawn(store.clone(), fast_policy(5), 16);

    queue.enqueue(SyncOp::Update(roadmap("")));
    let counts = queue.shutdown(GRACE).await;

    assert_eq!(counts.dropped, 1);
    assert_eq!(counts.retried, 0);
    assert_eq!(store.calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_update_of_missing_document_creates_it() {
    let store = Arc::new(FakeStore::default());
    let queue = SyncQueue::spawn(store.clone(), fast_policy(5), 16);

    let mut r1 = roadmap("r1");
    r1.title = "Renamed".to_string();
    queue.enqueue(SyncOp::Update(r1));
    let counts = queue.shutdown(GRACE).await;

    assert_eq!(counts.synced, 1);
    assert_eq!(counts.dropped, 0);
    let docs = store.documents.lock().await;
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].title, "Renamed");
  }

  #[tokio::test]
  async fn test_update_heals_dropped_create() {
    let store = Arc::new(FakeStore::offline());
    let queue = SyncQueue::spawn(store.clone(), fast_policy(2), 16);

    queue.enqueue(SyncOp::Create(roadmap("r1")));
    eventually(|| store.failures.load(Ordering::SeqCst) == 2).await;
    store.offline.store(false, Ordering::SeqCst);
    queue.enqueue(SyncOp::Update(roadmap("r1")));

    let counts = queue.shutdown(GRACE).await;
    assert_eq!(counts.dropped, 1);
    assert_eq!(counts.synced, 1);
    assert_eq!(store.ids().await, vec!["r1".to_string()]);
  }

  #[tokio::test]
  async fn test_delete_of_missing_document_is_synced() {
    let store = Arc::new(FakeStore::default());
    let queue = SyncQueue::spawn(store.clone(), fast_policy(5), 16);

    queue.enqueue(SyncOp::Create(roadmap("r1")));
    queue.enqueue(SyncOp::Delete("r1".to_string()));
    queue.enqueue(SyncOp::Delete("r1".to_string()));
    let counts = queue.shutdown(GRACE).await;

    assert_eq!(counts.synced, 3);
    assert_eq!(counts.dropped, 0);
    assert_eq!(counts.retried, 0);
    assert!(store.ids().await.is_empty());
  }

  #[tokio::test]
  async fn test_full_queue_drops_ops() {
    let store = Arc::new(FakeStore {
      delay: Some(Duration::from_millis(50)),
      ..Default::default()
    });
    let queue = SyncQueue::spawn(store.clone(), fast_policy(1), 1);

    // The worker has not been polled yet, so only the first op fits
    queue.enqueue(SyncOp::Create(roadmap("r1")));
    queue.enqueue(SyncOp::Create(roadmap("r2")));
    queue.enqueue(SyncOp::Create(roadmap("r3")));

    let counts = queue.shutdown(GRACE).await;
    assert!(counts.dropped >= 1);
    assert_eq!(counts.synced + counts.dropped, 3);
  }

  #[tokio::test]
  async fn test_shutdown_grace_abandons_slow_ops() {
    let store = Arc::new(FakeStore {
      delay: Some(Duration::from_secs(2)),
      ..Default::default()
    });
    let queue = SyncQueue::spawn(store.clone(), fast_policy(1), 4);

    queue.enqueue(SyncOp::Create(roadmap("r1")));
    queue.enqueue(SyncOp::Create(roadmap("r2")));
    let counts = queue.shutdown(Duration::from_millis(50)).await;

    assert_eq!(counts.synced, 0);
    assert_eq!(counts.dropped, 2);
    assert!(store.ids().await.is_empty());
  }

  #[tokio::test]
  async fn test_disabled_queue_discards() {
    let queue = SyncQueue::disabled();
    queue.enqueue(SyncOp::Delete("r1".to_string()));
    let counts = queue.shutdown(GRACE).await;
    assert_eq!(counts, SyncCounts::default());
  }
}
