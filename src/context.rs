//! Application context: the local cache plus the remote mirror, built once at
//! startup and handed to every command.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheStorage, LocalCache, SqliteStorage};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::remote::{DocumentStore, RemoteClient};
use crate::roadmap::Roadmap;
use crate::sync::{SyncCounts, SyncOp, SyncQueue};

pub struct AppContext<S: CacheStorage> {
  cache: LocalCache<S>,
  remote: Option<Arc<dyn DocumentStore>>,
  sync: SyncQueue,
}

impl AppContext<SqliteStorage> {
  /// Open the on-disk cache and, when enabled, the remote client.
  pub fn from_config(config: &Config) -> Result<Self> {
    let storage = match &config.cache.path {
      Some(path) => SqliteStorage::open(path)?,
      None => SqliteStorage::open_default()?,
    };
    let cache = LocalCache::new(storage).with_quota(config.cache.quota_bytes);

    if !config.remote.enabled {
      tracing::info!("remote sync disabled");
      return Ok(Self::local_only(cache));
    }

    let remote: Arc<dyn DocumentStore> = Arc::new(RemoteClient::new(&config.remote)?);
    let sync = SyncQueue::spawn(
      Arc::clone(&remote),
      config.sync.retry_policy(),
      config.sync.queue_capacity,
    );

    Ok(Self::new(cache, remote, sync))
  }
}

impl<S: CacheStorage> AppContext<S> {
  pub fn new(cache: LocalCache<S>, remote: Arc<dyn DocumentStore>, sync: SyncQueue) -> Self {
    Self {
      cache,
      remote: Some(remote),
      sync,
    }
  }

  pub fn local_only(cache: LocalCache<S>) -> Self {
    Self {
      cache,
      remote: None,
      sync: SyncQueue::disabled(),
    }
  }

  pub fn list(&self) -> Vec<Roadmap> {
    self.cache.list()
  }

  pub fn get(&self, id: &str) -> Option<Roadmap> {
    self.cache.get(id)
  }

  /// Like [`get`](Self::get), but absence is an error.
  pub fn require(&self, id: &str) -> Result<Roadmap> {
    self.get(id).ok_or_else(|| Error::roadmap_not_found(id))
  }

  /// Create an empty roadmap, store it locally and queue the remote copy.
  pub fn create_roadmap(&self, title: &str, description: &str, author: &str) -> Result<Roadmap> {
    if title.trim().is_empty() || author.trim().is_empty() {
      return Err(Error::Validation("title and author are required".to_string()));
    }

    let roadmap = Roadmap::new(title, description, author);
    self.cache.create(&roadmap)?;
    tracing::info!(id = %roadmap.id, title = %roadmap.title, "created roadmap");

    self.sync.enqueue(SyncOp::Create(roadmap.clone()));
    Ok(roadmap)
  }

  /// Persist an edited roadmap, refreshing its modification time.
  pub fn save_roadmap(&self, mut roadmap: Roadmap) -> Result<Roadmap> {
    roadmap.touch();
    self.cache.update(&roadmap)?;
    tracing::info!(id = %roadmap.id, nodes = roadmap.nodes.len(), edges = roadmap.edges.len(), "saved roadmap");

    self.sync.enqueue(SyncOp::Update(roadmap.clone()));
    Ok(roadmap)
  }

  /// Load, apply `edit`, and save. Nothing is written if `edit` fails.
  pub fn edit<T, F>(&self, id: &str, edit: F) -> Result<(Roadmap, T)>
  where
    F: FnOnce(&mut Roadmap) -> Result<T>,
  {
    let mut roadmap = self.require(id)?;
    let out = edit(&mut roadmap)?;
    let saved = self.save_roadmap(roadmap)?;
    Ok((saved, out))
  }

  /// Remove a roadmap locally and from the remote mirror.
  ///
  /// The remote delete is queued even when the roadmap was not cached here,
  /// so a mirror that still has it converges.
  pub fn delete_roadmap(&self, id: &str) -> Result<bool> {
    let removed = self.cache.delete(id)?;
    if removed {
      tracing::info!(id, "deleted roadmap");
    } else {
      tracing::info!(id, "roadmap not in local cache");
    }

    self.sync.enqueue(SyncOp::Delete(id.to_string()));
    Ok(removed)
  }

  /// Read straight from the remote store. Not used by any mutation flow.
  pub async fn remote_list(&self, author: Option<&str>) -> Result<Vec<Roadmap>> {
    let remote = self
      .remote
      .as_ref()
      .ok_or_else(|| Error::Config("remote sync is disabled".to_string()))?;

    let roadmaps = match author {
      Some(author) => remote.list_by_author(author).await?,
      None => remote.list_all().await?,
    };
    Ok(roadmaps)
  }

  /// Flush pending remote writes, waiting at most `grace`.
  pub async fn shutdown(self, grace: Duration) -> SyncCounts {
    self.sync.shutdown(grace).await
  }
}
