use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

use crate::config::RemoteConfig;
use crate::error::{Error, Result as AppResult, SyncError};
use crate::remote::api_types::ApiMessage;
use crate::roadmap::Roadmap;

/// Operations offered by the remote document store.
///
/// Mutations mirror the local cache; the two list operations are boundary
/// reads that no mutation flow depends on.
#[async_trait]
pub trait DocumentStore: Send + Sync {
  async fn create(&self, roadmap: &Roadmap) -> Result<Roadmap, SyncError>;

  /// Replace the document whose `id` field matches the roadmap's.
  async fn update(&self, roadmap: &Roadmap) -> Result<Roadmap, SyncError>;

  async fn delete(&self, id: &str) -> Result<(), SyncError>;

  async fn list_all(&self) -> Result<Vec<Roadmap>, SyncError>;

  /// Documents by one author, most recently updated first.
  async fn list_by_author(&self, author: &str) -> Result<Vec<Roadmap>, SyncError>;
}

/// HTTP client for the `/documents` collection
#[derive(Clone)]
pub struct RemoteClient {
  client: reqwest::Client,
  documents_url: Url,
}

impl RemoteClient {
  pub fn new(config: &RemoteConfig) -> AppResult<Self> {
    Self::with_timeout(&config.url, config.timeout())
  }

  pub fn with_timeout(base_url: &str, timeout: Duration) -> AppResult<Self> {
    let documents_url = documents_url(base_url)?;

    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

    Ok(Self {
      client,
      documents_url,
    })
  }

  fn url_with_query(&self, key: &str, value: &str) -> Url {
    with_query(&self.documents_url, key, value)
  }
}

fn with_query(base: &Url, key: &str, value: &str) -> Url {
  let mut url = base.clone();
  url.query_pairs_mut().append_pair(key, value);
  url
}

/// Resolve `<base>/documents`, tolerating a trailing slash on the base.
fn documents_url(base_url: &str) -> AppResult<Url> {
  let mut base = base_url.trim_end_matches('/').to_string();
  base.push_str("/documents");
  Url::parse(&base).map_err(|e| Error::Config(format!("Invalid remote url '{}': {}", base_url, e)))
}

/// Decode a success body, or turn a failure status into `SyncError::Status`.
async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, SyncError> {
  let status = response.status();
  if status.is_success() {
    return response
      .json::<T>()
      .await
      .map_err(|e| SyncError::Decode(e.to_string()));
  }
  Err(status_error(status, response).await)
}

async fn status_error(status: StatusCode, response: reqwest::Response) -> SyncError {
  let body = response.text().await.unwrap_or_default();
  let message = serde_json::from_str::<ApiMessage>(&body)
    .map(|m| m.reason())
    .unwrap_or(body);
  SyncError::Status {
    status: status.as_u16(),
    message,
  }
}

#[async_trait]
impl DocumentStore for RemoteClient {
  async fn create(&self, roadmap: &Roadmap) -> Result<Roadmap, SyncError> {
    let response = self
      .client
      .post(self.documents_url.clone())
      .json(roadmap)
      .send()
      .await?;
    read_json(response).await
  }

  async fn update(&self, roadmap: &Roadmap) -> Result<Roadmap, SyncError> {
    let response = self
      .client
      .put(self.documents_url.clone())
      .json(roadmap)
      .send()
      .await?;
    read_json(response).await
  }

  async fn delete(&self, id: &str) -> Result<(), SyncError> {
    let response = self
      .client
      .delete(self.url_with_query("id", id))
      .send()
      .await?;
    let _: ApiMessage = read_json(response).await?;
    Ok(())
  }

  async fn list_all(&self) -> Result<Vec<Roadmap>, SyncError> {
    let response = self
      .client
      .get(self.documents_url.clone())
      .send()
      .await?;
    read_json(response).await
  }

  async fn list_by_author(&self, author: &str) -> Result<Vec<Roadmap>, SyncError> {
    let response = self
      .client
      .get(self.url_with_query("author", author))
      .send()
      .await?;
    read_json(response).await
  }
}
