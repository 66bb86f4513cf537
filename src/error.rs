//! Error taxonomy shared by the cache, editor and sync layers.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("{kind} '{id}' not found")]
  NotFound { kind: &'static str, id: String },

  #[error("Invalid roadmap: {0}")]
  Validation(String),

  #[error("Local storage is full: {0}")]
  StorageFull(String),

  #[error("Failed to (de)serialize roadmaps: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("Local storage unavailable: {0}")]
  Storage(String),

  /// Settings that make an operation impossible, e.g. a malformed remote url.
  #[error("Configuration error: {0}")]
  Config(String),

  #[error(transparent)]
  Sync(#[from] SyncError),
}

impl Error {
  pub fn roadmap_not_found(id: impl Into<String>) -> Self {
    Self::NotFound {
      kind: "Roadmap",
      id: id.into(),
    }
  }

  pub fn node_not_found(id: impl Into<String>) -> Self {
    Self::NotFound {
      kind: "Node",
      id: id.into(),
    }
  }
}

impl From<rusqlite::Error> for Error {
  fn from(e: rusqlite::Error) -> Self {
    if let rusqlite::Error::SqliteFailure(code, _) = &e {
      if code.code == rusqlite::ErrorCode::DiskFull {
        return Self::StorageFull(e.to_string());
      }
    }
    Self::Storage(e.to_string())
  }
}

/// Failure of a call against the remote document store.
#[derive(Debug, Error)]
pub enum SyncError {
  #[error("Request timed out")]
  Timeout,

  #[error("Network error: {0}")]
  Network(String),

  /// Non-success status with the server's message, if any.
  #[error("Remote returned {status}: {message}")]
  Status { status: u16, message: String },

  #[error("Unexpected response body: {0}")]
  Decode(String),
}

impl SyncError {
  pub fn is_not_found(&self) -> bool {
    matches!(self, Self::Status { status: 404, .. })
  }

  /// Transport failures, timeouts and server errors are worth another attempt.
  /// Client errors (missing id, unknown document) will fail the same way again.
  pub fn is_retryable(&self) -> bool {
    match self {
      Self::Timeout | Self::Network(_) => true,
      Self::Status { status, .. } => *status >= 500 || *status == 429,
      Self::Decode(_) => false,
    }
  }
}

impl From<reqwest::Error> for SyncError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_timeout() {
      Self::Timeout
    } else if e.is_decode() {
      Self::Decode(e.to_string())
    } else {
      Self::Network(e.to_string())
    }
  }
}
