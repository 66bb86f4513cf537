use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::sync::RetryPolicy;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub remote: RemoteConfig,
  #[serde(default)]
  pub sync: SyncConfig,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
  /// Base URL of the document API (e.g., "http://localhost:3000/api")
  #[serde(default = "default_remote_url")]
  pub url: String,
  /// Per-request timeout
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
  /// Set to false to keep everything local
  #[serde(default = "default_true")]
  pub enabled: bool,
}

impl Default for RemoteConfig {
  fn default() -> Self {
    Self {
      url: default_remote_url(),
      timeout_secs: default_timeout_secs(),
      enabled: true,
    }
  }
}

impl RemoteConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
  #[serde(default = "default_max_attempts")]
  pub max_attempts: u32,
  #[serde(default = "default_base_backoff_ms")]
  pub base_backoff_ms: u64,
  #[serde(default = "default_max_backoff_ms")]
  pub max_backoff_ms: u64,
  /// Pending remote writes beyond this are dropped with a warning
  #[serde(default = "default_queue_capacity")]
  pub queue_capacity: usize,
  /// How long to wait for pending writes before exiting
  #[serde(default = "default_shutdown_grace_secs")]
  pub shutdown_grace_secs: u64,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      max_attempts: default_max_attempts(),
      base_backoff_ms: default_base_backoff_ms(),
      max_backoff_ms: default_max_backoff_ms(),
      queue_capacity: default_queue_capacity(),
      shutdown_grace_secs: default_shutdown_grace_secs(),
    }
  }
}

impl SyncConfig {
  pub fn retry_policy(&self) -> RetryPolicy {
    RetryPolicy {
      max_attempts: self.max_attempts.max(1),
      base_backoff: Duration::from_millis(self.base_backoff_ms),
      max_backoff: Duration::from_millis(self.max_backoff_ms),
    }
  }

  pub fn shutdown_grace(&self) -> Duration {
    Duration::from_secs(self.shutdown_grace_secs)
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Database file (default: $XDG_DATA_HOME/roadmap/cache.db)
  pub path: Option<PathBuf>,
  #[serde(default = "default_quota_bytes")]
  pub quota_bytes: usize,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      path: None,
      quota_bytes: default_quota_bytes(),
    }
  }
}

fn default_remote_url() -> String {
  "http://localhost:3000/api".to_string()
}

fn default_timeout_secs() -> u64 {
  10
}

fn default_true() -> bool {
  true
}

fn default_max_attempts() -> u32 {
  4
}

fn default_base_backoff_ms() -> u64 {
  200
}

fn default_max_backoff_ms() -> u64 {
  5_000
}

fn default_queue_capacity() -> usize {
  256
}

fn default_shutdown_grace_secs() -> u64 {
  10
}

fn default_quota_bytes() -> usize {
  5 * 1024 * 1024
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./roadmap.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/roadmap/config.yaml
  ///
  /// Falls back to defaults when no file exists. `ROADMAP_REMOTE_URL`
  /// overrides the remote URL in every case.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => {
        tracing::debug!("no config file found, using defaults");
        Config::default()
      }
    };

    if let Some(url) = Self::remote_url_override() {
      config.remote.url = url;
    }

    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("roadmap.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("roadmap").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    // An empty file deserializes as null
    if contents.trim().is_empty() {
      return Ok(Config::default());
    }
    serde_yaml::from_str(contents)
  }

  /// Remote URL from the environment, if set.
  fn remote_url_override() -> Option<String> {
    std::env::var("ROADMAP_REMOTE_URL")
      .ok()
      .filter(|url| !url.trim().is_empty())
  }
}
