//! Serde types for the document API's non-roadmap responses.
//!
//! Roadmaps travel over the wire in their domain shape; only the
//! confirmation and error envelopes need their own types.

use serde::Deserialize;

/// Body returned on errors and on successful deletes.
#[derive(Debug, Default, Deserialize)]
pub struct ApiMessage {
  #[serde(default)]
  pub message: Option<String>,
  /// Underlying server error, present on 500s
  #[serde(default)]
  pub error: Option<String>,
}

impl ApiMessage {
  /// Human-readable reason, combining message and error when both exist.
  pub fn reason(&self) -> String {
    match (&self.message, &self.error) {
      (Some(m), Some(e)) => format!("{}: {}", m, e),
      (Some(m), None) => m.clone(),
      (None, Some(e)) => e.clone(),
      (None, None) => "no details".to_string(),
    }
  }
}
