use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Kind of learning resource a node points at
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
  #[default]
  Youtube,
  Article,
  Text,
}

/// Canvas coordinate
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
  pub x: f64,
  pub y: f64,
}

/// A single topic/resource entry on the roadmap canvas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapNode {
  pub id: String,
  pub title: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  pub resource_type: ResourceType,
  /// Expected when the type is not `text`, but never enforced
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub resource_url: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub content: Option<String>,
  #[serde(default)]
  pub position: Position,
}

impl RoadmapNode {
  pub fn new(title: impl Into<String>, resource_type: ResourceType) -> Self {
    Self {
      id: Uuid::new_v4().to_string(),
      title: title.into(),
      description: None,
      resource_type,
      resource_url: None,
      content: None,
      position: Position::default(),
    }
  }
}

/// Directed connection between two nodes.
///
/// Only `source` and `target` carry meaning here. Everything else the editor
/// attaches (line style, animation, arrow markers) is kept verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
  pub id: String,
  pub source: String,
  pub target: String,
  #[serde(flatten)]
  pub extra: serde_json::Map<String, serde_json::Value>,
}

const EDGE_COLOR: &str = "#6366f1";

impl Edge {
  /// Edge with the editor's default presentation.
  pub fn between(source: &str, target: &str) -> Self {
    let mut extra = serde_json::Map::new();
    extra.insert("type".to_string(), "smoothstep".into());
    extra.insert("animated".to_string(), true.into());
    extra.insert(
      "style".to_string(),
      serde_json::json!({ "stroke": EDGE_COLOR, "strokeWidth": 2 }),
    );
    extra.insert(
      "markerEnd".to_string(),
      serde_json::json!({ "type": "arrowclosed", "color": EDGE_COLOR }),
    );
    Self {
      id: format!("e{}-{}", source, target),
      source: source.to_string(),
      target: target.to_string(),
      extra,
    }
  }
}

/// A named, authored learning path. Called a "document" by the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Roadmap {
  pub id: String,
  pub title: String,
  #[serde(default)]
  pub description: String,
  pub author: String,
  #[serde(default)]
  pub nodes: Vec<RoadmapNode>,
  #[serde(default)]
  pub edges: Vec<Edge>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Roadmap {
  pub fn new(
    title: impl Into<String>,
    description: impl Into<String>,
    author: impl Into<String>,
  ) -> Self {
    let now = Utc::now();
    Self {
      id: Uuid::new_v4().to_string(),
      title: title.into(),
      description: description.into(),
      author: author.into(),
      nodes: Vec::new(),
      edges: Vec::new(),
      created_at: now,
      updated_at: now,
    }
  }

  pub fn node(&self, id: &str) -> Option<&RoadmapNode> {
    self.nodes.iter().find(|n| n.id == id)
  }

  /// Check the structural invariants: non-empty id, unique node ids and no
  /// edge pointing at a node outside this roadmap.
  pub fn validate(&self) -> Result<()> {
    if self.id.trim().is_empty() {
      return Err(Error::Validation("missing roadmap id".to_string()));
    }

    let mut ids = HashSet::with_capacity(self.nodes.len());
    for node in &self.nodes {
      if !ids.insert(node.id.as_str()) {
        return Err(Error::Validation(format!("duplicate node id '{}'", node.id)));
      }
    }

    for edge in &self.edges {
      for endpoint in [&edge.source, &edge.target] {
        if !ids.contains(endpoint.as_str()) {
          return Err(Error::Validation(format!(
            "edge '{}' references unknown node '{}'",
            edge.id, endpoint
          )));
        }
      }
    }

    Ok(())
  }
}
