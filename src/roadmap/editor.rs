//! Graph editing operations on a loaded roadmap.
//!
//! These mutate the in-memory value only. Persisting the result is the
//! caller's job (see `AppContext::save_roadmap`).

use chrono::Utc;

use super::types::{Edge, Position, ResourceType, Roadmap, RoadmapNode};
use crate::error::{Error, Result};

/// Partial update for a node. Unset fields are left as they are.
#[derive(Debug, Clone, Default)]
pub struct NodePatch {
  pub title: Option<String>,
  pub description: Option<String>,
  pub resource_type: Option<ResourceType>,
  pub resource_url: Option<String>,
  pub content: Option<String>,
  pub position: Option<Position>,
}

impl NodePatch {
  pub fn is_empty(&self) -> bool {
    self.title.is_none()
      && self.description.is_none()
      && self.resource_type.is_none()
      && self.resource_url.is_none()
      && self.content.is_none()
      && self.position.is_none()
  }
}

impl Roadmap {
  /// Append a node to the canvas.
  pub fn add_node(&mut self, node: RoadmapNode) -> Result<()> {
    if node.title.trim().is_empty() {
      return Err(Error::Validation("node title must not be empty".to_string()));
    }
    if self.node(&node.id).is_some() {
      return Err(Error::Validation(format!("node '{}' already exists", node.id)));
    }
    self.nodes.push(node);
    Ok(())
  }

  /// Merge the set fields of `patch` into the node with the given id.
  pub fn update_node(&mut self, node_id: &str, patch: NodePatch) -> Result<&RoadmapNode> {
    let node = self
      .nodes
      .iter_mut()
      .find(|n| n.id == node_id)
      .ok_or_else(|| Error::node_not_found(node_id))?;

    if let Some(title) = patch.title {
      if title.trim().is_empty() {
        return Err(Error::Validation("node title must not be empty".to_string()));
      }
      node.title = title;
    }
    if let Some(description) = patch.description {
      node.description = Some(description);
    }
    if let Some(resource_type) = patch.resource_type {
      node.resource_type = resource_type;
    }
    if let Some(url) = patch.resource_url {
      node.resource_url = Some(url);
    }
    if let Some(content) = patch.content {
      node.content = Some(content);
    }
    if let Some(position) = patch.position {
      node.position = position;
    }

    Ok(node)
  }

  /// Remove a node together with every edge touching it.
  pub fn remove_node(&mut self, node_id: &str) -> Result<RoadmapNode> {
    let index = self
      .nodes
      .iter()
      .position(|n| n.id == node_id)
      .ok_or_else(|| Error::node_not_found(node_id))?;

    let removed = self.nodes.remove(index);
    self
      .edges
      .retain(|e| e.source != node_id && e.target != node_id);

    Ok(removed)
  }

  /// Connect `source` to `target`. Connecting an already connected pair is a no-op.
  pub fn connect(&mut self, source: &str, target: &str) -> Result<&Edge> {
    if source == target {
      return Err(Error::Validation(format!(
        "cannot connect node '{}' to itself",
        source
      )));
    }
    for endpoint in [source, target] {
      if self.node(endpoint).is_none() {
        return Err(Error::node_not_found(endpoint));
      }
    }

    let existing = self
      .edges
      .iter()
      .position(|e| e.source == source && e.target == target);

    let index = match existing {
      Some(i) => i,
      None => {
        self.edges.push(Edge::between(source, target));
        self.edges.len() - 1
      }
    };

    Ok(&self.edges[index])
  }

  /// Remove an edge by id.
  pub fn disconnect(&mut self, edge_id: &str) -> Result<Edge> {
    let index = self
      .edges
      .iter()
      .position(|e| e.id == edge_id)
      .ok_or_else(|| Error::NotFound {
        kind: "Edge",
        id: edge_id.to_string(),
      })?;
    Ok(self.edges.remove(index))
  }

  /// Refresh the modification timestamp.
  pub fn touch(&mut self) {
    self.updated_at = Utc::now();
  }
}
