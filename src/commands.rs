//! Subcommands and their execution against the application context.

use clap::{Args, Subcommand};
use color_eyre::Result;

use crate::cache::CacheStorage;
use crate::context::AppContext;
use crate::error::Error;
use crate::roadmap::{NodePatch, Position, ResourceType, Roadmap, RoadmapNode};

#[derive(Subcommand, Debug)]
pub enum Command {
  /// List cached roadmaps
  #[command(alias = "ls")]
  List,
  /// Print one roadmap as JSON
  Show { id: String },
  /// Create an empty roadmap
  Create {
    #[arg(long)]
    title: String,
    #[arg(long, default_value = "")]
    description: String,
    #[arg(long)]
    author: String,
  },
  /// Delete a roadmap locally and remotely
  #[command(alias = "rm")]
  Delete { id: String },
  /// Add a resource node to a roadmap
  AddNode {
    roadmap: String,
    #[arg(long)]
    title: String,
    #[arg(long = "type", value_enum, default_value_t = ResourceType::Youtube)]
    resource_type: ResourceType,
    #[command(flatten)]
    fields: NodeFields,
  },
  /// Change fields of an existing node
  EditNode {
    roadmap: String,
    node: String,
    #[arg(long)]
    title: Option<String>,
    #[arg(long = "type", value_enum)]
    resource_type: Option<ResourceType>,
    #[command(flatten)]
    fields: NodeFields,
  },
  /// Remove a node and every edge touching it
  RemoveNode { roadmap: String, node: String },
  /// Draw a directed edge between two nodes
  Connect {
    roadmap: String,
    source: String,
    target: String,
  },
  /// Remove an edge by id
  Disconnect { roadmap: String, edge: String },
  /// Query the remote document store directly
  Remote {
    /// Only documents by this author, newest first
    #[arg(long)]
    author: Option<String>,
  },
}

/// Optional node fields shared by add-node and edit-node
#[derive(Args, Debug, Default)]
pub struct NodeFields {
  #[arg(long)]
  pub description: Option<String>,
  #[arg(long)]
  pub url: Option<String>,
  #[arg(long)]
  pub content: Option<String>,
  #[arg(long, allow_hyphen_values = true)]
  pub x: Option<f64>,
  #[arg(long, allow_hyphen_values = true)]
  pub y: Option<f64>,
}

impl NodeFields {
  /// Position if either coordinate was given; the missing one falls back to `base`.
  fn position(&self, base: Position) -> Option<Position> {
    if self.x.is_none() && self.y.is_none() {
      return None;
    }
    Some(Position {
      x: self.x.unwrap_or(base.x),
      y: self.y.unwrap_or(base.y),
    })
  }
}

pub async fn execute<S: CacheStorage>(ctx: &AppContext<S>, command: Command) -> Result<()> {
  match command {
    Command::List => {
      for roadmap in ctx.list() {
        println!("{}", summary_line(&roadmap));
      }
    }
    Command::Show { id } => {
      let roadmap = ctx.require(&id)?;
      println!("{}", serde_json::to_string_pretty(&roadmap)?);
    }
    Command::Create {
      title,
      description,
      author,
    } => {
      let roadmap = ctx.create_roadmap(&title, &description, &author)?;
      println!("{}", roadmap.id);
    }
    Command::Delete { id } => {
      if !ctx.delete_roadmap(&id)? {
        eprintln!("Roadmap '{}' was not in the local cache", id);
      }
    }
    Command::AddNode {
      roadmap,
      title,
      resource_type,
      fields,
    } => {
      let mut node = RoadmapNode::new(title, resource_type);
      node.description = fields.description.clone();
      node.resource_url = fields.url.clone();
      node.content = fields.content.clone();
      if let Some(position) = fields.position(node.position) {
        node.position = position;
      }
      let node_id = node.id.clone();
      ctx.edit(&roadmap, |r| r.add_node(node))?;
      println!("{}", node_id);
    }
    Command::EditNode {
      roadmap,
      node,
      title,
      resource_type,
      fields,
    } => {
      ctx.edit(&roadmap, |r| {
        let current = r
          .node(&node)
          .map(|n| n.position)
          .unwrap_or_default();
        let position = fields.position(current);
        let patch = NodePatch {
          title,
          description: fields.description,
          resource_type,
          resource_url: fields.url,
          content: fields.content,
          position,
        };
        if patch.is_empty() {
          return Err(Error::Validation("no node fields to change".to_string()));
        }
        r.update_node(&node, patch).map(|_| ())
      })?;
    }
    Command::RemoveNode { roadmap, node } => {
      ctx.edit(&roadmap, |r| r.remove_node(&node).map(|_| ()))?;
    }
    Command::Connect {
      roadmap,
      source,
      target,
    } => {
      let (_, edge_id) = ctx.edit(&roadmap, |r| r.connect(&source, &target).map(|e| e.id.clone()))?;
      println!("{}", edge_id);
    }
    Command::Disconnect { roadmap, edge } => {
      ctx.edit(&roadmap, |r| r.disconnect(&edge).map(|_| ()))?;
    }
    Command::Remote { author } => {
      let roadmaps = ctx.remote_list(author.as_deref()).await?;
      println!("{}", serde_json::to_string_pretty(&roadmaps)?);
    }
  }

  Ok(())
}

fn summary_line(roadmap: &Roadmap) -> String {
  format!(
    "{}  {}  by {}  ({} nodes, {} edges, updated {})",
    roadmap.id,
    roadmap.title,
    roadmap.author,
    roadmap.nodes.len(),
    roadmap.edges.len(),
    roadmap.updated_at.format("%Y-%m-%d %H:%M")
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{LocalCache, MemoryStorage};
  use clap::Parser;

  #[derive(Parser, Debug)]
  struct Cli {
    #[command(subcommand)]
    command: Command,
  }

  fn parse(args: &[&str]) -> Command {
    let mut argv = vec!["roadmap"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).unwrap().command
  }

  fn local() -> AppContext<MemoryStorage> {
    AppContext::local_only(LocalCache::new(MemoryStorage::new()))
  }

  #[test]
  fn test_parse_create() {
    let cmd = parse(&["create", "--title", "CRISPR Basics", "--author", "Alice"]);
    match cmd {
      Command::Create {
        title,
        description,
        author,
      } => {
        assert_eq!(title, "CRISPR Basics");
        assert_eq!(description, "");
        assert_eq!(author, "Alice");
      }
      other => panic!("unexpected {:?}", other),
    }
  }

  #[test]
  fn test_parse_add_node_with_negative_position() {
    let cmd = parse(&["add-node", "r1", "--title", "Intro", "--type", "text", "--x", "-20"]);
    match cmd {
      Command::AddNode {
        resource_type,
        fields,
        ..
      } => {
        assert_eq!(resource_type, ResourceType::Text);
        assert_eq!(fields.x, Some(-20.0));
        assert_eq!(fields.y, None);
      }
      other => panic!("unexpected {:?}", other),
    }
  }

  #[test]
  fn test_aliases() {
    assert!(matches!(parse(&["ls"]), Command::List));
    assert!(matches!(parse(&["rm", "r1"]), Command::Delete { .. }));
  }

  #[test]
  fn test_partial_position_keeps_other_axis() {
    let fields = NodeFields {
      y: Some(5.0),
      ..Default::default()
    };
    let base = Position { x: 3.0, y: 1.0 };
    assert_eq!(fields.position(base), Some(Position { x: 3.0, y: 5.0 }));
    assert_eq!(NodeFields::default().position(base), None);
  }

  #[tokio::test]
  async fn test_editing_commands() {
    let ctx = local();
    let roadmap = ctx.create_roadmap("CRISPR Basics", "", "Alice").unwrap();

    for title in ["Intro", "Cas9"] {
      execute(
        &ctx,
        Command::AddNode {
          roadmap: roadmap.id.clone(),
          title: title.to_string(),
          resource_type: ResourceType::Article,
          fields: NodeFields::default(),
        },
      )
      .await
      .unwrap();
    }
    let nodes = ctx.get(&roadmap.id).unwrap().nodes;
    assert_eq!(nodes.len(), 2);

    execute(
      &ctx,
      Command::Connect {
        roadmap: roadmap.id.clone(),
        source: nodes[0].id.clone(),
        target: nodes[1].id.clone(),
      },
    )
    .await
    .unwrap();

    execute(
      &ctx,
      Command::EditNode {
        roadmap: roadmap.id.clone(),
        node: nodes[1].id.clone(),
        title: Some("Cas9 explained".to_string()),
        resource_type: None,
        fields: NodeFields {
          x: Some(100.0),
          ..Default::default()
        },
      },
    )
    .await
    .unwrap();

    let stored = ctx.get(&roadmap.id).unwrap();
    assert_eq!(stored.edges.len(), 1);
    assert_eq!(stored.nodes[1].title, "Cas9 explained");
    assert_eq!(stored.nodes[1].position.x, 100.0);

    execute(
      &ctx,
      Command::RemoveNode {
        roadmap: roadmap.id.clone(),
        node: nodes[0].id.clone(),
      },
    )
    .await
    .unwrap();

    let stored = ctx.get(&roadmap.id).unwrap();
    assert_eq!(stored.nodes.len(), 1);
    assert!(stored.edges.is_empty());
  }

  #[tokio::test]
  async fn test_show_missing_roadmap_fails() {
    let ctx = local();
    let result = execute(&ctx, Command::Show { id: "nope".to_string() }).await;
    assert!(result.is_err());
  }
}
