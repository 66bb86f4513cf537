//! Roadmap documents and the editing operations applied to them.

mod editor;
mod types;

pub use editor::NodePatch;
pub use types::{Edge, Position, ResourceType, Roadmap, RoadmapNode};
