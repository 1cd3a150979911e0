use serde::{Deserialize, Serialize};

use crate::edge::Edge;
use crate::node::NodeDef;

/// A workflow as authored: nodes in canvas order plus edges.
///
/// Node order is significant. It fixes dispatch order within a wave and the
/// order of steps in a linearized pipeline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkflowDef {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  pub nodes: Vec<NodeDef>,
  #[serde(default)]
  pub edges: Vec<Edge>,
}

impl WorkflowDef {
  pub fn new(nodes: Vec<NodeDef>, edges: Vec<Edge>) -> Self {
    Self {
      name: None,
      nodes,
      edges,
    }
  }

  /// Edges whose target is `node_id`, in declaration order.
  pub fn incoming(&self, node_id: &str) -> impl Iterator<Item = &Edge> {
    self.edges.iter().filter(move |e| e.target == node_id)
  }
}
