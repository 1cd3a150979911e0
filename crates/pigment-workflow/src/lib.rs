//! Pigment Workflow
//!
//! Graph-level view of a [`pigment_config::WorkflowDef`]:
//! - [`Graph`] derives dependency and dependent sets from the edges and
//!   answers "which nodes are ready now"
//! - [`validate`] rejects workflows the scheduler cannot run safely
//! - [`linearize`] flattens the graph into a sequential [`Pipeline`] for export
//!
//! Nothing here performs I/O or executes nodes.

mod error;
mod graph;
mod pipeline;

pub use error::WorkflowError;
pub use graph::Graph;
pub use pipeline::{Pipeline, Step, linearize, sort};

use std::collections::HashSet;

use pigment_config::WorkflowDef;

/// Check the structural invariants the scheduler relies on.
///
/// Dangling edges and cycles are not rejected here; the scheduler handles
/// them when the graph stops making progress.
pub fn validate(workflow: &WorkflowDef) -> Result<(), WorkflowError> {
  if workflow.nodes.is_empty() {
    return Err(WorkflowError::Empty);
  }

  let mut seen = HashSet::with_capacity(workflow.nodes.len());
  for node in &workflow.nodes {
    if !seen.insert(node.id.as_str()) {
      return Err(WorkflowError::DuplicateNode(node.id.clone()));
    }
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use pigment_config::{GeneratorConfig, NodeDef, NodeType};

  fn generator(id: &str) -> NodeDef {
    NodeDef::new(
      id,
      NodeType::Generator(GeneratorConfig {
        generator_name: "solidColor".to_string(),
        params: serde_json::Value::Null,
      }),
    )
  }

  #[test]
  fn test_validate_rejects_empty_workflow() {
    let err = validate(&WorkflowDef::default()).unwrap_err();
    assert!(matches!(err, WorkflowError::Empty));
    assert_eq!(err.to_string(), "Workflow must have at least one node");
  }

  #[test]
  fn test_validate_rejects_duplicate_ids() {
    let workflow = WorkflowDef::new(vec![generator("g"), generator("g")], vec![]);
    let err = validate(&workflow).unwrap_err();
    assert!(matches!(err, WorkflowError::DuplicateNode(ref id) if id == "g"));
  }

  #[test]
  fn test_validate_accepts_dangling_edges() {
    let workflow = WorkflowDef::new(
      vec![generator("g")],
      vec![pigment_config::Edge::new("ghost", "g")],
    );
    assert!(validate(&workflow).is_ok());
  }
}
