//! Runtime error types.

use pigment_capability::CapabilityError;
use pigment_moderation::GateError;
use pigment_workflow::WorkflowError;

/// Why a single node failed.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
  /// A transform, save or vision node has no incoming edge.
  #[error("No input for {node_type} node {node_id}")]
  MissingInput {
    node_id: String,
    node_type: &'static str,
  },

  /// A node that takes one input has several incoming edges.
  #[error("{node_type} node {node_id} has {count} inputs, expected one")]
  MultipleInputs {
    node_id: String,
    node_type: &'static str,
    count: usize,
  },

  /// The upstream node produced nothing usable.
  #[error("Input not found for node {node_id}")]
  InputNotFound { node_id: String },

  #[error("Input for node {node_id} from {upstream} is not an image")]
  NotAnImage { node_id: String, upstream: String },

  #[error("No image selected for input node {node_id}")]
  NoUploadSelected { node_id: String },

  #[error("Upload not found: {upload_id}")]
  UploadNotFound { upload_id: String },

  #[error("{0}")]
  Provider(#[from] CapabilityError),

  #[error("Content policy violation: This image was flagged for {}.", categories.join(", "))]
  PolicyViolation { categories: Vec<String> },

  #[error("Content moderation service unavailable: {0}")]
  ModerationUnavailable(String),

  #[error("failed to persist image: {0}")]
  Persistence(#[from] pigment_artifact::Error),
}

impl NodeError {
  /// Flagged content, as opposed to a provider or service failure.
  pub fn is_policy_violation(&self) -> bool {
    matches!(self, Self::PolicyViolation { .. })
  }
}

impl From<GateError> for NodeError {
  fn from(e: GateError) -> Self {
    match e {
      GateError::PolicyViolation { categories } => Self::PolicyViolation { categories },
      GateError::ServiceUnavailable(message) => Self::ModerationUnavailable(message),
    }
  }
}

/// Why a run failed as a whole.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
  /// The workflow was rejected before the first wave.
  #[error("invalid graph: {message}")]
  InvalidGraph { message: String },

  /// Nodes that can never run because they sit on or behind a cycle.
  #[error("cycle detected among nodes: {}", node_ids.join(", "))]
  CyclicGraph { node_ids: Vec<String> },

  #[error("Node {node_id} failed: {source}")]
  NodeFailed {
    node_id: String,
    #[source]
    source: NodeError,
  },

  /// The task running a node panicked or was aborted.
  #[error("task for node '{node_id}' did not complete: {message}")]
  TaskJoin { node_id: String, message: String },
}

impl RunError {
  /// The node failure behind this error, if any.
  pub fn node_error(&self) -> Option<&NodeError> {
    match self {
      Self::NodeFailed { source, .. } => Some(source),
      _ => None,
    }
  }

  pub fn is_policy_violation(&self) -> bool {
    self.node_error().is_some_and(NodeError::is_policy_violation)
  }
}

impl From<WorkflowError> for RunError {
  fn from(e: WorkflowError) -> Self {
    Self::InvalidGraph {
      message: e.to_string(),
    }
  }
}
