use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
  #[error("Workflow must have at least one node")]
  Empty,

  #[error("duplicate node id: {0}")]
  DuplicateNode(String),

  #[error("failed to render pipeline: {0}")]
  Render(#[from] serde_yaml::Error),
}
