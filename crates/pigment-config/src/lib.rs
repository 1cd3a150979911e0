//! Pigment Config
//!
//! This crate contains the serializable workflow configuration types for
//! pigment. A workflow is a list of typed nodes plus the directed edges
//! between them, exactly as authored in the editor.
//!
//! Configuration can be loaded from:
//! - JSON files (via CLI with `pigment run workflow.json`)
//! - Request bodies handed over by an API layer
//!
//! The runtime takes these types, builds the dependency graph and executes
//! the nodes in waves.

mod edge;
mod node;
mod workflow;

pub use edge::Edge;
pub use node::{
  GeneratorConfig, InputConfig, NodeDef, NodeType, Position, SaveConfig, SaveProvider,
  TextConfig, TransformConfig, VisionConfig,
};
pub use workflow::WorkflowDef;
