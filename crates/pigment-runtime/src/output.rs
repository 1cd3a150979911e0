use std::collections::HashMap;

use pigment_capability::{DataOutput, ImageBlob};

/// The single value a completed node hands to its dependents.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOutput {
  Image(ImageBlob),
  Data(DataOutput),
  /// Sink nodes produce nothing.
  None,
}

impl NodeOutput {
  pub fn as_image(&self) -> Option<&ImageBlob> {
    match self {
      Self::Image(image) => Some(image),
      _ => None,
    }
  }

  pub fn as_data(&self) -> Option<&DataOutput> {
    match self {
      Self::Data(data) => Some(data),
      _ => None,
    }
  }
}

/// Outputs of completed nodes for one execution, keyed by node id.
///
/// Written only by the scheduler once a node has settled. A recorded output
/// is never replaced.
#[derive(Debug, Default)]
pub struct OutputStore {
  outputs: HashMap<String, NodeOutput>,
}

impl OutputStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, node_id: &str) -> Option<&NodeOutput> {
    self.outputs.get(node_id)
  }

  /// Record `output` for `node_id`. Returns `false`, leaving the existing
  /// value in place, if the node already has an output.
  pub fn insert(&mut self, node_id: impl Into<String>, output: NodeOutput) -> bool {
    match self.outputs.entry(node_id.into()) {
      std::collections::hash_map::Entry::Occupied(_) => false,
      std::collections::hash_map::Entry::Vacant(slot) => {
        slot.insert(output);
        true
      }
    }
  }

  pub fn len(&self) -> usize {
    self.outputs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.outputs.is_empty()
  }
}
