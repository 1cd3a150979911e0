//! Execution result types.

use std::collections::HashMap;

use bytes::Bytes;
use pigment_capability::DataOutput;

/// Result of a complete workflow run.
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
  /// Unique execution ID.
  pub execution_id: String,
  /// Persisted image ids, by wave and then dispatch order within the wave.
  pub image_ids: Vec<String>,
  /// Raw bytes of every persisted image, keyed by image id.
  pub images: HashMap<String, Bytes>,
  /// node_id -> id of the image it produced.
  pub image_ids_by_node: HashMap<String, String>,
  /// node_id -> data produced by vision and text nodes.
  pub data_outputs: HashMap<String, DataOutput>,
  /// Node ids launched in each wave, in dispatch order.
  pub waves: Vec<Vec<String>>,
  /// Nodes that never became ready because of a dangling edge.
  pub skipped: Vec<String>,
  /// Persisted image ids that got through without a moderation verdict
  /// because the service failed in permissive mode.
  pub unmoderated: Vec<String>,
}

impl RunOutcome {
  /// The node that produced `image_id`.
  pub fn node_for_image(&self, image_id: &str) -> Option<&str> {
    self
      .image_ids_by_node
      .iter()
      .find(|(_, id)| id.as_str() == image_id)
      .map(|(node_id, _)| node_id.as_str())
  }
}
