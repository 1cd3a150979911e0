//! Execution events and notifiers for observability.
//!
//! Events are emitted during a run so callers can render progress, stream it
//! to a UI or persist it. Node events carry the wave they ran in.

use pigment_capability::DataOutput;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// What a completed node produced, as reported to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum StepOutput {
  /// An image that was accepted and persisted under `image_id`.
  Image { image_id: String },
  Data(DataOutput),
  None,
}

/// Events emitted during workflow execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExecutionEvent {
  WorkflowStarted {
    execution_id: String,
    node_count: usize,
  },

  /// A node was launched as part of `wave`.
  NodeRunning {
    execution_id: String,
    wave: usize,
    node_id: String,
  },

  NodeCompleted {
    execution_id: String,
    wave: usize,
    node_id: String,
    output: StepOutput,
  },

  NodeFailed {
    execution_id: String,
    wave: usize,
    node_id: String,
    error: String,
  },

  /// Every reachable node completed. `image_ids` is in persistence order.
  WorkflowCompleted {
    execution_id: String,
    image_ids: Vec<String>,
  },

  WorkflowFailed { execution_id: String, error: String },
}

/// Receives execution events.
///
/// Called synchronously from the scheduler, so implementations should hand
/// events off rather than block.
pub trait ExecutionNotifier: Send + Sync {
  fn notify(&self, event: ExecutionEvent);
}

/// Discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {}
}

/// Sends events to an unbounded channel.
///
/// Event volume is a handful per node, so the channel stays small and the
/// scheduler never waits on a slow consumer.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // Receiver may have been dropped.
    let _ = self.sender.send(event);
  }
}
