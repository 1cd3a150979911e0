//! Pigment Runtime
//!
//! Executes a [`pigment_config::WorkflowDef`] in dependency waves:
//!
//! 1. every node whose dependencies are complete is launched concurrently
//! 2. the wave is joined in full before anything else happens
//! 3. outputs are recorded and the next ready set is computed
//!
//! Image outputs pass through the [`pigment_moderation::ModerationGate`]
//! before the [`pigment_artifact::ArtifactSink`] writes them. Progress
//! is reported through an [`ExecutionNotifier`].

mod dispatch;
mod error;
mod events;
mod output;
mod result;
mod runtime;

pub use error::{NodeError, RunError};
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier, StepOutput};
pub use output::{NodeOutput, OutputStore};
pub use result::RunOutcome;
pub use runtime::{RunOptions, Runtime, RuntimeConfig};
