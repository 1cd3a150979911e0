//! Workflow runtime.
//!
//! [`Runtime`] is the entry point for executing workflows. It owns the
//! collaborators every run needs (capability provider, upload loader,
//! moderation gate, artifact sink) and provides `invoke(workflow, options)`
//! to execute a full graph.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use pigment_artifact::{ArtifactSink, Provenance};
use pigment_capability::{CapabilityProvider, UploadLoader};
use pigment_config::{NodeDef, NodeType, WorkflowDef};
use pigment_moderation::{GateDecision, IncidentKind, ModerationGate};
use pigment_workflow::Graph;
use serde_json::json;
use tracing::{error, info, instrument, warn};

use crate::dispatch::{Upstream, dispatch};
use crate::error::{NodeError, RunError};
use crate::events::{ExecutionEvent, ExecutionNotifier, NoopNotifier, StepOutput};
use crate::output::{NodeOutput, OutputStore};
use crate::result::RunOutcome;

/// Handle for a spawned node task.
type NodeHandle = tokio::task::JoinHandle<Result<Settled, NodeError>>;

/// Collaborators shared by every run.
///
/// Resolved once at startup; nothing here changes during an execution.
#[derive(Clone)]
pub struct RuntimeConfig {
  pub capabilities: Arc<dyn CapabilityProvider>,
  pub uploads: Arc<dyn UploadLoader>,
  pub moderation: ModerationGate,
  pub sink: ArtifactSink,
}

/// Per-run options.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
  /// Recorded in the provenance of every persisted image.
  pub template_id: Option<String>,
}

/// Scheduler-owned state for one execution.
#[derive(Debug, Default)]
struct ExecutionState {
  completed: HashSet<String>,
  running: HashSet<String>,
  outputs: OutputStore,
  wave: usize,
}

/// What a node task hands back to the scheduler.
#[derive(Debug)]
struct Settled {
  output: NodeOutput,
  image_id: Option<String>,
  unmoderated: bool,
}

impl Settled {
  fn without_image(output: NodeOutput) -> Self {
    Self {
      output,
      image_id: None,
      unmoderated: false,
    }
  }
}

/// The workflow runtime.
///
/// Generic over `N: ExecutionNotifier` to allow different notification
/// strategies. Use `Runtime::new()` to discard events, or
/// `Runtime::with_notifier()` to observe them.
pub struct Runtime<N: ExecutionNotifier = NoopNotifier> {
  config: Arc<RuntimeConfig>,
  notifier: N,
}

impl Runtime<NoopNotifier> {
  pub fn new(config: RuntimeConfig) -> Self {
    Self::with_notifier(config, NoopNotifier)
  }
}

impl<N: ExecutionNotifier> Runtime<N> {
  pub fn with_notifier(config: RuntimeConfig, notifier: N) -> Self {
    Self {
      config: Arc::new(config),
      notifier,
    }
  }

  /// Execute every reachable node of `workflow`.
  ///
  /// Any node failure fails the run once its wave has settled. Siblings in
  /// that wave still finish, and images they persisted stay persisted.
  #[instrument(
    name = "runtime_invoke",
    skip(self, workflow, options),
    fields(
      workflow = workflow.name.as_deref().unwrap_or("untitled"),
      node_count = workflow.nodes.len(),
    )
  )]
  pub async fn invoke(
    &self,
    workflow: &WorkflowDef,
    options: RunOptions,
  ) -> Result<RunOutcome, RunError> {
    let execution_id = uuid::Uuid::new_v4().to_string();

    info!(execution_id = %execution_id, "workflow_started");
    self.notifier.notify(ExecutionEvent::WorkflowStarted {
      execution_id: execution_id.clone(),
      node_count: workflow.nodes.len(),
    });

    let result = self
      .run_execution_loop(workflow, options, &execution_id)
      .await;

    match &result {
      Ok(outcome) => {
        info!(
          execution_id = %execution_id,
          waves = outcome.waves.len(),
          images = outcome.image_ids.len(),
          "workflow_completed"
        );
        self.notifier.notify(ExecutionEvent::WorkflowCompleted {
          execution_id: execution_id.clone(),
          image_ids: outcome.image_ids.clone(),
        });
      }
      Err(e) => {
        error!(execution_id = %execution_id, error = %e, "workflow_failed");
        self.notifier.notify(ExecutionEvent::WorkflowFailed {
          execution_id: execution_id.clone(),
          error: e.to_string(),
        });
      }
    }

    result
  }

  /// Run waves until every node completed or nothing more can run.
  async fn run_execution_loop(
    &self,
    workflow: &WorkflowDef,
    options: RunOptions,
    execution_id: &str,
  ) -> Result<RunOutcome, RunError> {
    pigment_workflow::validate(workflow)?;

    let graph = Graph::new(&workflow.nodes, &workflow.edges);
    let provenance = Arc::new(Provenance {
      nodes: workflow.nodes.clone(),
      edges: workflow.edges.clone(),
      executed_at: Utc::now(),
      template_id: options.template_id,
    });

    let mut state = ExecutionState::default();
    let mut outcome = RunOutcome {
      execution_id: execution_id.to_string(),
      ..RunOutcome::default()
    };

    while state.completed.len() < workflow.nodes.len() {
      let ready = graph.find_ready(&workflow.nodes, &state.completed, &state.running);

      if ready.is_empty() {
        // Waves are fully joined, so nothing is running here.
        let cyclic = graph.cyclic_nodes(&workflow.nodes, &state.completed);
        if !cyclic.is_empty() {
          return Err(RunError::CyclicGraph { node_ids: cyclic });
        }

        outcome.skipped = workflow
          .nodes
          .iter()
          .filter(|node| !state.completed.contains(&node.id))
          .map(|node| node.id.clone())
          .collect();
        warn!(
          execution_id = %execution_id,
          skipped = ?outcome.skipped,
          "skipping disconnected nodes"
        );
        break;
      }

      let wave_ids: Vec<String> = ready.iter().map(|node| node.id.clone()).collect();
      info!(
        execution_id = %execution_id,
        wave = state.wave,
        ready_nodes = ?wave_ids,
        "executing wave"
      );

      let handles = self.execute_ready_nodes(workflow, &ready, &mut state, &provenance, execution_id);

      // Full barrier: the next wave never starts before this one settles.
      let results = futures::future::join_all(handles).await;

      let mut failure = None;
      for (node, result) in ready.iter().zip(results) {
        state.running.remove(&node.id);

        let error = match result {
          Ok(Ok(settled)) => {
            self.record_settled(node, settled, &mut state, &mut outcome, execution_id);
            continue;
          }
          Ok(Err(e)) => {
            let message = e.to_string();
            if failure.is_none() {
              failure = Some(RunError::NodeFailed {
                node_id: node.id.clone(),
                source: e,
              });
            }
            message
          }
          Err(e) => {
            let message = e.to_string();
            if failure.is_none() {
              failure = Some(RunError::TaskJoin {
                node_id: node.id.clone(),
                message: message.clone(),
              });
            }
            message
          }
        };

        error!(
          execution_id = %execution_id,
          wave = state.wave,
          node_id = %node.id,
          error = %error,
          "task_failed"
        );
        self.notifier.notify(ExecutionEvent::NodeFailed {
          execution_id: execution_id.to_string(),
          wave: state.wave,
          node_id: node.id.clone(),
          error,
        });
      }

      if let Some(e) = failure {
        return Err(e);
      }

      outcome.waves.push(wave_ids);
      state.wave += 1;
    }

    Ok(outcome)
  }

  /// Spawn one task per ready node.
  fn execute_ready_nodes(
    &self,
    workflow: &WorkflowDef,
    ready: &[&NodeDef],
    state: &mut ExecutionState,
    provenance: &Arc<Provenance>,
    execution_id: &str,
  ) -> Vec<NodeHandle> {
    let mut handles = Vec::with_capacity(ready.len());

    for node in ready {
      state.running.insert(node.id.clone());

      info!(
        execution_id = %execution_id,
        wave = state.wave,
        node_id = %node.id,
        node_type = node.node_type.name(),
        "task_started"
      );
      self.notifier.notify(ExecutionEvent::NodeRunning {
        execution_id: execution_id.to_string(),
        wave: state.wave,
        node_id: node.id.clone(),
      });

      let upstream = upstream_snapshot(workflow, &node.id, &state.outputs);
      let node = (*node).clone();
      let config = self.config.clone();
      let provenance = provenance.clone();
      let execution_id = execution_id.to_string();

      handles.push(tokio::spawn(async move {
        run_node(&config, &node, &upstream, &provenance, &execution_id).await
      }));
    }

    handles
  }

  fn record_settled(
    &self,
    node: &NodeDef,
    settled: Settled,
    state: &mut ExecutionState,
    outcome: &mut RunOutcome,
    execution_id: &str,
  ) {
    let step = match (&settled.output, settled.image_id) {
      (NodeOutput::Image(image), Some(image_id)) => {
        if settled.unmoderated {
          outcome.unmoderated.push(image_id.clone());
        }
        outcome.image_ids.push(image_id.clone());
        outcome.images.insert(image_id.clone(), image.bytes.clone());
        outcome
          .image_ids_by_node
          .insert(node.id.clone(), image_id.clone());
        StepOutput::Image { image_id }
      }
      (NodeOutput::Data(data), _) => {
        outcome.data_outputs.insert(node.id.clone(), data.clone());
        StepOutput::Data(data.clone())
      }
      _ => StepOutput::None,
    };

    info!(
      execution_id = %execution_id,
      wave = state.wave,
      node_id = %node.id,
      "task_completed"
    );

    state.outputs.insert(node.id.clone(), settled.output);
    state.completed.insert(node.id.clone());

    self.notifier.notify(ExecutionEvent::NodeCompleted {
      execution_id: execution_id.to_string(),
      wave: state.wave,
      node_id: node.id.clone(),
      output: step,
    });
  }
}

/// Sources feeding `node_id` with their recorded outputs, one entry per
/// distinct source in edge order.
fn upstream_snapshot(workflow: &WorkflowDef, node_id: &str, outputs: &OutputStore) -> Vec<Upstream> {
  let mut seen = HashSet::new();
  workflow
    .incoming(node_id)
    .filter(|edge| seen.insert(edge.source.as_str()))
    .map(|edge| Upstream {
      node_id: edge.source.clone(),
      output: outputs.get(&edge.source).cloned(),
    })
    .collect()
}

/// Dispatch a node, then moderate and persist any image it produced.
///
/// Nothing reaches the sink without first passing the gate.
async fn run_node(
  config: &RuntimeConfig,
  node: &NodeDef,
  upstream: &[Upstream],
  provenance: &Provenance,
  execution_id: &str,
) -> Result<Settled, NodeError> {
  let output = dispatch(
    node,
    upstream,
    config.capabilities.as_ref(),
    config.uploads.as_ref(),
  )
  .await?;

  let incident_kind = match node.node_type {
    NodeType::Generator(_) | NodeType::Transform(_) => IncidentKind::Generated,
    NodeType::Input(_) => IncidentKind::Uploaded,
    _ => return Ok(Settled::without_image(output)),
  };
  let NodeOutput::Image(image) = &output else {
    return Ok(Settled::without_image(output));
  };

  let decision = config
    .moderation
    .check(
      &image.bytes,
      &image.mime,
      incident_kind,
      json!({
        "executionId": execution_id,
        "nodeId": node.id,
        "nodeType": node.node_type.name(),
        "mime": image.mime,
      }),
    )
    .await?;

  let artifact = config
    .sink
    .persist(image.bytes.clone(), &image.mime, provenance)
    .await?;

  let unmoderated = decision == GateDecision::Unmoderated;
  if unmoderated {
    warn!(
      execution_id = %execution_id,
      node_id = %node.id,
      artifact_id = %artifact.id,
      "image persisted without moderation"
    );
  }

  Ok(Settled {
    output,
    image_id: Some(artifact.id),
    unmoderated,
  })
}
