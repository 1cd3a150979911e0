//! Sequential pipeline export.
//!
//! The export format is a flat list of steps that pass values through named
//! variables. Each step references at most one upstream variable, so fan-out
//! structure is not represented: a node consumed by two transforms appears
//! once, and both transforms name the same `in` variable.

use std::collections::{BTreeMap, HashSet};

use pigment_config::{NodeDef, NodeType, SaveProvider, WorkflowDef};
use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;
use crate::graph::Graph;

const PIPELINE_NAME: &str = "Studio Workflow";

/// A linear rendering of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
  pub name: String,
  pub steps: Vec<Step>,
  /// node_id -> variable name assigned to it.
  #[serde(skip)]
  pub variables: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Step {
  Generate {
    generator: String,
    params: serde_json::Value,
    out: String,
  },
  Load {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    upload: Option<String>,
    out: String,
  },
  Transform {
    op: String,
    #[serde(rename = "in", default, skip_serializing_if = "Option::is_none")]
    input: Option<String>,
    params: serde_json::Value,
    out: String,
  },
  Save {
    #[serde(rename = "in", default, skip_serializing_if = "Option::is_none")]
    input: Option<String>,
    destination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    provider: Option<SaveProvider>,
  },
  Vision {
    provider: String,
    #[serde(rename = "in", default, skip_serializing_if = "Option::is_none")]
    input: Option<String>,
    params: serde_json::Value,
    out: String,
  },
  Text {
    provider: String,
    #[serde(rename = "in", default, skip_serializing_if = "Option::is_none")]
    input: Option<String>,
    params: serde_json::Value,
    out: String,
  },
}

impl Pipeline {
  /// Render as YAML.
  pub fn to_yaml(&self) -> Result<String, WorkflowError> {
    Ok(serde_yaml::to_string(self)?)
  }
}

/// Topologically sort the workflow, stable with respect to node order.
///
/// Uses the same readiness rule as the scheduler, one wave at a time. Nodes
/// that never become ready (cycles, dangling dependencies) are left out.
pub fn sort(workflow: &WorkflowDef) -> Vec<&NodeDef> {
  let graph = Graph::new(&workflow.nodes, &workflow.edges);
  let running = HashSet::new();
  let mut completed = HashSet::new();
  let mut sorted = Vec::with_capacity(workflow.nodes.len());

  while sorted.len() < workflow.nodes.len() {
    let ready = graph.find_ready(&workflow.nodes, &completed, &running);
    if ready.is_empty() {
      break;
    }
    for node in ready {
      completed.insert(node.id.clone());
      sorted.push(node);
    }
  }

  sorted
}

/// Flatten a workflow into a [`Pipeline`].
pub fn linearize(workflow: &WorkflowDef) -> Pipeline {
  let mut variables = BTreeMap::new();
  let mut steps = Vec::new();

  for (index, node) in sort(workflow).into_iter().enumerate() {
    let out = format!("v{index}");
    let input = workflow
      .incoming(&node.id)
      .next()
      .and_then(|edge| variables.get(&edge.source).cloned());

    let step = match &node.node_type {
      NodeType::Generator(config) => Step::Generate {
        generator: config.generator_name.clone(),
        params: config.params.clone(),
        out: out.clone(),
      },
      NodeType::Input(config) => Step::Load {
        upload: config.upload_id.clone(),
        out: out.clone(),
      },
      NodeType::Transform(config) => Step::Transform {
        op: config.operation.clone(),
        input,
        params: config.params.clone(),
        out: out.clone(),
      },
      NodeType::Save(config) => Step::Save {
        input,
        destination: config.destination.clone(),
        provider: config.provider,
      },
      NodeType::Vision(config) => Step::Vision {
        provider: config.provider_name.clone(),
        input,
        params: config.params.clone(),
        out: out.clone(),
      },
      NodeType::Text(config) => Step::Text {
        provider: config.provider_name.clone(),
        input,
        params: config.params.clone(),
        out: out.clone(),
      },
    };

    variables.insert(node.id.clone(), out);
    steps.push(step);
  }

  Pipeline {
    name: PIPELINE_NAME.to_string(),
    steps,
    variables,
  }
}
