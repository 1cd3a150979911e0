use std::collections::{HashMap, HashSet};

use pigment_config::{Edge, NodeDef};

/// Dependency structure derived from a workflow's edges.
///
/// Built once per execution and never mutated afterwards. An edge whose
/// target is not a known node is ignored. An edge whose source is unknown
/// still records the dependency, so its target can never become ready and
/// is eventually reported as unreachable.
#[derive(Debug, Clone, Default)]
pub struct Graph {
  /// node_id -> node_ids it depends on.
  dependencies: HashMap<String, HashSet<String>>,
  /// node_id -> node_ids that depend on it.
  dependents: HashMap<String, HashSet<String>>,
}

impl Graph {
  /// Build the graph from nodes and edges.
  ///
  /// Duplicate edges collapse into a single dependency. Self-loops are kept
  /// and surface later as a cycle.
  pub fn new(nodes: &[NodeDef], edges: &[Edge]) -> Self {
    let mut dependencies: HashMap<String, HashSet<String>> = HashMap::new();
    let mut dependents: HashMap<String, HashSet<String>> = HashMap::new();

    for node in nodes {
      dependencies.entry(node.id.clone()).or_default();
      dependents.entry(node.id.clone()).or_default();
    }

    for edge in edges {
      if let Some(deps) = dependencies.get_mut(&edge.target) {
        deps.insert(edge.source.clone());
      }
      if let Some(downstream) = dependents.get_mut(&edge.source) {
        downstream.insert(edge.target.clone());
      }
    }

    Self {
      dependencies,
      dependents,
    }
  }

  /// Node ids that `node_id` depends on.
  pub fn dependencies(&self, node_id: &str) -> Option<&HashSet<String>> {
    self.dependencies.get(node_id)
  }

  /// Node ids that depend on `node_id`.
  pub fn dependents(&self, node_id: &str) -> Option<&HashSet<String>> {
    self.dependents.get(node_id)
  }

  /// Nodes that are neither completed nor running and whose dependencies
  /// are all completed, in the order of `nodes`.
  pub fn find_ready<'a>(
    &self,
    nodes: &'a [NodeDef],
    completed: &HashSet<String>,
    running: &HashSet<String>,
  ) -> Vec<&'a NodeDef> {
    nodes
      .iter()
      .filter(|node| !completed.contains(&node.id) && !running.contains(&node.id))
      .filter(|node| {
        self
          .dependencies
          .get(&node.id)
          .is_none_or(|deps| deps.iter().all(|dep| completed.contains(dep)))
      })
      .collect()
  }

  /// Among the nodes not yet completed, those that are stuck because of a
  /// cycle: nodes on a cycle and nodes downstream of one, in node order.
  ///
  /// Nodes that are stuck only because they depend on an unknown id are not
  /// included.
  pub fn cyclic_nodes(&self, nodes: &[NodeDef], completed: &HashSet<String>) -> Vec<String> {
    let mut settled: HashSet<&str> = completed.iter().map(String::as_str).collect();

    loop {
      let mut progressed = false;
      for node in nodes {
        if settled.contains(node.id.as_str()) {
          continue;
        }
        let unblocked = self.dependencies.get(&node.id).is_none_or(|deps| {
          deps
            .iter()
            .all(|dep| settled.contains(dep.as_str()) || !self.dependencies.contains_key(dep))
        });
        if unblocked {
          settled.insert(node.id.as_str());
          progressed = true;
        }
      }
      if !progressed {
        break;
      }
    }

    nodes
      .iter()
      .filter(|node| !settled.contains(node.id.as_str()))
      .map(|node| node.id.clone())
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pigment_config::{GeneratorConfig, NodeType, SaveConfig, TransformConfig};

  fn generator(id: &str) -> NodeDef {
    NodeDef::new(
      id,
      NodeType::Generator(GeneratorConfig {
        generator_name: "solidColor".to_string(),
        params: serde_json::Value::Null,
      }),
    )
  }

  fn transform(id: &str) -> NodeDef {
    NodeDef::new(
      id,
      NodeType::Transform(TransformConfig {
        operation: "resize".to_string(),
        params: serde_json::Value::Null,
      }),
    )
  }

  fn save(id: &str) -> NodeDef {
    NodeDef::new(
      id,
      NodeType::Save(SaveConfig {
        destination: format!("{id}.png"),
        provider: None,
      }),
    )
  }

  fn ids(nodes: &[&NodeDef]) -> Vec<String> {
    nodes.iter().map(|n| n.id.clone()).collect()
  }

  fn set(ids: &[&str]) -> HashSet<String> {
    ids.iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn test_dependencies_and_dependents() {
    let nodes = vec![generator("g"), transform("t1"), transform("t2")];
    let edges = vec![Edge::new("g", "t1"), Edge::new("g", "t2")];
    let graph = Graph::new(&nodes, &edges);

    assert_eq!(graph.dependencies("t1"), Some(&set(&["g"])));
    assert_eq!(graph.dependents("g"), Some(&set(&["t1", "t2"])));
    assert!(graph.dependencies("g").unwrap().is_empty());
  }

  #[test]
  fn test_duplicate_edges_are_idempotent() {
    let nodes = vec![generator("g"), save("s")];
    let edges = vec![Edge::new("g", "s"), Edge::new("g", "s")];
    let graph = Graph::new(&nodes, &edges);

    assert_eq!(graph.dependencies("s").unwrap().len(), 1);
    assert_eq!(graph.dependents("g").unwrap().len(), 1);
  }

  #[test]
  fn test_ready_nodes_follow_input_order() {
    let nodes = vec![generator("b"), generator("a"), save("s")];
    let edges = vec![Edge::new("a", "s")];
    let graph = Graph::new(&nodes, &edges);

    let ready = graph.find_ready(&nodes, &HashSet::new(), &HashSet::new());
    assert_eq!(ids(&ready), vec!["b", "a"]);
  }

  #[test]
  fn test_ready_requires_all_dependencies_completed() {
    let nodes = vec![generator("g1"), generator("g2"), save("s")];
    let edges = vec![Edge::new("g1", "s"), Edge::new("g2", "s")];
    let graph = Graph::new(&nodes, &edges);

    let ready = graph.find_ready(&nodes, &set(&["g1"]), &HashSet::new());
    assert_eq!(ids(&ready), vec!["g2"]);

    let ready = graph.find_ready(&nodes, &set(&["g1", "g2"]), &HashSet::new());
    assert_eq!(ids(&ready), vec!["s"]);
  }

  #[test]
  fn test_running_nodes_are_not_ready() {
    let nodes = vec![generator("g1"), generator("g2")];
    let graph = Graph::new(&nodes, &[]);

    let ready = graph.find_ready(&nodes, &HashSet::new(), &set(&["g1"]));
    assert_eq!(ids(&ready), vec!["g2"]);
  }

  #[test]
  fn test_edge_to_unknown_target_is_ignored() {
    let nodes = vec![generator("g")];
    let edges = vec![Edge::new("g", "ghost")];
    let graph = Graph::new(&nodes, &edges);

    assert!(graph.dependencies("ghost").is_none());
    assert_eq!(graph.dependents("g"), Some(&set(&["ghost"])));
    let ready = graph.find_ready(&nodes, &HashSet::new(), &HashSet::new());
    assert_eq!(ids(&ready), vec!["g"]);
  }

  #[test]
  fn test_edge_from_unknown_source_blocks_target() {
    let nodes = vec![generator("g"), save("s")];
    let edges = vec![Edge::new("ghost", "s")];
    let graph = Graph::new(&nodes, &edges);

    let ready = graph.find_ready(&nodes, &set(&["g"]), &HashSet::new());
    assert!(ready.is_empty());
    assert!(graph.cyclic_nodes(&nodes, &set(&["g"])).is_empty());
  }

  #[test]
  fn test_cyclic_nodes_include_downstream() {
    let nodes = vec![generator("g"), transform("a"), transform("b"), save("s")];
    let edges = vec![
      Edge::new("g", "a"),
      Edge::new("b", "a"),
      Edge::new("a", "b"),
      Edge::new("b", "s"),
    ];
    let graph = Graph::new(&nodes, &edges);

    assert_eq!(graph.cyclic_nodes(&nodes, &set(&["g"])), vec!["a", "b", "s"]);
  }

  #[test]
  fn test_self_loop_is_cyclic() {
    let nodes = vec![transform("t")];
    let edges = vec![Edge::new("t", "t")];
    let graph = Graph::new(&nodes, &edges);

    assert!(graph.find_ready(&nodes, &HashSet::new(), &HashSet::new()).is_empty());
    assert_eq!(graph.cyclic_nodes(&nodes, &HashSet::new()), vec!["t"]);
  }
}
