//! What a provider can do, described for editors and the CLI.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
  String,
  Number,
  Integer,
  Boolean,
}

/// One parameter a node accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamField {
  #[serde(rename = "type")]
  pub kind: ParamType,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub default: Option<serde_json::Value>,
  #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
  pub allowed: Option<Vec<serde_json::Value>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub minimum: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub maximum: Option<f64>,
}

impl ParamField {
  pub fn new(kind: ParamType, title: impl Into<String>) -> Self {
    Self {
      kind,
      title: Some(title.into()),
      description: None,
      default: None,
      allowed: None,
      minimum: None,
      maximum: None,
    }
  }

  pub fn with_description(mut self, description: impl Into<String>) -> Self {
    self.description = Some(description.into());
    self
  }

  pub fn with_default(mut self, default: impl Into<serde_json::Value>) -> Self {
    self.default = Some(default.into());
    self
  }

  pub fn with_range(mut self, minimum: f64, maximum: f64) -> Self {
    self.minimum = Some(minimum);
    self.maximum = Some(maximum);
    self
  }

  pub fn with_allowed<I, V>(mut self, values: I) -> Self
  where
    I: IntoIterator<Item = V>,
    V: Into<serde_json::Value>,
  {
    self.allowed = Some(values.into_iter().map(Into::into).collect());
    self
  }
}

/// Object schema for a node's `params`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamSchema {
  pub properties: BTreeMap<String, ParamField>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub required: Vec<String>,
}

impl ParamSchema {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn field(mut self, name: impl Into<String>, field: ParamField) -> Self {
    self.properties.insert(name.into(), field);
    self
  }

  pub fn required_field(mut self, name: impl Into<String>, field: ParamField) -> Self {
    let name = name.into();
    self.required.push(name.clone());
    self.properties.insert(name, field);
    self
  }
}

/// A generator, transform or input node a caller can place in a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSchema {
  /// `generatorName`, transform `operation`, or input kind.
  pub name: String,
  pub description: String,
  pub category: String,
  pub params: ParamSchema,
}

impl NodeSchema {
  pub fn new(
    name: impl Into<String>,
    description: impl Into<String>,
    category: impl Into<String>,
    params: ParamSchema,
  ) -> Self {
    Self {
      name: name.into(),
      description: description.into(),
      category: category.into(),
      params,
    }
  }
}

/// Generators and transforms offered by a [`crate::CapabilityProvider`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
  pub generators: Vec<NodeSchema>,
  pub transforms: Vec<NodeSchema>,
}

impl Capabilities {
  pub fn generator(&self, name: &str) -> Option<&NodeSchema> {
    self.generators.iter().find(|g| g.name == name)
  }

  pub fn transform(&self, operation: &str) -> Option<&NodeSchema> {
    self.transforms.iter().find(|t| t.name == operation)
  }
}

/// Input nodes are resolved by the runtime's upload loader, not by a
/// provider, so their schema is fixed.
pub fn input_nodes() -> Vec<NodeSchema> {
  vec![NodeSchema::new(
    "upload",
    "Use an uploaded image as input",
    "Input",
    ParamSchema::new().field(
      "uploadId",
      ParamField::new(ParamType::String, "Upload ID")
        .with_description("Reference to uploaded image"),
    ),
  )]
}
