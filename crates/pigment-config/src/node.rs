use serde::{Deserialize, Serialize};

/// Canvas position. Carried for round-tripping editor documents, ignored by
/// execution.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
  pub x: f64,
  pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
  pub id: String,
  #[serde(flatten)]
  pub node_type: NodeType,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub position: Option<Position>,
}

impl NodeDef {
  pub fn new(id: impl Into<String>, node_type: NodeType) -> Self {
    Self {
      id: id.into(),
      node_type,
      position: None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeType {
  /// Produces an image from nothing but parameters.
  Generator(GeneratorConfig),
  /// Applies one operation to its upstream image.
  Transform(TransformConfig),
  /// Hands its upstream image to a destination. Produces no output.
  Save(SaveConfig),
  /// Loads a previously uploaded image.
  Input(InputConfig),
  /// Analyzes its upstream image with an AI provider.
  Vision(VisionConfig),
  /// Generates text, optionally using upstream data as context.
  Text(TextConfig),
}

impl NodeType {
  /// Stable lowercase name, matching the serialized `type` tag.
  pub fn name(&self) -> &'static str {
    match self {
      NodeType::Generator(_) => "generator",
      NodeType::Transform(_) => "transform",
      NodeType::Save(_) => "save",
      NodeType::Input(_) => "input",
      NodeType::Vision(_) => "vision",
      NodeType::Text(_) => "text",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorConfig {
  pub generator_name: String,
  #[serde(default)]
  pub params: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformConfig {
  pub operation: String,
  #[serde(default)]
  pub params: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveProvider {
  Filesystem,
  S3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveConfig {
  pub destination: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub provider: Option<SaveProvider>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputConfig {
  /// Reference to an uploaded image. `None` until the user picks one.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub upload_id: Option<String>,
  /// Original filename, for display only.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub filename: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub mime: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionConfig {
  /// e.g. "openai-vision", "ollama-vision"
  pub provider_name: String,
  #[serde(default)]
  pub params: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextConfig {
  /// e.g. "openai-text", "ollama-text"
  pub provider_name: String,
  #[serde(default)]
  pub params: serde_json::Value,
}
