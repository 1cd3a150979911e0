use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Encoded image bytes with their mime type.
///
/// `Bytes` is reference counted, so fanning one image out to several
/// downstream nodes does not copy it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBlob {
  pub bytes: Bytes,
  pub mime: String,
}

impl ImageBlob {
  pub fn new(bytes: impl Into<Bytes>, mime: impl Into<String>) -> Self {
    Self {
      bytes: bytes.into(),
      mime: mime.into(),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
  Text,
  Json,
}

/// Textual or structured output of a vision or text node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataOutput {
  pub data_type: DataType,
  pub content: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub parsed: Option<serde_json::Value>,
}

impl DataOutput {
  pub fn text(content: impl Into<String>) -> Self {
    Self {
      data_type: DataType::Text,
      content: content.into(),
      parsed: None,
    }
  }

  /// JSON output; `parsed` is filled when `content` is valid JSON.
  pub fn json(content: impl Into<String>) -> Self {
    let content = content.into();
    let parsed = serde_json::from_str(&content).ok();
    Self {
      data_type: DataType::Json,
      content,
      parsed,
    }
  }
}
