//! Maps a node to the capability call behind it.
//!
//! Dispatch reads upstream outputs from a snapshot taken by the scheduler
//! before the wave was launched; it never writes the output store.

use pigment_capability::{CapabilityProvider, ImageBlob, UploadLoader};
use pigment_config::{NodeDef, NodeType};
use serde_json::Value;

use crate::error::NodeError;
use crate::output::NodeOutput;

/// An incoming edge's source and whatever it produced.
#[derive(Debug, Clone)]
pub(crate) struct Upstream {
  pub node_id: String,
  pub output: Option<NodeOutput>,
}

/// Run one node against the capability provider.
pub(crate) async fn dispatch(
  node: &NodeDef,
  upstream: &[Upstream],
  capabilities: &dyn CapabilityProvider,
  uploads: &dyn UploadLoader,
) -> Result<NodeOutput, NodeError> {
  match &node.node_type {
    NodeType::Generator(config) => {
      let image = capabilities
        .generate(&config.generator_name, &config.params)
        .await?;
      Ok(NodeOutput::Image(image))
    }
    NodeType::Transform(config) => {
      let input = single_image(node, upstream)?;
      let (to, params) = split_target(&config.params);
      let image = capabilities
        .transform(input, &config.operation, to.as_deref(), &params)
        .await?;
      Ok(NodeOutput::Image(image))
    }
    NodeType::Save(config) => {
      let input = single_image(node, upstream)?;
      capabilities
        .save(input, &config.destination, config.provider)
        .await?;
      Ok(NodeOutput::None)
    }
    NodeType::Input(config) => {
      let upload_id = config
        .upload_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| NodeError::NoUploadSelected {
          node_id: node.id.clone(),
        })?;
      let image = uploads
        .load_upload(upload_id)
        .await?
        .ok_or_else(|| NodeError::UploadNotFound {
          upload_id: upload_id.to_string(),
        })?;
      Ok(NodeOutput::Image(image))
    }
    NodeType::Vision(config) => {
      let input = single_image(node, upstream)?;
      let data = capabilities
        .analyze_image(&config.provider_name, input, &config.params)
        .await?;
      Ok(NodeOutput::Data(data))
    }
    NodeType::Text(config) => {
      let context = text_context(node, upstream)?;
      let params = match context {
        Some(content) => with_context(&config.params, content),
        None => config.params.clone(),
      };
      let data = capabilities
        .generate_text(&config.provider_name, &params)
        .await?;
      Ok(NodeOutput::Data(data))
    }
  }
}

/// The image produced by the one node feeding `node`.
fn single_image<'a>(node: &NodeDef, upstream: &'a [Upstream]) -> Result<&'a ImageBlob, NodeError> {
  let source = match upstream {
    [] => {
      return Err(NodeError::MissingInput {
        node_id: node.id.clone(),
        node_type: node.node_type.name(),
      });
    }
    [source] => source,
    _ => {
      return Err(NodeError::MultipleInputs {
        node_id: node.id.clone(),
        node_type: node.node_type.name(),
        count: upstream.len(),
      });
    }
  };

  match &source.output {
    None | Some(NodeOutput::None) => Err(NodeError::InputNotFound {
      node_id: node.id.clone(),
    }),
    Some(NodeOutput::Image(image)) => Ok(image),
    Some(NodeOutput::Data(_)) => Err(NodeError::NotAnImage {
      node_id: node.id.clone(),
      upstream: source.node_id.clone(),
    }),
  }
}

/// Upstream text for a text node. Non-data upstream output is ignored.
fn text_context<'a>(node: &NodeDef, upstream: &'a [Upstream]) -> Result<Option<&'a str>, NodeError> {
  match upstream {
    [] => Ok(None),
    [source] => Ok(
      source
        .output
        .as_ref()
        .and_then(NodeOutput::as_data)
        .map(|data| data.content.as_str()),
    ),
    _ => Err(NodeError::MultipleInputs {
      node_id: node.id.clone(),
      node_type: node.node_type.name(),
      count: upstream.len(),
    }),
  }
}

/// Add `context` to the params object, wrapping non-object params.
fn with_context(params: &Value, context: &str) -> Value {
  let mut object = match params {
    Value::Object(map) => map.clone(),
    Value::Null => serde_json::Map::new(),
    other => {
      let mut map = serde_json::Map::new();
      map.insert("params".to_string(), other.clone());
      map
    }
  };
  object.insert("context".to_string(), Value::String(context.to_string()));
  Value::Object(object)
}

/// Split the target format (`to`) out of transform params.
fn split_target(params: &Value) -> (Option<String>, Value) {
  let Value::Object(map) = params else {
    return (None, params.clone());
  };

  let mut rest = map.clone();
  let to = rest
    .remove("to")
    .and_then(|value| value.as_str().map(str::to_string));
  (to, Value::Object(rest))
}

#[cfg(test)]
mod tests {
  use super::*;
  use pigment_capability::DataOutput;
  use pigment_config::TransformConfig;
  use serde_json::json;

  fn transform(id: &str) -> NodeDef {
    NodeDef::new(
      id,
      NodeType::Transform(TransformConfig {
        operation: "resize".to_string(),
        params: json!({}),
      }),
    )
  }

  fn upstream(id: &str, output: Option<NodeOutput>) -> Upstream {
    Upstream {
      node_id: id.to_string(),
      output,
    }
  }

  #[test]
  fn test_single_image_requires_exactly_one_input() {
    let node = transform("T1");

    let err = single_image(&node, &[]).unwrap_err();
    assert_eq!(err.to_string(), "No input for transform node T1");

    let image = NodeOutput::Image(ImageBlob::new(&b"x"[..], "image/png"));
    let two = [
      upstream("a", Some(image.clone())),
      upstream("b", Some(image.clone())),
    ];
    assert!(matches!(
      single_image(&node, &two),
      Err(NodeError::MultipleInputs { count: 2, .. })
    ));

    let one = [upstream("a", Some(image))];
    assert_eq!(&single_image(&node, &one).unwrap().bytes[..], b"x");
  }

  #[test]
  fn test_single_image_rejects_non_images() {
    let node = transform("T1");

    let missing = [upstream("s", Some(NodeOutput::None))];
    assert_eq!(
      single_image(&node, &missing).unwrap_err().to_string(),
      "Input not found for node T1"
    );

    let data = [upstream("v", Some(NodeOutput::Data(DataOutput::text("hi"))))];
    assert!(matches!(
      single_image(&node, &data),
      Err(NodeError::NotAnImage { .. })
    ));
  }

  #[test]
  fn test_split_target_lifts_to() {
    let (to, rest) = split_target(&json!({ "to": "image/jpeg", "quality": 80 }));
    assert_eq!(to.as_deref(), Some("image/jpeg"));
    assert_eq!(rest, json!({ "quality": 80 }));

    let (to, rest) = split_target(&json!({ "width": 10 }));
    assert!(to.is_none());
    assert_eq!(rest, json!({ "width": 10 }));
  }

  #[test]
  fn test_with_context() {
    assert_eq!(
      with_context(&json!({ "prompt": "caption" }), "a red square"),
      json!({ "prompt": "caption", "context": "a red square" })
    );
    assert_eq!(with_context(&Value::Null, "c"), json!({ "context": "c" }));
  }
}
