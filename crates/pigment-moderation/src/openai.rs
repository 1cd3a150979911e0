use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::{ModerationError, ModerationProvider, ScanResult};

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/moderations";
const DEFAULT_MODEL: &str = "omni-moderation-latest";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Image moderation through the OpenAI moderation endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiModerator {
  client: Client,
  api_key: String,
  endpoint: String,
  model: String,
}

impl OpenAiModerator {
  pub fn new(api_key: impl Into<String>) -> Result<Self, ModerationError> {
    let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
    Ok(Self {
      client,
      api_key: api_key.into(),
      endpoint: DEFAULT_ENDPOINT.to_string(),
      model: DEFAULT_MODEL.to_string(),
    })
  }

  /// Point at a different moderation endpoint (proxies, compatible servers).
  pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
    self.endpoint = endpoint.into();
    self
  }

  pub fn with_model(mut self, model: impl Into<String>) -> Self {
    self.model = model.into();
    self
  }
}

#[async_trait]
impl ModerationProvider for OpenAiModerator {
  async fn scan(&self, bytes: &Bytes, mime: &str) -> Result<ScanResult, ModerationError> {
    let body = json!({
      "model": self.model,
      "input": [{
        "type": "image_url",
        "image_url": { "url": data_url(bytes, mime) },
      }],
    });

    let response = self
      .client
      .post(&self.endpoint)
      .bearer_auth(&self.api_key)
      .json(&body)
      .send()
      .await?;

    let status = response.status();
    debug!(status = status.as_u16(), "moderation response received");

    if !status.is_success() {
      let message = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
      return Err(ModerationError::Api {
        status: status.as_u16(),
        message,
      });
    }

    let parsed: ModerationResponse = response.json().await?;
    parsed.into_scan_result()
  }
}

fn data_url(bytes: &[u8], mime: &str) -> String {
  format!(
    "data:{};base64,{}",
    mime,
    base64::engine::general_purpose::STANDARD.encode(bytes)
  )
}

#[derive(Debug, Deserialize)]
struct ModerationResponse {
  results: Vec<ModerationEntry>,
}

#[derive(Debug, Deserialize)]
struct ModerationEntry {
  flagged: bool,
  #[serde(default)]
  categories: BTreeMap<String, serde_json::Value>,
  #[serde(default)]
  category_scores: BTreeMap<String, serde_json::Value>,
}

impl ModerationResponse {
  fn into_scan_result(self) -> Result<ScanResult, ModerationError> {
    let entry = self
      .results
      .into_iter()
      .next()
      .ok_or_else(|| ModerationError::InvalidResponse("no results".to_string()))?;

    let flagged_categories = entry
      .categories
      .into_iter()
      .filter(|(_, value)| value.as_bool() == Some(true))
      .map(|(name, _)| name)
      .collect();
    let category_scores = entry
      .category_scores
      .into_iter()
      .filter_map(|(name, value)| value.as_f64().map(|score| (name, score)))
      .collect();

    Ok(ScanResult {
      flagged: entry.flagged,
      flagged_categories,
      category_scores,
    })
  }
}
