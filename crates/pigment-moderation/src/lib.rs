//! Content moderation applied to image bytes before they are persisted.
//!
//! A [`ModerationProvider`] classifies content. The [`ModerationGate`] turns
//! that classification into an accept/reject decision according to the
//! process-wide policy (enabled, strict) and records incidents to an
//! [`IncidentLog`].

mod error;
mod gate;
mod incident;
mod openai;

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

pub use error::{GateError, ModerationError};
pub use gate::{GateDecision, ModerationGate};
pub use incident::{DEFAULT_RECENT_LIMIT, Incident, IncidentKind, IncidentLog};
pub use openai::OpenAiModerator;

/// Outcome of a successful scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
  pub flagged: bool,
  pub flagged_categories: Vec<String>,
  #[serde(default)]
  pub category_scores: BTreeMap<String, f64>,
}

impl ScanResult {
  /// A result that flags nothing.
  pub fn clean() -> Self {
    Self::default()
  }

  pub fn flagged<I, S>(categories: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      flagged: true,
      flagged_categories: categories.into_iter().map(Into::into).collect(),
      category_scores: BTreeMap::new(),
    }
  }
}

/// A content classification service.
///
/// An `Err` means the service could not be consulted, which is distinct from
/// content being flagged.
#[async_trait]
pub trait ModerationProvider: Send + Sync {
  async fn scan(&self, bytes: &Bytes, mime: &str) -> Result<ScanResult, ModerationError>;
}
