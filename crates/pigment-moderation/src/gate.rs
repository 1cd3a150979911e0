use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::{GateError, Incident, IncidentKind, IncidentLog, ModerationProvider, ScanResult};

const UNAVAILABLE_CATEGORY: &str = "Moderation service unavailable";

/// How content got through the gate.
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
  /// Moderation is disabled.
  Skipped,
  /// Scanned and not flagged.
  Passed(ScanResult),
  /// The scan failed and the gate is permissive.
  Unmoderated,
}

/// Scan-before-persist policy.
///
/// Built once at startup from process configuration and shared read-only
/// by every execution.
#[derive(Clone)]
pub struct ModerationGate {
  inner: Option<Enabled>,
}

#[derive(Clone)]
struct Enabled {
  provider: Arc<dyn ModerationProvider>,
  strict: bool,
  incidents: IncidentLog,
}

impl ModerationGate {
  /// A gate that lets everything through.
  pub fn disabled() -> Self {
    Self { inner: None }
  }

  pub fn new(provider: Arc<dyn ModerationProvider>, strict: bool, incidents: IncidentLog) -> Self {
    Self {
      inner: Some(Enabled {
        provider,
        strict,
        incidents,
      }),
    }
  }

  pub fn is_enabled(&self) -> bool {
    self.inner.is_some()
  }

  pub fn is_strict(&self) -> bool {
    self.inner.as_ref().is_some_and(|inner| inner.strict)
  }

  /// Decide whether `bytes` may be persisted.
  ///
  /// `context` is attached to any incident recorded for this content.
  pub async fn check(
    &self,
    bytes: &Bytes,
    mime: &str,
    kind: IncidentKind,
    context: serde_json::Value,
  ) -> Result<GateDecision, GateError> {
    let Some(inner) = &self.inner else {
      return Ok(GateDecision::Skipped);
    };

    match inner.provider.scan(bytes, mime).await {
      Ok(result) if result.flagged => {
        inner
          .incidents
          .record(&Incident::new(kind, &result, Some(context)))
          .await;
        Err(GateError::PolicyViolation {
          categories: result.flagged_categories,
        })
      }
      Ok(result) => {
        debug!(mime, "content passed moderation");
        Ok(GateDecision::Passed(result))
      }
      Err(e) if inner.strict => {
        inner
          .incidents
          .record(&Incident::new(
            IncidentKind::Error,
            &ScanResult::flagged([UNAVAILABLE_CATEGORY]),
            Some(context),
          ))
          .await;
        Err(GateError::ServiceUnavailable(e.to_string()))
      }
      Err(e) => {
        warn!(error = %e, "moderation unavailable, allowing content through unmoderated");
        Ok(GateDecision::Unmoderated)
      }
    }
  }
}

impl std::fmt::Debug for ModerationGate {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ModerationGate")
      .field("enabled", &self.is_enabled())
      .field("strict", &self.is_strict())
      .finish()
  }
}
