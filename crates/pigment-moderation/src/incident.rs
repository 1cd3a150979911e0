use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{error, warn};

use crate::{ModerationError, ScanResult};

pub const DEFAULT_RECENT_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentKind {
  /// Produced by a workflow node.
  Generated,
  /// Supplied by a user upload.
  Uploaded,
  /// The moderation service itself failed.
  Error,
}

/// One line of the incident log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
  pub timestamp: DateTime<Utc>,
  #[serde(rename = "type")]
  pub kind: IncidentKind,
  pub flagged: bool,
  pub categories: Vec<String>,
  #[serde(default)]
  pub scores: BTreeMap<String, f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub context: Option<serde_json::Value>,
}

impl Incident {
  pub fn new(kind: IncidentKind, result: &ScanResult, context: Option<serde_json::Value>) -> Self {
    Self {
      timestamp: Utc::now(),
      kind,
      flagged: result.flagged,
      categories: result.flagged_categories.clone(),
      scores: result.category_scores.clone(),
      context,
    }
  }
}

/// Append-only JSONL file of moderation incidents.
///
/// Appends are serialized through a lock so concurrent nodes never
/// interleave partial lines.
#[derive(Debug, Clone)]
pub struct IncidentLog {
  path: PathBuf,
  lock: Arc<Mutex<()>>,
}

impl IncidentLog {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      lock: Arc::new(Mutex::new(())),
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Record an incident. Failures are logged and swallowed.
  pub async fn record(&self, incident: &Incident) {
    match serde_json::to_string(incident) {
      Ok(line) => warn!(incident = %line, "moderation incident"),
      Err(e) => {
        error!(error = %e, "failed to serialize moderation incident");
        return;
      }
    }

    if let Err(e) = self.append(incident).await {
      error!(path = %self.path.display(), error = %e, "failed to write incident log");
    }
  }

  async fn append(&self, incident: &Incident) -> Result<(), ModerationError> {
    let mut line = serde_json::to_vec(incident)?;
    line.push(b'\n');

    let _guard = self.lock.lock().await;
    if let Some(parent) = self.path.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::OpenOptions::new()
      .create(true)
      .append(true)
      .open(&self.path)
      .await?;
    file.write_all(&line).await?;
    file.flush().await?;
    Ok(())
  }

  /// The most recent `limit` incidents, newest first.
  ///
  /// A missing log is empty. Unparseable lines are skipped.
  pub async fn recent(&self, limit: usize) -> Result<Vec<Incident>, ModerationError> {
    let content = match tokio::fs::read_to_string(&self.path).await {
      Ok(content) => content,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(e) => return Err(e.into()),
    };

    Ok(
      content
        .lines()
        .rev()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str(line) {
          Ok(incident) => Some(incident),
          Err(e) => {
            warn!(error = %e, "skipping unreadable incident line");
            None
          }
        })
        .take(limit)
        .collect(),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_recent_is_newest_first() {
    let dir = tempfile::tempdir().unwrap();
    let log = IncidentLog::new(dir.path().join("moderation").join("incidents.jsonl"));

    for category in ["a", "b", "c"] {
      log
        .record(&Incident::new(
          IncidentKind::Generated,
          &ScanResult::flagged([category]),
          None,
        ))
        .await;
    }

    let recent = log.recent(2).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].categories, vec!["c"]);
    assert_eq!(recent[1].categories, vec!["b"]);
  }

  #[tokio::test]
  async fn test_missing_log_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let log = IncidentLog::new(dir.path().join("incidents.jsonl"));
    assert!(log.recent(DEFAULT_RECENT_LIMIT).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_lines_use_type_key() {
    let dir = tempfile::tempdir().unwrap();
    let log = IncidentLog::new(dir.path().join("incidents.jsonl"));
    log
      .record(&Incident::new(
        IncidentKind::Error,
        &ScanResult::flagged(["Moderation service unavailable"]),
        Some(serde_json::json!({ "nodeId": "G1" })),
      ))
      .await;

    let raw = std::fs::read_to_string(log.path()).unwrap();
    let line: serde_json::Value = serde_json::from_str(raw.trim()).unwrap();
    assert_eq!(line["type"], "error");
    assert_eq!(line["flagged"], true);
    assert_eq!(line["context"]["nodeId"], "G1");
  }
}
