/// Failure to obtain a moderation verdict.
#[derive(Debug, thiserror::Error)]
pub enum ModerationError {
  #[error("moderation request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("moderation API returned {status}: {message}")]
  Api { status: u16, message: String },

  #[error("invalid moderation response: {0}")]
  InvalidResponse(String),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

/// Why the gate refused content.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GateError {
  #[error("Content policy violation: This image was flagged for {}.", categories.join(", "))]
  PolicyViolation { categories: Vec<String> },

  #[error("Content moderation service unavailable: {0}")]
  ServiceUnavailable(String),
}

impl GateError {
  pub fn is_policy_violation(&self) -> bool {
    matches!(self, Self::PolicyViolation { .. })
  }
}
