//! Capability errors.

/// Errors returned by capability providers and upload loaders.
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
  /// No generator with this name is registered.
  #[error("unknown generator: {0}")]
  UnknownGenerator(String),

  /// The transform operation is not supported.
  #[error("unsupported transform operation: {0}")]
  UnsupportedOperation(String),

  /// The named vision/text/save provider is not available.
  #[error("provider '{0}' is not available")]
  ProviderUnavailable(String),

  /// A node parameter is missing or malformed.
  #[error("invalid parameter '{name}': {message}")]
  InvalidParam { name: String, message: String },

  /// Provider-side failure, passed through as-is.
  #[error("{0}")]
  Failed(String),

  /// Upload storage failed.
  #[error("storage error: {0}")]
  Storage(#[from] pigment_artifact::Error),

  /// An I/O error occurred.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// Image decoding or encoding failed.
  #[cfg(feature = "builtin")]
  #[error("image processing error: {0}")]
  Image(#[from] image::ImageError),
}

impl CapabilityError {
  pub fn invalid_param(name: impl Into<String>, message: impl Into<String>) -> Self {
    Self::InvalidParam {
      name: name.into(),
      message: message.into(),
    }
  }
}
