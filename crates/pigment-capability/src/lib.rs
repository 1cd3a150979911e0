//! Pigment Capability
//!
//! Interfaces to the collaborators that do the actual work behind each node:
//!
//! - [`CapabilityProvider`] generates, transforms, saves and analyzes images
//!   and generates text
//! - [`Capabilities`] lists the generators and transforms a provider offers,
//!   with the params each one takes
//! - [`UploadLoader`] resolves a user upload id into image bytes
//!
//! The runtime receives both as trait objects at construction time. With the
//! `builtin` feature, [`BuiltinProvider`] offers a small local implementation
//! backed by the `image` crate.

#[cfg(feature = "builtin")]
mod builtin;
mod catalog;
mod error;
mod types;
mod upload;

#[cfg(feature = "builtin")]
pub use builtin::{BuiltinProvider, MAX_DIMENSION};
pub use catalog::{Capabilities, NodeSchema, ParamField, ParamSchema, ParamType, input_nodes};
pub use error::CapabilityError;
pub use types::{DataOutput, DataType, ImageBlob};
pub use upload::StoreUploadLoader;

use async_trait::async_trait;
use pigment_config::SaveProvider;

/// Performs the operations behind generator, transform, save, vision and
/// text nodes.
///
/// Any error returned here fails the node that made the call.
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
  /// Generators and transforms this provider supports. Providers that cannot
  /// describe themselves report nothing.
  fn capabilities(&self) -> Capabilities {
    Capabilities::default()
  }

  /// Produce an image with the named generator.
  async fn generate(
    &self,
    generator: &str,
    params: &serde_json::Value,
  ) -> Result<ImageBlob, CapabilityError>;

  /// Apply `op` to `image`. `to` is the requested output mime, if any.
  async fn transform(
    &self,
    image: &ImageBlob,
    op: &str,
    to: Option<&str>,
    params: &serde_json::Value,
  ) -> Result<ImageBlob, CapabilityError>;

  /// Write `image` to `destination`.
  async fn save(
    &self,
    image: &ImageBlob,
    destination: &str,
    provider: Option<SaveProvider>,
  ) -> Result<(), CapabilityError>;

  /// Describe `image` with the named vision provider.
  async fn analyze_image(
    &self,
    provider: &str,
    image: &ImageBlob,
    params: &serde_json::Value,
  ) -> Result<DataOutput, CapabilityError>;

  /// Generate text with the named text provider.
  async fn generate_text(
    &self,
    provider: &str,
    params: &serde_json::Value,
  ) -> Result<DataOutput, CapabilityError>;
}

/// Resolves previously uploaded images by id.
#[async_trait]
pub trait UploadLoader: Send + Sync {
  /// Returns `Ok(None)` when no upload with this id exists.
  async fn load_upload(&self, upload_id: &str) -> Result<Option<ImageBlob>, CapabilityError>;
}
