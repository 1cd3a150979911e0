//! Pigment Artifact
//!
//! This crate provides artifact storage for pigment. Artifacts are binary
//! blobs (generated images, uploads) plus small JSON records stored next to
//! them.
//!
//! The [`Store`] trait defines the backend layer. Implementations handle the
//! actual storage (filesystem, S3, etc.) while [`ArtifactSink`] decides keys,
//! file extensions and the provenance sidecar layout.
//!
//! The trait uses async streaming for efficient handling of large files.

mod fs;
pub mod mime;
mod sink;

pub use fs::FsStore;
pub use sink::{ArtifactSink, PersistedArtifact, Provenance};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use std::pin::Pin;

/// A boxed stream of bytes for artifact data.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, Error>> + Send>>;

/// Error type for artifact storage operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// The requested artifact was not found.
  #[error("artifact not found: {0}")]
  NotFound(String),

  /// An I/O error occurred.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// A JSON record could not be encoded.
  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

/// Description of a stored object, as returned by [`Store::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
  pub key: String,
  pub size: u64,
  pub modified: Option<DateTime<Utc>>,
}

/// Artifact storage trait.
///
/// Implementations provide the actual storage backend (filesystem, S3, etc.).
/// Keys are flat names such as `img_0190....png`.
#[async_trait]
pub trait Store: Send + Sync {
  /// Retrieve an artifact by key.
  ///
  /// Returns a stream of bytes for efficient handling of large files.
  async fn get(&self, key: &str) -> Result<ByteStream, Error>;

  /// Store an artifact.
  ///
  /// Accepts a stream of bytes for efficient handling of large files.
  async fn put(&self, key: &str, data: ByteStream, content_type: &str) -> Result<(), Error>;

  /// Delete an artifact by key.
  async fn delete(&self, key: &str) -> Result<(), Error>;

  /// List all stored objects. An empty or missing store yields an empty list.
  async fn list(&self) -> Result<Vec<ObjectMeta>, Error>;
}

/// Wrap an in-memory buffer as a single-chunk [`ByteStream`].
pub fn byte_stream(bytes: Bytes) -> ByteStream {
  Box::pin(futures::stream::once(async move { Ok(bytes) }))
}

/// Drain a [`ByteStream`] into one buffer.
pub async fn collect(mut stream: ByteStream) -> Result<Bytes, Error> {
  let mut buf = BytesMut::new();
  while let Some(chunk) = stream.next().await {
    buf.extend_from_slice(&chunk?);
  }
  Ok(buf.freeze())
}
