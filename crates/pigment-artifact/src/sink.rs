//! Persistence sink for accepted images.
//!
//! Layout per artifact, sharing one id stem:
//!
//! ```text
//! img_<uuid-v7>.<ext>    raw image bytes
//! img_<uuid-v7>.json     provenance record (workflow graph that produced it)
//! ```

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use pigment_config::{Edge, NodeDef};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::mime;
use crate::{Error, ObjectMeta, Store, byte_stream, collect};

const SIDECAR_EXTENSION: &str = "json";
const ID_PREFIX: &str = "img_";

/// Which workflow produced an artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
  pub nodes: Vec<NodeDef>,
  pub edges: Vec<Edge>,
  pub executed_at: DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub template_id: Option<String>,
}

/// A stored image and what is known about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedArtifact {
  pub id: String,
  pub filename: String,
  pub mime_type: String,
  pub size_bytes: u64,
  pub created_at: DateTime<Utc>,
  /// `None` when the sidecar is missing or unreadable.
  pub provenance: Option<Provenance>,
}

/// Writes images and their provenance sidecars to a [`Store`].
#[derive(Clone)]
pub struct ArtifactSink {
  store: Arc<dyn Store>,
}

impl ArtifactSink {
  pub fn new(store: Arc<dyn Store>) -> Self {
    Self { store }
  }

  /// Persist image bytes under a fresh time-ordered id, then write the
  /// provenance sidecar.
  ///
  /// A failed sidecar write is logged and does not undo the image write.
  pub async fn persist(
    &self,
    bytes: Bytes,
    mime_type: &str,
    provenance: &Provenance,
  ) -> Result<PersistedArtifact, Error> {
    let id = format!("{}{}", ID_PREFIX, uuid::Uuid::now_v7().simple());
    let filename = format!("{}.{}", id, mime::extension_for(mime_type));
    let size_bytes = bytes.len() as u64;

    self
      .store
      .put(&filename, byte_stream(bytes), mime_type)
      .await?;

    if let Err(e) = self.write_sidecar(&id, provenance).await {
      warn!(artifact_id = %id, error = %e, "failed to write provenance sidecar");
    }

    info!(artifact_id = %id, filename = %filename, size_bytes, "artifact persisted");

    Ok(PersistedArtifact {
      id,
      filename,
      mime_type: mime_type.to_string(),
      size_bytes,
      created_at: Utc::now(),
      provenance: Some(provenance.clone()),
    })
  }

  async fn write_sidecar(&self, id: &str, provenance: &Provenance) -> Result<(), Error> {
    let json = serde_json::to_vec_pretty(provenance)?;
    self
      .store
      .put(
        &sidecar_key(id),
        byte_stream(Bytes::from(json)),
        "application/json",
      )
      .await
  }

  /// Look up an artifact by id.
  pub async fn get(&self, id: &str) -> Result<PersistedArtifact, Error> {
    let object = self.find_image(id).await?;
    Ok(self.describe(id, object).await)
  }

  /// Read an artifact's bytes and mime type.
  pub async fn read(&self, id: &str) -> Result<(Bytes, String), Error> {
    let object = self.find_image(id).await?;
    let (_, extension) = mime::split_key(&object.key);
    let mime_type = extension
      .and_then(mime::mime_for)
      .unwrap_or("application/octet-stream")
      .to_string();
    let bytes = collect(self.store.get(&object.key).await?).await?;
    Ok((bytes, mime_type))
  }

  /// All artifacts in the store, newest first.
  pub async fn list(&self) -> Result<Vec<PersistedArtifact>, Error> {
    let mut artifacts = Vec::new();
    for object in self.store.list().await? {
      let Some(id) = image_id(&object.key).map(str::to_string) else {
        continue;
      };
      artifacts.push(self.describe(&id, object).await);
    }

    artifacts.sort_by(|a, b| {
      b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
    });
    Ok(artifacts)
  }

  async fn find_image(&self, id: &str) -> Result<ObjectMeta, Error> {
    self
      .store
      .list()
      .await?
      .into_iter()
      .find(|object| image_id(&object.key) == Some(id))
      .ok_or_else(|| Error::NotFound(id.to_string()))
  }

  async fn describe(&self, id: &str, object: ObjectMeta) -> PersistedArtifact {
    let provenance = self.read_provenance(id).await;
    let (_, extension) = mime::split_key(&object.key);
    let mime_type = extension
      .and_then(mime::mime_for)
      .unwrap_or("application/octet-stream")
      .to_string();
    let created_at = object
      .modified
      .or_else(|| provenance.as_ref().map(|p| p.executed_at))
      .unwrap_or(DateTime::UNIX_EPOCH);

    PersistedArtifact {
      id: id.to_string(),
      filename: object.key,
      mime_type,
      size_bytes: object.size,
      created_at,
      provenance,
    }
  }

  /// Missing or corrupt sidecars mean unknown provenance, not an error.
  async fn read_provenance(&self, id: &str) -> Option<Provenance> {
    let key = sidecar_key(id);
    let bytes = match self.store.get(&key).await {
      Ok(stream) => collect(stream).await.ok()?,
      Err(Error::NotFound(_)) => return None,
      Err(e) => {
        warn!(artifact_id = %id, error = %e, "failed to read provenance sidecar");
        return None;
      }
    };

    match serde_json::from_slice(&bytes) {
      Ok(provenance) => Some(provenance),
      Err(e) => {
        warn!(artifact_id = %id, error = %e, "ignoring unreadable provenance sidecar");
        None
      }
    }
  }
}

fn sidecar_key(id: &str) -> String {
  format!("{}.{}", id, SIDECAR_EXTENSION)
}

/// The artifact id for an image key, or `None` for sidecars and foreign files.
fn image_id(key: &str) -> Option<&str> {
  let (stem, extension) = mime::split_key(key);
  let extension = extension?;
  if extension.eq_ignore_ascii_case(SIDECAR_EXTENSION) || mime::mime_for(extension).is_none() {
    return None;
  }
  Some(stem)
}
