//! Upload resolution against an artifact store.

use std::sync::Arc;

use async_trait::async_trait;
use pigment_artifact::{Store, collect, mime};
use tracing::debug;

use crate::{CapabilityError, ImageBlob, UploadLoader};

/// Loads uploads stored as `<upload_id>.<ext>` in a [`Store`].
///
/// Only keys with a known image extension are considered; the mime type is
/// derived from the extension.
#[derive(Clone)]
pub struct StoreUploadLoader {
  store: Arc<dyn Store>,
}

impl StoreUploadLoader {
  pub fn new(store: Arc<dyn Store>) -> Self {
    Self { store }
  }
}

#[async_trait]
impl UploadLoader for StoreUploadLoader {
  async fn load_upload(&self, upload_id: &str) -> Result<Option<ImageBlob>, CapabilityError> {
    let found = self.store.list().await?.into_iter().find_map(|object| {
      let (stem, extension) = mime::split_key(&object.key);
      let mime = extension.and_then(mime::mime_for)?;
      (stem == upload_id).then(|| (object.key.clone(), mime))
    });

    let Some((key, mime)) = found else {
      debug!(upload_id = %upload_id, "upload not found");
      return Ok(None);
    };

    match self.store.get(&key).await {
      Ok(stream) => Ok(Some(ImageBlob::new(collect(stream).await?, mime))),
      Err(pigment_artifact::Error::NotFound(_)) => Ok(None),
      Err(e) => Err(e.into()),
    }
  }
}
