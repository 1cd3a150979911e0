use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

use crate::{ByteStream, Error, ObjectMeta, Store};

/// Filesystem-based artifact store.
///
/// Stores artifacts as files on the local filesystem. Each artifact is stored
/// at `{base_path}/{key}`. Parent directories are created automatically.
pub struct FsStore {
  base_path: PathBuf,
}

impl FsStore {
  /// Create a new filesystem store with the given base path.
  pub fn new(base_path: impl Into<PathBuf>) -> Self {
    Self {
      base_path: base_path.into(),
    }
  }

  fn key_to_path(&self, key: &str) -> PathBuf {
    self.base_path.join(key)
  }
}

fn not_found_or_io(key: &str, e: std::io::Error) -> Error {
  if e.kind() == std::io::ErrorKind::NotFound {
    Error::NotFound(key.to_string())
  } else {
    Error::Io(e)
  }
}

#[async_trait]
impl Store for FsStore {
  async fn get(&self, key: &str) -> Result<ByteStream, Error> {
    let path = self.key_to_path(key);
    let file = File::open(&path)
      .await
      .map_err(|e| not_found_or_io(key, e))?;
    let stream = ReaderStream::new(file).map(|r| r.map_err(Error::Io));
    Ok(Box::pin(stream))
  }

  async fn put(&self, key: &str, data: ByteStream, _content_type: &str) -> Result<(), Error> {
    let path = self.key_to_path(key);

    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).await?;
    }

    let mut file = File::create(path).await?;
    let mut stream = std::pin::pin!(data);

    while let Some(chunk) = stream.next().await {
      let bytes = chunk?;
      file.write_all(&bytes).await?;
    }

    file.flush().await?;
    Ok(())
  }

  async fn delete(&self, key: &str) -> Result<(), Error> {
    let path = self.key_to_path(key);
    fs::remove_file(&path)
      .await
      .map_err(|e| not_found_or_io(key, e))
  }

  async fn list(&self) -> Result<Vec<ObjectMeta>, Error> {
    let mut entries = match fs::read_dir(&self.base_path).await {
      Ok(entries) => entries,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(e) => return Err(Error::Io(e)),
    };

    let mut objects = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
      let metadata = entry.metadata().await?;
      if !metadata.is_file() {
        continue;
      }
      let Some(key) = entry.file_name().to_str().map(str::to_string) else {
        continue;
      };
      objects.push(ObjectMeta {
        key,
        size: metadata.len(),
        modified: metadata.modified().ok().map(DateTime::<Utc>::from),
      });
    }

    objects.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(objects)
  }
}
