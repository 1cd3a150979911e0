//! Integration tests for ArtifactSink over a filesystem store.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use pigment_artifact::{
  ArtifactSink, ByteStream, Error, FsStore, ObjectMeta, Provenance, Store, byte_stream,
};
use pigment_config::{Edge, GeneratorConfig, NodeDef, NodeType};
use serde_json::json;

fn provenance(template_id: Option<&str>) -> Provenance {
  Provenance {
    nodes: vec![NodeDef::new(
      "G1",
      NodeType::Generator(GeneratorConfig {
        generator_name: "solidColor".to_string(),
        params: json!({ "color": "#00ff00" }),
      }),
    )],
    edges: vec![Edge::new("G1", "S1")],
    executed_at: Utc::now(),
    template_id: template_id.map(str::to_string),
  }
}

/// Filesystem store whose JSON writes always fail.
struct NoSidecarStore {
  inner: FsStore,
}

#[async_trait]
impl Store for NoSidecarStore {
  async fn get(&self, key: &str) -> Result<ByteStream, Error> {
    self.inner.get(key).await
  }

  async fn put(&self, key: &str, data: ByteStream, content_type: &str) -> Result<(), Error> {
    if key.ends_with(".json") {
      return Err(Error::Io(std::io::Error::other("disk full")));
    }
    self.inner.put(key, data, content_type).await
  }

  async fn delete(&self, key: &str) -> Result<(), Error> {
    self.inner.delete(key).await
  }

  async fn list(&self) -> Result<Vec<ObjectMeta>, Error> {
    self.inner.list().await
  }
}

#[tokio::test]
async fn test_persist_writes_image_and_sidecar() {
  let dir = tempfile::tempdir().unwrap();
  let sink = ArtifactSink::new(Arc::new(FsStore::new(dir.path())));

  let artifact = sink
    .persist(Bytes::from_static(b"<svg/>"), "image/svg+xml", &provenance(Some("qr-basic")))
    .await
    .unwrap();

  assert!(artifact.id.starts_with("img_"));
  assert_eq!(artifact.filename, format!("{}.svg", artifact.id));
  assert_eq!(artifact.size_bytes, 6);

  let image = std::fs::read(dir.path().join(&artifact.filename)).unwrap();
  assert_eq!(image, b"<svg/>");

  let sidecar: serde_json::Value = serde_json::from_slice(
    &std::fs::read(dir.path().join(format!("{}.json", artifact.id))).unwrap(),
  )
  .unwrap();
  assert_eq!(sidecar["templateId"], "qr-basic");
  assert_eq!(sidecar["nodes"][0]["id"], "G1");
  assert_eq!(sidecar["edges"][0]["target"], "S1");
  assert!(sidecar["executedAt"].is_string());
}

#[tokio::test]
async fn test_unknown_mime_defaults_to_png_extension() {
  let dir = tempfile::tempdir().unwrap();
  let sink = ArtifactSink::new(Arc::new(FsStore::new(dir.path())));

  let artifact = sink
    .persist(Bytes::from_static(b"raw"), "image/x-weird", &provenance(None))
    .await
    .unwrap();

  assert!(artifact.filename.ends_with(".png"));
}

#[tokio::test]
async fn test_ids_are_unique_and_time_ordered() {
  let dir = tempfile::tempdir().unwrap();
  let sink = ArtifactSink::new(Arc::new(FsStore::new(dir.path())));

  let first = sink
    .persist(Bytes::from_static(b"1"), "image/png", &provenance(None))
    .await
    .unwrap();
  let second = sink
    .persist(Bytes::from_static(b"2"), "image/png", &provenance(None))
    .await
    .unwrap();

  assert_ne!(first.id, second.id);
  assert!(first.id < second.id);
}

#[tokio::test]
async fn test_get_and_read_round_trip_metadata() {
  let dir = tempfile::tempdir().unwrap();
  let sink = ArtifactSink::new(Arc::new(FsStore::new(dir.path())));

  let stored = sink
    .persist(Bytes::from_static(b"jpegdata"), "image/jpeg", &provenance(None))
    .await
    .unwrap();

  let fetched = sink.get(&stored.id).await.unwrap();
  assert_eq!(fetched.id, stored.id);
  assert_eq!(fetched.mime_type, "image/jpeg");
  assert_eq!(fetched.size_bytes, 8);
  assert_eq!(fetched.provenance.unwrap().nodes[0].id, "G1");

  let (bytes, mime) = sink.read(&stored.id).await.unwrap();
  assert_eq!(&bytes[..], b"jpegdata");
  assert_eq!(mime, "image/jpeg");
}

#[tokio::test]
async fn test_missing_sidecar_means_unknown_provenance() {
  let dir = tempfile::tempdir().unwrap();
  let store = Arc::new(FsStore::new(dir.path()));
  store
    .put("img_legacy.png", byte_stream(Bytes::from_static(b"old")), "image/png")
    .await
    .unwrap();
  store
    .put("img_broken.png", byte_stream(Bytes::from_static(b"old")), "image/png")
    .await
    .unwrap();
  store
    .put("img_broken.json", byte_stream(Bytes::from_static(b"{not json")), "application/json")
    .await
    .unwrap();

  let sink = ArtifactSink::new(store);

  let legacy = sink.get("img_legacy").await.unwrap();
  assert!(legacy.provenance.is_none());
  assert_eq!(legacy.mime_type, "image/png");

  let broken = sink.get("img_broken").await.unwrap();
  assert!(broken.provenance.is_none());
}

#[tokio::test]
async fn test_get_unknown_id_is_not_found() {
  let dir = tempfile::tempdir().unwrap();
  let sink = ArtifactSink::new(Arc::new(FsStore::new(dir.path())));

  assert!(matches!(sink.get("img_nope").await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_list_skips_sidecars() {
  let dir = tempfile::tempdir().unwrap();
  let sink = ArtifactSink::new(Arc::new(FsStore::new(dir.path())));

  for _ in 0..3 {
    sink
      .persist(Bytes::from_static(b"x"), "image/png", &provenance(None))
      .await
      .unwrap();
  }

  let listed = sink.list().await.unwrap();
  assert_eq!(listed.len(), 3);
  assert!(listed.iter().all(|a| a.filename.ends_with(".png")));
  assert!(listed.iter().all(|a| a.provenance.is_some()));
}

#[tokio::test]
async fn test_sidecar_failure_keeps_image() {
  let dir = tempfile::tempdir().unwrap();
  let sink = ArtifactSink::new(Arc::new(NoSidecarStore {
    inner: FsStore::new(dir.path()),
  }));

  let artifact = sink
    .persist(Bytes::from_static(b"png"), "image/png", &provenance(None))
    .await
    .unwrap();

  assert!(dir.path().join(&artifact.filename).exists());
  assert!(!dir.path().join(format!("{}.json", artifact.id)).exists());

  let fetched = sink.get(&artifact.id).await.unwrap();
  assert!(fetched.provenance.is_none());
  assert_eq!(fetched.size_bytes, 3);
}
