//! Mime type and file extension tables for image artifacts.

/// Extension used when a mime type is not in the table.
pub const DEFAULT_EXTENSION: &str = "png";

const MIME_TO_EXT: &[(&str, &str)] = &[
  ("image/svg+xml", "svg"),
  ("image/png", "png"),
  ("image/jpeg", "jpg"),
  ("image/webp", "webp"),
  ("image/avif", "avif"),
  ("image/gif", "gif"),
];

/// File extension for a mime type, falling back to [`DEFAULT_EXTENSION`].
pub fn extension_for(mime: &str) -> &'static str {
  MIME_TO_EXT
    .iter()
    .find(|(m, _)| m.eq_ignore_ascii_case(mime))
    .map(|(_, ext)| *ext)
    .unwrap_or(DEFAULT_EXTENSION)
}

/// Mime type for a file extension (without the dot), if it is a known image
/// extension.
pub fn mime_for(extension: &str) -> Option<&'static str> {
  let extension = extension.to_ascii_lowercase();
  let extension = if extension == "jpeg" { "jpg" } else { extension.as_str() };
  MIME_TO_EXT
    .iter()
    .find(|(_, ext)| *ext == extension)
    .map(|(mime, _)| *mime)
}

/// Split `key` into `(stem, extension)` at the last dot.
pub fn split_key(key: &str) -> (&str, Option<&str>) {
  match key.rsplit_once('.') {
    Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
    _ => (key, None),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_known_and_unknown_mimes() {
    assert_eq!(extension_for("image/svg+xml"), "svg");
    assert_eq!(extension_for("image/jpeg"), "jpg");
    assert_eq!(extension_for("image/x-unknown"), "png");
  }

  #[test]
  fn test_mime_for_extension() {
    assert_eq!(mime_for("JPEG"), Some("image/jpeg"));
    assert_eq!(mime_for("jpg"), Some("image/jpeg"));
    assert_eq!(mime_for("webp"), Some("image/webp"));
    assert_eq!(mime_for("json"), None);
  }

  #[test]
  fn test_split_key() {
    assert_eq!(split_key("img_1.png"), ("img_1", Some("png")));
    assert_eq!(split_key("noext"), ("noext", None));
    assert_eq!(split_key(".hidden"), (".hidden", None));
  }
}
