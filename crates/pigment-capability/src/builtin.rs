//! Local capability provider backed by the `image` crate.
//!
//! Generators: `solidColor`.
//! Transforms: `resize`, `grayscale`, `blur`, `negate`, `convert`.
//! Vision and text providers are not built in. Widths and heights are
//! capped at [`MAX_DIMENSION`].

use std::io::Cursor;
use std::path::Path;

use async_trait::async_trait;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use pigment_config::SaveProvider;
use tracing::debug;

use crate::{
  Capabilities, CapabilityError, CapabilityProvider, DataOutput, ImageBlob, NodeSchema, ParamField,
  ParamSchema, ParamType,
};

const DEFAULT_SIZE: u32 = 256;
/// Largest width or height the provider will allocate.
pub const MAX_DIMENSION: u32 = 8192;
const DEFAULT_COLOR: &str = "#ffffff";
const DEFAULT_BLUR_SIGMA: f32 = 1.0;

/// A provider that runs everything in-process.
#[derive(Debug, Clone, Default)]
pub struct BuiltinProvider;

impl BuiltinProvider {
  pub fn new() -> Self {
    Self
  }
}

#[async_trait]
impl CapabilityProvider for BuiltinProvider {
  fn capabilities(&self) -> Capabilities {
    let dimension = |title: &str| {
      ParamField::new(ParamType::Integer, title).with_range(1.0, f64::from(MAX_DIMENSION))
    };

    Capabilities {
      generators: vec![NodeSchema::new(
        "solidColor",
        "Solid color image",
        "Basic",
        ParamSchema::new()
          .field("width", dimension("Width").with_default(DEFAULT_SIZE))
          .field("height", dimension("Height").with_default(DEFAULT_SIZE))
          .field(
            "color",
            ParamField::new(ParamType::String, "Color")
              .with_description("#rrggbb or #rrggbbaa")
              .with_default(DEFAULT_COLOR),
          ),
      )],
      transforms: vec![
        NodeSchema::new(
          "resize",
          "Resize, keeping the aspect ratio when only one side is given",
          "Size",
          ParamSchema::new()
            .field("width", dimension("Width"))
            .field("height", dimension("Height")),
        ),
        NodeSchema::new("grayscale", "Convert to grayscale", "Color", ParamSchema::new()),
        NodeSchema::new(
          "blur",
          "Gaussian blur",
          "Effects",
          ParamSchema::new().field(
            "sigma",
            ParamField::new(ParamType::Number, "Sigma").with_default(f64::from(DEFAULT_BLUR_SIGMA)),
          ),
        ),
        NodeSchema::new("negate", "Invert colors", "Color", ParamSchema::new()),
        NodeSchema::new(
          "convert",
          "Re-encode in another format",
          "Format",
          ParamSchema::new().required_field(
            "to",
            ParamField::new(ParamType::String, "Target format")
              .with_allowed(["image/png", "image/jpeg"]),
          ),
        ),
      ],
    }
  }

  async fn generate(
    &self,
    generator: &str,
    params: &serde_json::Value,
  ) -> Result<ImageBlob, CapabilityError> {
    match generator {
      "solidColor" => {
        let width = dimension_param(params, "width")?.unwrap_or(DEFAULT_SIZE);
        let height = dimension_param(params, "height")?.unwrap_or(DEFAULT_SIZE);
        let color = parse_color(str_param(params, "color")?.unwrap_or(DEFAULT_COLOR))?;
        debug!(width, height, "generating solid color image");

        run_blocking(move || {
          let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, color));
          encode(&image, ImageFormat::Png)
        })
        .await
      }
      other => Err(CapabilityError::UnknownGenerator(other.to_string())),
    }
  }

  async fn transform(
    &self,
    image: &ImageBlob,
    op: &str,
    to: Option<&str>,
    params: &serde_json::Value,
  ) -> Result<ImageBlob, CapabilityError> {
    let operation = Operation::parse(op, to, params)?;
    let input = image.clone();

    run_blocking(move || {
      let decoded = image::load_from_memory(&input.bytes)?;
      let format = operation.output_format(&input.mime);
      let output = operation.apply(decoded)?;
      encode(&output, format)
    })
    .await
  }

  async fn save(
    &self,
    image: &ImageBlob,
    destination: &str,
    provider: Option<SaveProvider>,
  ) -> Result<(), CapabilityError> {
    if let Some(SaveProvider::S3) = provider {
      return Err(CapabilityError::ProviderUnavailable("s3".to_string()));
    }

    let path = Path::new(destination);
    if let Some(parent) = path.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, &image.bytes).await?;
    Ok(())
  }

  async fn analyze_image(
    &self,
    provider: &str,
    _image: &ImageBlob,
    _params: &serde_json::Value,
  ) -> Result<DataOutput, CapabilityError> {
    Err(CapabilityError::ProviderUnavailable(provider.to_string()))
  }

  async fn generate_text(
    &self,
    provider: &str,
    _params: &serde_json::Value,
  ) -> Result<DataOutput, CapabilityError> {
    Err(CapabilityError::ProviderUnavailable(provider.to_string()))
  }
}

enum Operation {
  Resize {
    width: Option<u32>,
    height: Option<u32>,
  },
  Grayscale,
  Blur(f32),
  Negate,
  Convert(ImageFormat),
}

impl Operation {
  fn parse(op: &str, to: Option<&str>, params: &serde_json::Value) -> Result<Self, CapabilityError> {
    match op {
      "resize" => {
        let width = dimension_param(params, "width")?;
        let height = dimension_param(params, "height")?;
        if width.is_none() && height.is_none() {
          return Err(CapabilityError::invalid_param(
            "width",
            "resize needs a width or a height",
          ));
        }
        Ok(Self::Resize { width, height })
      }
      "grayscale" => Ok(Self::Grayscale),
      "blur" => {
        let sigma = params
          .get("sigma")
          .and_then(|v| v.as_f64())
          .map(|v| v as f32)
          .unwrap_or(DEFAULT_BLUR_SIGMA);
        Ok(Self::Blur(sigma))
      }
      "negate" => Ok(Self::Negate),
      "convert" => {
        let target = to.ok_or_else(|| CapabilityError::invalid_param("to", "missing target format"))?;
        let format = format_for_mime(target)
          .ok_or_else(|| CapabilityError::invalid_param("to", format!("cannot convert to {target}")))?;
        Ok(Self::Convert(format))
      }
      other => Err(CapabilityError::UnsupportedOperation(other.to_string())),
    }
  }

  fn output_format(&self, input_mime: &str) -> ImageFormat {
    match self {
      Self::Convert(format) => *format,
      _ => format_for_mime(input_mime).unwrap_or(ImageFormat::Png),
    }
  }

  fn apply(self, image: DynamicImage) -> Result<DynamicImage, CapabilityError> {
    Ok(match self {
      Self::Resize { width, height } => {
        let (w, h) = fit(image.width(), image.height(), width, height)?;
        image.resize_exact(w, h, FilterType::Lanczos3)
      }
      Self::Grayscale => image.grayscale(),
      Self::Blur(sigma) => image.blur(sigma),
      Self::Negate => {
        let mut image = image;
        image.invert();
        image
      }
      Self::Convert(_) => image,
    })
  }
}

/// Target size, keeping the aspect ratio when only one side is given.
///
/// Fails when the derived side would exceed [`MAX_DIMENSION`].
fn fit(
  src_w: u32,
  src_h: u32,
  width: Option<u32>,
  height: Option<u32>,
) -> Result<(u32, u32), CapabilityError> {
  let scale = |value: u32, num: u32, den: u32, name: &str| {
    let scaled = (u64::from(value) * u64::from(num)) / u64::from(den.max(1));
    u32::try_from(scaled.max(1))
      .ok()
      .filter(|side| *side <= MAX_DIMENSION)
      .ok_or_else(|| too_large(name))
  };
  match (width, height) {
    (Some(w), Some(h)) => Ok((w, h)),
    (Some(w), None) => Ok((w, scale(src_h, w, src_w, "height")?)),
    (None, Some(h)) => Ok((scale(src_w, h, src_h, "width")?, h)),
    (None, None) => Ok((src_w, src_h)),
  }
}

fn too_large(name: &str) -> CapabilityError {
  CapabilityError::invalid_param(name, format!("must be at most {MAX_DIMENSION} pixels"))
}

fn format_for_mime(mime: &str) -> Option<ImageFormat> {
  match mime {
    "image/png" | "png" => Some(ImageFormat::Png),
    "image/jpeg" | "jpeg" | "jpg" => Some(ImageFormat::Jpeg),
    _ => None,
  }
}

fn encode(image: &DynamicImage, format: ImageFormat) -> Result<ImageBlob, CapabilityError> {
  let mut buf = Vec::new();
  match format {
    // JPEG has no alpha channel.
    ImageFormat::Jpeg => {
      DynamicImage::ImageRgb8(image.to_rgb8()).write_to(&mut Cursor::new(&mut buf), format)?
    }
    _ => image.write_to(&mut Cursor::new(&mut buf), format)?,
  }
  Ok(ImageBlob::new(buf, format.to_mime_type()))
}

async fn run_blocking<F>(f: F) -> Result<ImageBlob, CapabilityError>
where
  F: FnOnce() -> Result<ImageBlob, CapabilityError> + Send + 'static,
{
  tokio::task::spawn_blocking(f)
    .await
    .map_err(|e| CapabilityError::Failed(format!("image task failed: {e}")))?
}

fn u32_param(params: &serde_json::Value, name: &str) -> Result<Option<u32>, CapabilityError> {
  match params.get(name) {
    None | Some(serde_json::Value::Null) => Ok(None),
    Some(value) => value
      .as_u64()
      .and_then(|v| u32::try_from(v).ok())
      .filter(|v| *v > 0)
      .map(Some)
      .ok_or_else(|| CapabilityError::invalid_param(name, "expected a positive integer")),
  }
}

/// A width or height, capped at [`MAX_DIMENSION`].
fn dimension_param(params: &serde_json::Value, name: &str) -> Result<Option<u32>, CapabilityError> {
  match u32_param(params, name)? {
    Some(side) if side > MAX_DIMENSION => Err(too_large(name)),
    side => Ok(side),
  }
}

fn str_param<'a>(
  params: &'a serde_json::Value,
  name: &str,
) -> Result<Option<&'a str>, CapabilityError> {
  match params.get(name) {
    None | Some(serde_json::Value::Null) => Ok(None),
    Some(value) => value
      .as_str()
      .map(Some)
      .ok_or_else(|| CapabilityError::invalid_param(name, "expected a string")),
  }
}

/// Parse `#rrggbb` or `#rrggbbaa`.
fn parse_color(value: &str) -> Result<Rgba<u8>, CapabilityError> {
  let invalid = || CapabilityError::invalid_param("color", format!("expected #rrggbb, got {value}"));
  let hex = value.strip_prefix('#').ok_or_else(invalid)?;
  if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
    return Err(invalid());
  }

  let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
  let alpha = if hex.len() == 8 { channel(6)? } else { 255 };
  Ok(Rgba([channel(0)?, channel(2)?, channel(4)?, alpha]))
}
