//! Baseline transformer backed by the `image` crate.
//!
//! Understands the common parameter set `{toFormat, width, height,
//! quality}`. Resizing preserves aspect ratio unless both dimensions are
//! given. Decoding and encoding run on the blocking thread pool; the async
//! caller only pays for coordination.

use super::{ImageTransformer, TransformError, TransformOp};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use serde::Deserialize;
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Default JPEG quality when the request does not carry one.
const DEFAULT_JPEG_QUALITY: u8 = 75;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransformArgs {
    to_format: String,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    quality: Option<u8>,
}

/// Transformer handling resize plus jpg/png/webp re-encoding.
#[derive(Debug, Clone, Default)]
pub struct BasicTransformer;

impl BasicTransformer {
    pub fn new() -> Self {
        Self
    }
}

impl ImageTransformer for BasicTransformer {
    async fn transform(
        &self,
        source: &Path,
        operations: &[TransformOp],
        _options: &serde_json::Value,
    ) -> Result<(), TransformError> {
        let source = source.to_path_buf();
        let operations = operations.to_vec();
        tokio::task::spawn_blocking(move || {
            let image = image::open(&source).map_err(|e| TransformError::Decode(e.to_string()))?;
            for op in &operations {
                encode_one(&image, op)?;
            }
            Ok(())
        })
        .await
        .map_err(|e| TransformError::Encode(format!("transform task failed: {e}")))?
    }
}

fn encode_one(image: &DynamicImage, op: &TransformOp) -> Result<(), TransformError> {
    let args: TransformArgs = serde_json::from_value(op.args.clone())
        .map_err(|e| TransformError::BadArguments(e.to_string()))?;

    let resized = resize(image, args.width, args.height);
    debug!(
        output = %op.output_path.display(),
        format = %args.to_format,
        width = resized.width(),
        height = resized.height(),
        "encoding transform output"
    );

    if let Some(parent) = op.output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    match args.to_format.as_str() {
        "jpg" | "jpeg" => {
            let quality = args.quality.unwrap_or(DEFAULT_JPEG_QUALITY).clamp(1, 100);
            let file = std::fs::File::create(&op.output_path)?;
            let mut writer = std::io::BufWriter::new(file);
            let encoder = JpegEncoder::new_with_quality(&mut writer, quality);
            // JPEG has no alpha channel.
            DynamicImage::ImageRgb8(resized.to_rgb8())
                .write_with_encoder(encoder)
                .map_err(|e| TransformError::Encode(e.to_string()))?;
            writer.flush()?;
            Ok(())
        }
        "png" => resized
            .save_with_format(&op.output_path, ImageFormat::Png)
            .map_err(|e| TransformError::Encode(e.to_string())),
        "webp" => resized
            .save_with_format(&op.output_path, ImageFormat::WebP)
            .map_err(|e| TransformError::Encode(e.to_string())),
        other => Err(TransformError::UnsupportedFormat(other.to_string())),
    }
}

fn resize(image: &DynamicImage, width: Option<u32>, height: Option<u32>) -> DynamicImage {
    match (width, height) {
        (Some(w), Some(h)) => image.resize_exact(w, h, FilterType::Lanczos3),
        (Some(w), None) => image.resize(w, u32::MAX, FilterType::Lanczos3),
        (None, Some(h)) => image.resize(u32::MAX, h, FilterType::Lanczos3),
        (None, None) => image.clone(),
    }
}
