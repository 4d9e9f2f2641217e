//! Pure Rust image backend built on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, WebP) | `image::ImageReader` |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder::new_with_quality` |
//! | Encode → PNG | `image::codecs::png::PngEncoder::new_with_quality` |

use super::backend::{BackendError, ImageBackend};
use super::params::{CompressionLevel, EncodeSetting};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::borrow::Cow;
use std::path::Path;
use std::sync::LazyLock;

/// Input formats the shrink batch accepts.
const SHRINK_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("webp", ImageFormat::WebP),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    SHRINK_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the image file extensions that can be re-encoded.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Level 0 stores the data uncompressed; 1–9 are zlib deflate levels.
fn png_compression(level: CompressionLevel) -> CompressionType {
    match level.value() {
        0 => CompressionType::Uncompressed,
        n => CompressionType::Level(n),
    }
}

/// JPEG has no alpha channel and only 8-bit samples.
fn jpeg_compatible(image: &DynamicImage) -> Cow<'_, DynamicImage> {
    match image {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageLuma8(_) => Cow::Borrowed(image),
        other => Cow::Owned(DynamicImage::ImageRgb8(other.to_rgb8())),
    }
}

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageBackend for RustBackend {
    fn decode(&self, path: &Path) -> Result<DynamicImage, BackendError> {
        ImageReader::open(path)
            .map_err(BackendError::Io)?
            .decode()
            .map_err(|e| {
                BackendError::ProcessingFailed(format!(
                    "Failed to decode {}: {}",
                    path.display(),
                    e
                ))
            })
    }

    fn resize(&self, image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
        image.resize_exact(width, height, FilterType::Lanczos3)
    }

    fn encode(&self, image: &DynamicImage, setting: EncodeSetting) -> Result<Vec<u8>, BackendError> {
        let mut buf = Vec::new();
        match setting {
            EncodeSetting::Quality(quality) => {
                let encoder = JpegEncoder::new_with_quality(&mut buf, quality.value());
                jpeg_compatible(image).write_with_encoder(encoder)
            }
            EncodeSetting::Level(level) => {
                let encoder = PngEncoder::new_with_quality(
                    &mut buf,
                    png_compression(level),
                    PngFilter::Adaptive,
                );
                image.write_with_encoder(encoder)
            }
        }
        .map_err(|e| BackendError::ProcessingFailed(format!("Encode failed: {}", e)))?;
        Ok(buf)
    }
}
