//! High-level image operations.
//!
//! These functions combine calculations with backend execution: the Resizer
//! ([`resize_to_fit`]) and the size-bounded encoder ([`encode_within_budget`]).

use super::backend::{BackendError, ImageBackend};
use super::calculations::{SizeTrend, fit_within, search_budget};
use super::params::{CompressionLevel, EncodeSetting, EncodingTarget, OutputFormat, Quality};
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::borrow::Cow;
use std::path::Path;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Downsample so the longest side fits `max_dimension`, preserving aspect ratio.
///
/// Returns the input borrowed when no resize is needed (`max_dimension == 0`
/// or the image already fits).
pub fn resize_to_fit<'a>(
    backend: &impl ImageBackend,
    image: &'a DynamicImage,
    max_dimension: u32,
) -> Cow<'a, DynamicImage> {
    match fit_within(image.dimensions(), max_dimension) {
        Some((width, height)) => Cow::Owned(backend.resize(image, width, height)),
        None => Cow::Borrowed(image),
    }
}

/// Output of a size-bounded encode.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    /// The quality or level that produced `bytes`.
    pub setting: EncodeSetting,
    pub width: u32,
    pub height: u32,
    /// `false` when nothing fit and `bytes` is the most aggressive probe.
    pub within_budget: bool,
}

impl EncodedImage {
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Encode `image` at the best quality whose output fits `target.max_bytes`.
///
/// The image is first passed through [`resize_to_fit`]. JPEG searches quality
/// 1–95 (higher = larger); PNG searches compression level 0–9 (higher =
/// smaller). When no setting fits, the last probe is returned with
/// `within_budget == false` instead of failing.
pub fn encode_within_budget(
    backend: &impl ImageBackend,
    image: &DynamicImage,
    target: &EncodingTarget,
    format: OutputFormat,
) -> Result<EncodedImage> {
    let resized = resize_to_fit(backend, image, target.max_dimension);
    let (width, height) = resized.dimensions();

    let (range, trend) = search_space(format);

    let outcome = search_budget(range, trend, target.max_bytes, |knob| {
        let bytes = backend.encode(&resized, setting_for(format, knob))?;
        let size = bytes.len() as u64;
        Ok::<_, BackendError>((bytes, size))
    })?
    .ok_or_else(|| BackendError::ProcessingFailed("Empty encoder search range".into()))?;

    let within_budget = outcome.fits();
    let probe = outcome.into_probe();

    Ok(EncodedImage {
        bytes: probe.output,
        format,
        setting: setting_for(format, probe.knob),
        width,
        height,
        within_budget,
    })
}

fn search_space(format: OutputFormat) -> ((u8, u8), SizeTrend) {
    match format {
        OutputFormat::Jpeg => ((Quality::MIN, Quality::MAX), SizeTrend::GrowsWithKnob),
        OutputFormat::Png => (
            (CompressionLevel::MIN, CompressionLevel::MAX),
            SizeTrend::ShrinksWithKnob,
        ),
    }
}

fn setting_for(format: OutputFormat, knob: u8) -> EncodeSetting {
    match format {
        OutputFormat::Jpeg => EncodeSetting::Quality(Quality::new(knob)),
        OutputFormat::Png => EncodeSetting::Level(CompressionLevel::new(knob)),
    }
}

/// Decode a file and re-encode it within the target budget.
///
/// PNG sources are re-encoded as PNG; every other format becomes JPEG.
pub fn shrink_file(
    backend: &impl ImageBackend,
    path: &Path,
    target: &EncodingTarget,
) -> Result<EncodedImage> {
    let format = ImageFormat::from_path(path)
        .map(OutputFormat::for_source)
        .unwrap_or(OutputFormat::Jpeg);
    let image = backend.decode(path)?;
    encode_within_budget(backend, &image, target, format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::imaging::{Dimensions, RustBackend};
    use image::{Rgb, RgbImage};

    /// 150 000 bytes at q80, 210 000 at q81, linear steps elsewhere.
    fn cliff_model(setting: EncodeSetting, _dims: Dimensions) -> usize {
        match setting {
            EncodeSetting::Quality(q) => {
                let q = q.value() as usize;
                if q <= 80 {
                    150_000 - (80 - q) * 1_000
                } else {
                    210_000 + (q - 81) * 1_000
                }
            }
            EncodeSetting::Level(l) => 100_000 - l.value() as usize * 5_000,
        }
    }

    // =========================================================================
    // Resizer
    // =========================================================================

    #[test]
    fn resize_noop_when_unbounded() {
        let backend = MockBackend::new(1, 1, |_, _| 0);
        let img = DynamicImage::new_rgb8(4000, 3000);
        let out = resize_to_fit(&backend, &img, 0);
        assert!(matches!(out, Cow::Borrowed(_)));
        assert!(backend.get_operations().is_empty());
    }

    #[test]
    fn resize_noop_when_already_fits() {
        let backend = MockBackend::new(1, 1, |_, _| 0);
        let img = DynamicImage::new_rgb8(800, 600);
        let out = resize_to_fit(&backend, &img, 800);
        assert!(matches!(out, Cow::Borrowed(_)));
    }

    #[test]
    fn resize_scales_longest_side_to_bound() {
        let backend = MockBackend::new(1, 1, |_, _| 0);
        let img = DynamicImage::new_rgb8(3000, 4000);
        let out = resize_to_fit(&backend, &img, 1080);
        assert_eq!(out.dimensions(), (810, 1080));
        assert_eq!(
            backend.get_operations(),
            vec![RecordedOp::Resize {
                width: 810,
                height: 1080
            }]
        );
    }

    // =========================================================================
    // Size-bounded encoder (mock sizes)
    // =========================================================================

    #[test]
    fn jpeg_budget_picks_quality_80_below_cliff() {
        let backend = MockBackend::new(100, 100, cliff_model);
        let img = DynamicImage::new_rgb8(100, 100);
        let target = EncodingTarget::new(200_000, 0);

        let encoded = encode_within_budget(&backend, &img, &target, OutputFormat::Jpeg).unwrap();

        assert!(encoded.within_budget);
        assert_eq!(encoded.len(), 150_000);
        assert_eq!(encoded.setting, EncodeSetting::Quality(Quality::new(80)));
    }

    #[test]
    fn jpeg_budget_measures_actual_bytes_per_probe() {
        let backend = MockBackend::new(100, 100, cliff_model);
        let img = DynamicImage::new_rgb8(100, 100);
        let target = EncodingTarget::new(200_000, 0);
        encode_within_budget(&backend, &img, &target, OutputFormat::Jpeg).unwrap();

        let knobs: Vec<u8> = backend
            .encoded_settings()
            .into_iter()
            .map(|s| match s {
                EncodeSetting::Quality(q) => q.value(),
                EncodeSetting::Level(_) => panic!("unexpected level probe"),
            })
            .collect();
        assert_eq!(knobs, vec![48, 72, 84, 78, 81, 79, 80]);
    }

    #[test]
    fn png_budget_picks_least_compression_that_fits() {
        let backend = MockBackend::new(100, 100, cliff_model);
        let img = DynamicImage::new_rgb8(100, 100);
        // Level L → 100 000 − 5 000·L; 82 000 first fits at L=4 (80 000).
        let target = EncodingTarget::new(82_000, 0);

        let encoded = encode_within_budget(&backend, &img, &target, OutputFormat::Png).unwrap();

        assert!(encoded.within_budget);
        assert_eq!(encoded.setting, EncodeSetting::Level(CompressionLevel::new(4)));
        assert_eq!(encoded.len(), 80_000);
    }

    #[test]
    fn over_budget_returns_most_aggressive_probe() {
        let backend = MockBackend::new(100, 100, cliff_model);
        let img = DynamicImage::new_rgb8(100, 100);
        let target = EncodingTarget::new(1_000, 0);

        let jpeg = encode_within_budget(&backend, &img, &target, OutputFormat::Jpeg).unwrap();
        assert!(!jpeg.within_budget);
        assert_eq!(jpeg.setting, EncodeSetting::Quality(Quality::new(1)));

        let png = encode_within_budget(&backend, &img, &target, OutputFormat::Png).unwrap();
        assert!(!png.within_budget);
        assert_eq!(png.setting, EncodeSetting::Level(CompressionLevel::new(9)));
    }

    #[test]
    fn encoder_resizes_before_probing() {
        // Size proportional to pixel count: the search must see the resized image.
        let backend = MockBackend::new(1, 1, |_, dims| (dims.width * dims.height) as usize);
        let img = DynamicImage::new_rgb8(2000, 1000);
        let target = EncodingTarget::new(1_000_000, 1000);

        let encoded = encode_within_budget(&backend, &img, &target, OutputFormat::Jpeg).unwrap();

        assert_eq!((encoded.width, encoded.height), (1000, 500));
        assert_eq!(encoded.len(), 500_000);
        let ops = backend.get_operations();
        assert!(matches!(ops[0], RecordedOp::Resize { width: 1000, height: 500 }));
    }

    #[test]
    fn larger_budget_never_lowers_chosen_quality() {
        let model = |setting: EncodeSetting, _: Dimensions| match setting {
            EncodeSetting::Quality(q) => 5_000 + (q.value() as usize).pow(2) * 20,
            EncodeSetting::Level(_) => 0,
        };
        let img = DynamicImage::new_rgb8(10, 10);
        let mut previous = 0;
        for budget in (4_000..200_000).step_by(3_000) {
            let backend = MockBackend::new(10, 10, model);
            let target = EncodingTarget::new(budget, 0);
            let encoded =
                encode_within_budget(&backend, &img, &target, OutputFormat::Jpeg).unwrap();
            let EncodeSetting::Quality(q) = encoded.setting else {
                panic!("expected quality setting");
            };
            assert!(q.value() >= previous);
            previous = q.value();
        }
    }

    #[test]
    fn shrink_file_keeps_png_as_png() {
        let backend = MockBackend::new(50, 50, cliff_model);
        let target = EncodingTarget::new(90_000, 0);
        let encoded = shrink_file(&backend, Path::new("/photos/scan.png"), &target).unwrap();
        assert_eq!(encoded.format, OutputFormat::Png);

        let webp = shrink_file(&backend, Path::new("/photos/pic.webp"), &target).unwrap();
        assert_eq!(webp.format, OutputFormat::Jpeg);
    }

    // =========================================================================
    // Size-bounded encoder (real codecs)
    // =========================================================================

    fn photo_like(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            let n = (x.wrapping_mul(2_654_435_761) ^ y.wrapping_mul(97_531)) % 97;
            Rgb([
                ((x * 3 + n) % 256) as u8,
                ((y * 5 + n) % 256) as u8,
                ((x + y) % 256) as u8,
            ])
        }))
    }

    #[test]
    fn real_jpeg_fits_reachable_budget() {
        let backend = RustBackend::new();
        let img = photo_like(256, 192);
        let smallest = backend
            .encode(&img, EncodeSetting::Quality(Quality::new(1)))
            .unwrap()
            .len() as u64;
        let largest = backend
            .encode(&img, EncodeSetting::Quality(Quality::new(95)))
            .unwrap()
            .len() as u64;
        let target = EncodingTarget::new((smallest + largest) / 2, 0);

        let encoded = encode_within_budget(&backend, &img, &target, OutputFormat::Jpeg).unwrap();

        assert!(encoded.within_budget);
        assert!(encoded.len() <= target.max_bytes);
        assert!(image::load_from_memory(&encoded.bytes).is_ok());
    }

    #[test]
    fn real_png_respects_dimension_bound() {
        let backend = RustBackend::new();
        let img = photo_like(300, 120);
        let target = EncodingTarget::new(u64::MAX, 100);

        let encoded = encode_within_budget(&backend, &img, &target, OutputFormat::Png).unwrap();

        let decoded = image::load_from_memory(&encoded.bytes).unwrap();
        assert_eq!(decoded.dimensions(), (100, 40));
        assert!(encoded.within_budget);
    }
}
