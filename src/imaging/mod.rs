//! Image re-encoding under a byte budget — pure Rust, no system codecs.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` |
//! | **Resize** | `DynamicImage::resize_exact` with `Lanczos3` |
//! | **Encode (lossy)** | `image::codecs::jpeg::JpegEncoder`, quality 1–95 |
//! | **Encode (lossless)** | `image::codecs::png::PngEncoder`, level 0–9 |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math and the budget search (unit testable)
//! - **Parameters**: Encoding knobs, output formats and the per-call target
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: Resizer and size-bounded encoder combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::fit_within;
pub use operations::{EncodedImage, encode_within_budget, resize_to_fit, shrink_file};
pub use params::{CompressionLevel, EncodeSetting, EncodingTarget, OutputFormat, Quality};
pub use rust_backend::{RustBackend, supported_input_extensions};
