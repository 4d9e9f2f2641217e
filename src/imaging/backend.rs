//! Image backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three primitives the budget search
//! needs: decode, resize, and encode-to-memory. Encoding returns bytes rather
//! than writing a file so the search can measure each probe's real size.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate. Tests use a mock that fabricates sizes from a formula.

use super::params::EncodeSetting;
use image::DynamicImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
pub trait ImageBackend {
    /// Decode an image file into memory.
    fn decode(&self, path: &Path) -> Result<DynamicImage, BackendError>;

    /// Resample to exact dimensions (aspect handling is the caller's job).
    fn resize(&self, image: &DynamicImage, width: u32, height: u32) -> DynamicImage;

    /// Encode with a single setting and return the produced bytes.
    fn encode(&self, image: &DynamicImage, setting: EncodeSetting) -> Result<Vec<u8>, BackendError>;
}
