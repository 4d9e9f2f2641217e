//! Parameter types for encoding operations.
//!
//! These types describe *what* to produce, not *how*. The
//! [`operations`](super::operations) module searches over them and the
//! [`backend`](super::backend) turns a single setting into bytes.
//!
//! ## Types
//!
//! - [`Quality`] — Lossy encoding quality (1–95). Clamped on construction.
//! - [`CompressionLevel`] — Lossless compression level (0–9). Higher = smaller output.
//! - [`EncodeSetting`] — One concrete knob value handed to the backend.
//! - [`OutputFormat`] — Which codec family an image is re-encoded with.
//! - [`EncodingTarget`] — Per-invocation byte budget and optional dimension bound.

use image::ImageFormat;
use std::fmt;

/// Quality setting for lossy image encoding (1-95).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quality(u8);

impl Quality {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 95;

    pub fn new(value: u8) -> Self {
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

/// Compression level for lossless encoding (0-9).
///
/// Higher levels trade encoder effort for smaller files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CompressionLevel(u8);

impl CompressionLevel {
    pub const MIN: u8 = 0;
    pub const MAX: u8 = 9;

    pub fn new(value: u8) -> Self {
        Self(value.min(Self::MAX))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

/// A single encoder configuration tried during a budget search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeSetting {
    Quality(Quality),
    Level(CompressionLevel),
}

impl fmt::Display for EncodeSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quality(q) => write!(f, "quality {}", q.value()),
            Self::Level(l) => write!(f, "level {}", l.value()),
        }
    }
}

/// Codec family used for re-encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Lossy, searched over [`Quality`].
    Jpeg,
    /// Lossless, searched over [`CompressionLevel`].
    Png,
}

impl OutputFormat {
    /// PNG sources stay PNG; everything else is re-encoded as JPEG.
    pub fn for_source(format: ImageFormat) -> Self {
        match format {
            ImageFormat::Png => Self::Png,
            _ => Self::Jpeg,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }
}

/// Byte budget and optional longest-side bound for one encode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingTarget {
    /// Maximum acceptable encoded size in bytes.
    pub max_bytes: u64,
    /// Longest-side bound in pixels; `0` leaves dimensions untouched.
    pub max_dimension: u32,
}

impl EncodingTarget {
    pub fn new(max_bytes: u64, max_dimension: u32) -> Self {
        Self {
            max_bytes,
            max_dimension,
        }
    }
}
