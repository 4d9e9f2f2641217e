//! Tag generation: the external capability that labels a media file.
//!
//! [`TagGenerator`] is the seam the batch orchestrator calls through. The
//! production implementation is [`GeminiTagger`](gemini::GeminiTagger);
//! tests use scripted stubs.
//!
//! Failures are classified so the retry policy can decide what to do:
//!
//! | Variant | Meaning | Retried |
//! |---|---|---|
//! | [`TagError::Transient`] | network, timeout, rate limit, 5xx | yes |
//! | [`TagError::Terminal`] | malformed input or response, 4xx | no |
//! | [`TagError::Io`] | media file unreadable | no |
//! | [`TagError::RetriesExhausted`] | transient failures used up the budget | — |

pub mod gemini;

use crate::config::ConfigError;
use std::path::Path;
use thiserror::Error;

pub use gemini::GeminiTagger;

/// Ordered tags for one media file. May be empty.
pub type TagRecord = Vec<String>;

#[derive(Error, Debug)]
pub enum TagError {
    #[error("Transient service error: {0}")]
    Transient(String),
    #[error("Service rejected request: {0}")]
    Terminal(String),
    #[error("Gave up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<TagError>,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TagError {
    /// Whether the failure is worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Something that can turn a media file into descriptive tags.
pub trait TagGenerator {
    /// Confirm the capability is usable before any file is touched.
    ///
    /// Called once per run. The default implementation has nothing to check.
    fn probe(&self) -> Result<(), ConfigError> {
        Ok(())
    }

    /// Generate tags for the file at `path`.
    fn generate(&self, path: &Path) -> Result<TagRecord, TagError>;
}

/// Source of the API key used by a tag generator.
pub trait CredentialProvider {
    fn api_key(&self) -> Result<String, ConfigError>;
}

/// Reads the API key from an environment variable on every request.
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    var: String,
}

impl EnvCredentials {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl CredentialProvider for EnvCredentials {
    fn api_key(&self) -> Result<String, ConfigError> {
        std::env::var(&self.var)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingCredential(self.var.clone()))
    }
}

/// Split a model reply into tags.
///
/// Accepts ASCII commas, Japanese enumeration commas (`、`) and newlines as
/// separators; trims each entry and drops empty ones, keeping order.
pub fn parse_tags(reply: &str) -> TagRecord {
    reply
        .split([',', '、', '\n'])
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

/// MIME type sent with the media bytes, from the file extension.
pub fn mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "tif" | "tiff" => "image/tiff",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}
