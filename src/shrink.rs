//! Batch re-encoding of a folder to a byte budget.
//!
//! Walks a folder recursively (sorted, symlinks not followed) and runs each
//! supported image through [`shrink_file`]: resize to the optional dimension
//! bound, then search for the best setting that fits the budget.
//!
//! ## Output placement
//!
//! | Mode | Destination |
//! |---|---|
//! | in place (default) | the source path |
//! | `--output DIR` | `DIR/<path relative to folder>`, parents created |
//! | `--dry-run` | nothing written, sizes reported |
//!
//! The destination keeps the source name unless the codec family changes
//! (for example a WebP source re-encoded as JPEG), in which case the
//! extension follows the written format. An in-place run never deletes a
//! source whose extension changes, and a renamed result that would land on
//! another file of the folder (`a.webp` next to `a.jpg`) is skipped rather
//! than written. Files are replaced through a temporary sibling and a rename.

use crate::imaging::{
    BackendError, EncodingTarget, ImageBackend, OutputFormat, shrink_file,
    supported_input_extensions,
};
use crate::metadata::write_replacing;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ShrinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("{0}")]
    Backend(#[from] BackendError),
    #[error("Invalid size {0:?}: expected a positive number with optional B, KB or MB suffix")]
    InvalidSize(String),
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Parse a human size such as `200KB`, `1.5MB`, `512B` or `1000` into bytes.
///
/// Units are binary (`KB` = 1024, `MB` = 1024²) and case-insensitive. Zero and
/// malformed values are rejected.
pub fn parse_size(input: &str) -> Result<u64, ShrinkError> {
    let invalid = || ShrinkError::InvalidSize(input.to_string());
    let upper = input.trim().to_ascii_uppercase();
    let (number, multiplier) = if let Some(n) = upper.strip_suffix("MB") {
        (n, 1024.0 * 1024.0)
    } else if let Some(n) = upper.strip_suffix("KB") {
        (n, 1024.0)
    } else if let Some(n) = upper.strip_suffix('B') {
        (n, 1.0)
    } else {
        (upper.as_str(), 1.0)
    };
    let value: f64 = number.trim().parse().map_err(|_| invalid())?;
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid());
    }
    let bytes = (value * multiplier).round();
    if bytes < 1.0 || bytes > u64::MAX as f64 {
        return Err(invalid());
    }
    Ok(bytes as u64)
}

#[derive(Debug, Clone)]
pub struct ShrinkOptions {
    pub target: EncodingTarget,
    /// Mirror results under this directory instead of overwriting sources.
    pub output_dir: Option<PathBuf>,
    pub dry_run: bool,
}

/// Per-file progress.
#[derive(Debug, Clone, PartialEq)]
pub enum ShrinkEvent {
    Encoded {
        source: String,
        destination: Option<PathBuf>,
        original_bytes: u64,
        bytes: u64,
        setting: String,
        within_budget: bool,
    },
    Skipped { source: String, reason: String },
    Failed { source: String, error: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShrinkSummary {
    /// Files written (or that would be written in a dry run).
    pub written: usize,
    pub skipped: usize,
    /// Encoded files that could not reach the budget.
    pub over_budget: usize,
    pub failed: usize,
}

/// Re-encode every supported image under `folder`.
///
/// Only a missing or unreadable `folder` is an error. Unreadable subtrees and
/// per-file problems are reported as events and the batch carries on.
pub fn shrink_tree(
    backend: &impl ImageBackend,
    folder: &Path,
    options: &ShrinkOptions,
    events: Option<Sender<ShrinkEvent>>,
) -> Result<ShrinkSummary, ShrinkError> {
    if !folder.is_dir() {
        return Err(ShrinkError::NotADirectory(folder.to_path_buf()));
    }
    let emit = |event: ShrinkEvent| {
        if let Some(tx) = &events {
            let _ = tx.send(event);
        }
    };
    let label_for = |path: &Path| path.strip_prefix(folder).unwrap_or(path).display().to_string();

    let mut summary = ShrinkSummary::default();

    // Collect first so files written under an output dir inside the folder
    // are never picked up again.
    let output_dir = options.output_dir.as_deref();
    let mut sources = Vec::new();
    for entry in WalkDir::new(folder)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| Some(e.path()) != output_dir)
    {
        match entry {
            Ok(entry) if entry.file_type().is_file() => sources.push(entry.into_path()),
            Ok(_) => {}
            Err(err) if err.depth() == 0 => return Err(err.into()),
            Err(err) => {
                let label = err.path().map(label_for).unwrap_or_default();
                warn!(path = %label, error = %err, "skipping unreadable part of the folder");
                emit(ShrinkEvent::Failed {
                    source: label,
                    error: err.to_string(),
                });
                summary.failed += 1;
            }
        }
    }
    let planned: HashSet<&Path> = sources.iter().map(PathBuf::as_path).collect();

    for source in &sources {
        let label = label_for(source.as_path());

        if !is_supported(source) {
            debug!(file = %label, "not a supported image");
            emit(ShrinkEvent::Skipped {
                source: label,
                reason: "unsupported format".into(),
            });
            summary.skipped += 1;
            continue;
        }

        match shrink_one(backend, folder, source, &label, options, &planned) {
            Ok(event) => {
                match &event {
                    ShrinkEvent::Encoded { within_budget, .. } => {
                        summary.written += 1;
                        if !within_budget {
                            summary.over_budget += 1;
                        }
                    }
                    ShrinkEvent::Skipped { reason, .. } => {
                        warn!(file = %label, reason = %reason, "not written");
                        summary.skipped += 1;
                    }
                    ShrinkEvent::Failed { .. } => summary.failed += 1,
                }
                emit(event);
            }
            Err(err) => {
                warn!(file = %label, error = %err, "shrink failed");
                emit(ShrinkEvent::Failed {
                    source: label,
                    error: err.to_string(),
                });
                summary.failed += 1;
            }
        }
    }
    Ok(summary)
}

fn shrink_one(
    backend: &impl ImageBackend,
    folder: &Path,
    source: &Path,
    label: &str,
    options: &ShrinkOptions,
    planned: &HashSet<&Path>,
) -> Result<ShrinkEvent, ShrinkError> {
    let original_bytes = fs::metadata(source)?.len();
    let encoded = shrink_file(backend, source, &options.target)?;

    let output_dir = options.output_dir.as_deref();
    let dest = destination_for(folder, source, output_dir, encoded.format);
    if let Some(taken) = conflicting_path(folder, source, &dest, output_dir, planned) {
        return Ok(ShrinkEvent::Skipped {
            source: label.to_string(),
            reason: format!("would overwrite {}", taken.display()),
        });
    }

    let destination = if options.dry_run {
        None
    } else {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        write_replacing(&dest, &encoded.bytes)?;
        Some(dest)
    };

    Ok(ShrinkEvent::Encoded {
        source: label.to_string(),
        destination,
        original_bytes,
        bytes: encoded.len(),
        setting: encoded.setting.to_string(),
        within_budget: encoded.within_budget,
    })
}

/// The file a renamed destination would clobber, if any.
///
/// Only destinations whose extension changed can collide. The sibling in the
/// folder with the new name is protected whether or not it was already
/// shrunk; in place, any existing file at the destination is too.
fn conflicting_path(
    folder: &Path,
    source: &Path,
    dest: &Path,
    output_dir: Option<&Path>,
    planned: &HashSet<&Path>,
) -> Option<PathBuf> {
    if dest.file_name() == source.file_name() {
        return None;
    }
    let sibling = source.with_file_name(dest.file_name()?);
    let taken = if planned.contains(sibling.as_path()) {
        sibling
    } else if output_dir.is_none() && dest.exists() {
        dest.to_path_buf()
    } else {
        return None;
    };
    Some(taken.strip_prefix(folder).unwrap_or(&taken).to_path_buf())
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_lowercase();
            supported_input_extensions().contains(&e.as_str())
        })
        .unwrap_or(false)
}

/// Where the re-encoded bytes for `source` go.
fn destination_for(
    folder: &Path,
    source: &Path,
    output_dir: Option<&Path>,
    format: OutputFormat,
) -> PathBuf {
    let mut dest = match output_dir {
        Some(out) => out.join(source.strip_prefix(folder).unwrap_or(source)),
        None => source.to_path_buf(),
    };
    let ext = dest
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);
    let keeps_extension = matches!(
        (format, ext.as_deref()),
        (OutputFormat::Jpeg, Some("jpg" | "jpeg")) | (OutputFormat::Png, Some("png"))
    );
    if !keeps_extension {
        dest.set_extension(format.extension());
    }
    dest
}
