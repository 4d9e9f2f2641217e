//! CLI output formatting for both commands.
//!
//! Output is organised around what happened to each file, with directories
//! as headers. Paths are shown relative to the root the user passed.
//!
//! # Output Format
//!
//! ## Tag
//!
//! ```text
//! ==> Tagging /photos (5 directories, 2 files already in store)
//!     Resuming after directory 2 of 5
//! 003/005 2023/beach (3 files)
//!     IMG_0001.jpg: 海, 夕焼け, 旅行
//!     IMG_0002.jpg: already tagged
//!     IMG_0003.jpg: FAILED Service rejected request: HTTP 400
//!     Saved (1 new)
//! Done: 1 newly tagged, 1 already tagged, 1 failed
//! ```
//!
//! ## Shrink
//!
//! ```text
//! a/one.jpg: 2.4 MB -> 196.1 KB (quality 80)
//!     Written: out/a/one.jpg
//! big.png: 3.1 MB -> 260.0 KB (level 9, over budget)
//! notes.txt: skipped (unsupported format)
//! Shrink: 2 written, 1 over budget, 1 skipped, 0 failed
//! ```
//!
//! # Architecture
//!
//! Each event type has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::batch::{BatchSummary, TagEvent};
use crate::shrink::{ShrinkEvent, ShrinkSummary};

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based position as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Last path segment of a `/`-separated key.
fn file_label(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Human-readable byte count with binary units.
pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{} B", bytes)
    } else if b < MB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / MB)
    }
}

// ============================================================================
// Tag output
// ============================================================================

/// Format a single tagging progress event as display lines.
pub fn format_tag_event(event: &TagEvent) -> Vec<String> {
    match event {
        TagEvent::Started {
            root,
            directories,
            known_files,
            resume_after,
        } => {
            let mut lines = vec![format!(
                "==> Tagging {} ({} directories, {} files already in store)",
                root.display(),
                directories,
                known_files
            )];
            if let Some(index) = resume_after {
                lines.push(format!(
                    "{}Resuming after directory {} of {}",
                    indent(1),
                    index + 1,
                    directories
                ));
            }
            lines
        }
        TagEvent::CheckpointIgnored { directory } => vec![format!(
            "{}Checkpoint {} is not in this tree; starting from the top",
            indent(1),
            directory.display()
        )],
        TagEvent::DirectoryStarted {
            position,
            total,
            directory,
            files,
        } => vec![format!(
            "{}/{} {} ({} files)",
            format_index(*position),
            format_index(*total),
            directory,
            files
        )],
        TagEvent::DirectoryFailed { directory, error } => {
            vec![format!("{}: cannot list directory: {}", directory, error)]
        }
        TagEvent::FileTagged { key, tags } => {
            let shown = if tags.is_empty() {
                "(no tags)".to_string()
            } else {
                tags.join(", ")
            };
            vec![format!("{}{}: {}", indent(1), file_label(key), shown)]
        }
        TagEvent::FileSkipped { key } => {
            vec![format!("{}{}: already tagged", indent(1), file_label(key))]
        }
        TagEvent::FileFailed { key, error } => {
            vec![format!("{}{}: FAILED {}", indent(1), file_label(key), error)]
        }
        TagEvent::DirectoryPersisted { tagged, .. } => {
            vec![format!("{}Saved ({} new)", indent(1), tagged)]
        }
        TagEvent::Finished(summary) => vec![format_batch_summary(summary)],
    }
}

pub fn format_batch_summary(summary: &BatchSummary) -> String {
    format!("Done: {}", summary)
}

/// Print a tagging event to stdout.
pub fn print_tag_event(event: &TagEvent) {
    for line in format_tag_event(event) {
        println!("{}", line);
    }
}

// ============================================================================
// Shrink output
// ============================================================================

/// Format a single shrink progress event as display lines.
pub fn format_shrink_event(event: &ShrinkEvent) -> Vec<String> {
    match event {
        ShrinkEvent::Encoded {
            source,
            destination,
            original_bytes,
            bytes,
            setting,
            within_budget,
        } => {
            let detail = if *within_budget {
                setting.clone()
            } else {
                format!("{}, over budget", setting)
            };
            let mut lines = vec![format!(
                "{}: {} -> {} ({})",
                source,
                format_bytes(*original_bytes),
                format_bytes(*bytes),
                detail
            )];
            if let Some(dest) = destination {
                lines.push(format!("{}Written: {}", indent(1), dest.display()));
            }
            lines
        }
        ShrinkEvent::Skipped { source, reason } => {
            vec![format!("{}: skipped ({})", source, reason)]
        }
        ShrinkEvent::Failed { source, error } => vec![format!("{}: FAILED {}", source, error)],
    }
}

pub fn format_shrink_summary(summary: &ShrinkSummary, dry_run: bool) -> String {
    let verb = if dry_run { "to write" } else { "written" };
    format!(
        "Shrink: {} {}, {} over budget, {} skipped, {} failed",
        summary.written, verb, summary.over_budget, summary.skipped, summary.failed
    )
}

/// Print a shrink event to stdout.
pub fn print_shrink_event(event: &ShrinkEvent) {
    for line in format_shrink_event(event) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
