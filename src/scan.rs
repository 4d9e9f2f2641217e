//! Directory planning and media discovery.
//!
//! The tagging walk is driven by a [`DirectoryPlan`]: every directory under
//! the root, computed once up front in a single deterministic order.
//!
//! ```text
//! photos/              0
//! ├── 2023/            1
//! │   ├── beach/       2
//! │   └── city/        3
//! └── 2024/            4
//! ```
//!
//! The order is depth-first pre-order with entries sorted by file name at
//! every level; symlinks are not followed. The same order resolves the resume
//! checkpoint, so "skip everything up to the checkpoint" is an index
//! comparison in this sequence.
//!
//! Files inside a directory are listed separately with [`list_media`] when the
//! walk reaches it, sorted by name.

use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::warn;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("{0} is not inside the scanned root")]
    OutsideRoot(PathBuf),
    #[error("{} has a name that is not valid UTF-8", .0.display())]
    NonUtf8Name(PathBuf),
}

/// A media file discovered during the walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub path: PathBuf,
    /// Path relative to the root, `/`-separated. Metadata store key.
    pub key: String,
    /// Lowercased file extension.
    pub extension: String,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct DirectoryPlan {
    root: PathBuf,
    dirs: Vec<PathBuf>,
}

impl DirectoryPlan {
    /// Walk `root` and record every directory in visiting order.
    ///
    /// Failure to read the root itself is an error. Unreadable directories
    /// further down are still part of the plan (listing them fails later);
    /// their subtrees are logged and left out.
    pub fn build(root: &Path) -> Result<Self, ScanError> {
        let mut dirs = Vec::new();
        for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
            match entry {
                Ok(entry) if entry.file_type().is_dir() => dirs.push(entry.into_path()),
                Ok(_) => {}
                Err(err) if err.depth() == 0 => return Err(err.into()),
                Err(err) => warn!(error = %err, "skipping unreadable part of the tree"),
            }
        }
        Ok(Self {
            root: root.to_path_buf(),
            dirs,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn directories(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Index of `dir` in the plan, if it is part of it.
    pub fn position(&self, dir: &Path) -> Option<usize> {
        self.dirs.iter().position(|d| d == dir)
    }

    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }
}

/// Media files directly inside one directory.
#[derive(Debug, Default)]
pub struct DirectoryListing {
    pub files: Vec<MediaFile>,
    /// Media entries that could not be turned into a [`MediaFile`].
    pub unreadable: Vec<UnreadableEntry>,
}

#[derive(Debug)]
pub struct UnreadableEntry {
    pub path: PathBuf,
    pub error: ScanError,
}

/// List the media files directly inside `dir`, sorted by file name.
///
/// A file counts as media when its extension (case-insensitive) is one of
/// `extensions`. Subdirectories are ignored; the plan visits them on its own.
/// Only failing to open `dir` is an error; a media entry that cannot be
/// inspected or keyed lands in [`DirectoryListing::unreadable`].
pub fn list_media(dir: &Path, root: &Path, extensions: &[String]) -> Result<DirectoryListing, ScanError> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        match entry {
            Ok(entry) => entries.push(entry),
            Err(err) => warn!(directory = %dir.display(), error = %err, "skipping unreadable entry"),
        }
    }
    entries.sort_by_key(|e| e.file_name());

    let mut listing = DirectoryListing::default();
    for entry in entries {
        let path = entry.path();
        let Some(extension) = media_extension(&path, extensions) else {
            continue;
        };
        match media_file(&entry, root, extension) {
            Ok(Some(file)) => listing.files.push(file),
            Ok(None) => {}
            Err(error) => {
                warn!(file = %path.display(), error = %error, "skipping unreadable file");
                listing.unreadable.push(UnreadableEntry { path, error });
            }
        }
    }
    Ok(listing)
}

/// `None` for entries that are not regular files.
fn media_file(entry: &fs::DirEntry, root: &Path, extension: String) -> Result<Option<MediaFile>, ScanError> {
    if !entry.file_type()?.is_file() {
        return Ok(None);
    }
    let path = entry.path();
    let key = relative_key(root, &path)?;
    Ok(Some(MediaFile {
        size: entry.metadata()?.len(),
        path,
        key,
        extension,
    }))
}

/// The lowercased extension of `path` if it is in `extensions`.
fn media_extension(path: &Path, extensions: &[String]) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    extensions
        .iter()
        .any(|e| e.eq_ignore_ascii_case(&ext))
        .then_some(ext)
}

/// `path` relative to `root`, joined with `/`.
///
/// Names that are not valid UTF-8 are rejected so that two different files
/// can never share a key.
pub fn relative_key(root: &Path, path: &Path) -> Result<String, ScanError> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| ScanError::OutsideRoot(path.to_path_buf()))?;
    let parts = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .map(|part| {
            part.to_str()
                .ok_or_else(|| ScanError::NonUtf8Name(path.to_path_buf()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(parts.join("/"))
}
