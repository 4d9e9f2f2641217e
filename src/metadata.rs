//! Persistent tag store.
//!
//! Maps each media file's root-relative key (`/`-separated on every platform)
//! to its ordered tag list. The on-disk form is a single pretty-printed JSON
//! object with sorted keys:
//!
//! ```json
//! {
//!   "2023/beach/IMG_0001.jpg": [
//!     "海",
//!     "夕焼け"
//!   ]
//! }
//! ```
//!
//! The store only grows: an existing key is never overwritten or removed, which
//! is what makes a rerun skip files that were already tagged. Saving rewrites
//! the whole file through a sibling temp file and a rename, so an interrupted
//! save leaves the previous version intact.

use crate::tagging::TagRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Metadata store {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to serialize metadata store: {0}")]
    Serialize(#[source] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataStore {
    entries: BTreeMap<String, TagRecord>,
}

impl MetadataStore {
    /// Load the store from `path`; a missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Rewrite the whole store at `path`.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let mut json = serde_json::to_string_pretty(self).map_err(StoreError::Serialize)?;
        json.push('\n');
        write_replacing(path, json.as_bytes())?;
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Record tags for `key` unless it already has an entry.
    ///
    /// Returns `false` (and leaves the store untouched) when the key exists.
    pub fn insert(&mut self, key: impl Into<String>, tags: TagRecord) -> bool {
        match self.entries.entry(key.into()) {
            std::collections::btree_map::Entry::Occupied(_) => false,
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(tags);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// Write `contents` to a sibling temp file, then rename it over `path`.
pub(crate) fn write_replacing(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    fs::write(&tmp_path, contents)?;
    fs::rename(&tmp_path, path)
}
