//! Resume marker for the tagging walk.
//!
//! A plain text file holding the absolute path of the last directory whose
//! files were all attempted. The orchestrator overwrites it after each
//! directory and removes it when a walk finishes.

use crate::metadata::write_replacing;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Checkpoint {
    path: PathBuf,
}

impl Checkpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The recorded directory, or `None` if no marker exists or it is blank.
    pub fn load(&self) -> io::Result<Option<PathBuf>> {
        match fs::read(&self.path) {
            Ok(content) => {
                let dir = content.trim_ascii_end();
                Ok((!dir.is_empty()).then(|| path_from_bytes(dir)))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Record `dir` as the last attempted directory.
    pub fn save(&self, dir: &Path) -> io::Result<()> {
        write_replacing(&self.path, &path_bytes(dir))
    }

    /// Remove the marker. A missing marker is not an error.
    pub fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

// Raw bytes on Unix: a directory name that is not UTF-8 round-trips unchanged.
#[cfg(unix)]
fn path_bytes(dir: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    dir.as_os_str().as_bytes().to_vec()
}

#[cfg(unix)]
fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(std::ffi::OsStr::from_bytes(bytes))
}

#[cfg(not(unix))]
fn path_bytes(dir: &Path) -> Vec<u8> {
    dir.to_string_lossy().into_owned().into_bytes()
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}
