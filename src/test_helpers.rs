//! Shared test utilities for the fotei test suite.
//!
//! Provides throwaway media trees, a scripted [`TagGenerator`] stub, and a
//! sleeper that records backoff delays instead of waiting.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = media_tree(&["2023/beach/a.jpg", "2023/city/", "b.png"]);
//! let stub = StubTagger::new().failing("a.jpg").flaky("b.png", 2);
//! ```

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

use crate::config::ConfigError;
use crate::retry::Sleeper;
use crate::scan::{DirectoryPlan, relative_key};
use crate::tagging::{TagError, TagGenerator, TagRecord};

// =========================================================================
// Fixture trees
// =========================================================================

/// Create a temp tree from relative paths.
///
/// Entries ending in `/` become empty directories; everything else becomes a
/// small file (parents created as needed).
pub fn media_tree(entries: &[&str]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    for entry in entries {
        let path = tmp.path().join(entry.trim_end_matches('/'));
        if entry.ends_with('/') {
            std::fs::create_dir_all(&path).unwrap();
        } else {
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, b"media").unwrap();
        }
    }
    tmp
}

/// Plan directories as root-relative keys (the root itself is `""`).
pub fn plan_names(plan: &DirectoryPlan) -> Vec<String> {
    plan.directories()
        .iter()
        .map(|d| relative_key(plan.root(), d).unwrap())
        .collect()
}

/// Write a real encoded image of the given size and format.
pub fn write_image(path: &Path, width: u32, height: u32) {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x ^ y) % 256) as u8])
    });
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    img.save(path).unwrap();
}

// =========================================================================
// Tag generator stub
// =========================================================================

/// Scripted tag generator keyed by file name.
///
/// Succeeds with `[<file stem>, "stub"]` unless told otherwise. Every call is
/// recorded, including failed ones.
#[derive(Default)]
pub struct StubTagger {
    calls: RefCell<Vec<String>>,
    terminal: HashSet<String>,
    transient_left: RefCell<HashMap<String, u32>>,
    panic_on: Option<String>,
    no_credentials: bool,
}

impl StubTagger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always fail `name` with a terminal error.
    pub fn failing(mut self, name: &str) -> Self {
        self.terminal.insert(name.to_string());
        self
    }

    /// Fail `name` transiently `times` times before succeeding.
    pub fn flaky(self, name: &str, times: u32) -> Self {
        self.transient_left
            .borrow_mut()
            .insert(name.to_string(), times);
        self
    }

    /// Panic when asked for `name`, simulating a crash mid-directory.
    pub fn panicking_on(mut self, name: &str) -> Self {
        self.panic_on = Some(name.to_string());
        self
    }

    /// Fail the startup probe.
    pub fn without_credentials(mut self) -> Self {
        self.no_credentials = true;
        self
    }

    /// File names passed to `generate`, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl TagGenerator for StubTagger {
    fn probe(&self) -> Result<(), ConfigError> {
        if self.no_credentials {
            return Err(ConfigError::MissingCredential("FOTEI_TEST_KEY".into()));
        }
        Ok(())
    }

    fn generate(&self, path: &Path) -> Result<TagRecord, TagError> {
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        self.calls.borrow_mut().push(name.clone());

        if self.panic_on.as_deref() == Some(name.as_str()) {
            panic!("simulated crash while tagging {name}");
        }
        if self.terminal.contains(&name) {
            return Err(TagError::Terminal(format!("cannot tag {name}")));
        }
        if let Some(left) = self.transient_left.borrow_mut().get_mut(&name) {
            if *left > 0 {
                *left -= 1;
                return Err(TagError::Transient("HTTP 503".into()));
            }
        }
        let stem = path.file_stem().unwrap().to_string_lossy().to_string();
        Ok(vec![stem, "stub".to_string()])
    }
}

// =========================================================================
// Sleeper
// =========================================================================

/// Records requested backoff delays and returns immediately.
#[derive(Default)]
pub struct NoSleep {
    slept: RefCell<Vec<Duration>>,
}

impl NoSleep {
    pub fn slept(&self) -> Vec<Duration> {
        self.slept.borrow().clone()
    }
}

impl Sleeper for NoSleep {
    fn sleep(&self, duration: Duration) {
        self.slept.borrow_mut().push(duration);
    }
}
