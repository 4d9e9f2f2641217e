//! Resumable, idempotent tagging of a directory tree.
//!
//! [`BatchOrchestrator::run`] moves through these stages:
//!
//! ```text
//! INIT ──▶ WALK ──▶ for each planned directory:
//!                     PROCESS_FILE*  (skip already-tagged, else tag with retries)
//!                     PERSIST        (rewrite store, then move checkpoint)
//!          ──▶ DONE (remove checkpoint, report summary)
//! ```
//!
//! Two mechanisms make reruns cheap:
//!
//! - **Checkpoint**: directories at or before the checkpointed plan position
//!   are skipped wholesale, without listing them.
//! - **Store keys**: inside a processed directory, a file whose key is already
//!   in the metadata store is skipped without a tagging call.
//!
//! An interruption loses at most the directory in progress: its new tags were
//! never persisted and the checkpoint still names the previous directory.
//!
//! Per-file failures are reported and the walk continues. Missing credentials,
//! a corrupt store, and failure to persist are fatal.

use crate::checkpoint::Checkpoint;
use crate::config::{ConfigError, FoteiConfig};
use crate::metadata::{MetadataStore, StoreError};
use crate::retry::{RetryPolicy, Sleeper, ThreadSleeper};
use crate::scan::{self, DirectoryPlan, MediaFile, ScanError};
use crate::tagging::{TagError, TagGenerator, TagRecord};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Metadata store {path} is corrupt: {source}")]
    CorruptStore {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to plan walk: {0}")]
    Scan(#[from] ScanError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Failed to write metadata store: {0}")]
    Store(#[source] StoreError),
}

impl From<StoreError> for BatchError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Corrupt { path, source } => Self::CorruptStore { path, source },
            StoreError::Io(e) => Self::Io(e),
            other => Self::Store(other),
        }
    }
}

/// Where durable state lives and which files are media.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub metadata_path: PathBuf,
    pub checkpoint_path: PathBuf,
    pub media_extensions: Vec<String>,
}

impl BatchOptions {
    /// Resolve the configured file names against `root`.
    pub fn from_config(root: &Path, config: &FoteiConfig) -> Self {
        Self {
            metadata_path: root.join(&config.files.metadata),
            checkpoint_path: root.join(&config.files.checkpoint),
            media_extensions: config.files.media_extensions.clone(),
        }
    }
}

/// Progress reported while a run is in flight.
#[derive(Debug, Clone, PartialEq)]
pub enum TagEvent {
    /// The plan is built; `resume_after` is the checkpointed plan index.
    Started {
        root: PathBuf,
        directories: usize,
        known_files: usize,
        resume_after: Option<usize>,
    },
    /// The checkpoint named a directory that is not in the plan.
    CheckpointIgnored { directory: PathBuf },
    DirectoryStarted {
        /// 1-based position in the plan.
        position: usize,
        total: usize,
        directory: String,
        files: usize,
    },
    /// The directory could not be listed; its files stay untagged.
    DirectoryFailed { directory: String, error: String },
    FileTagged { key: String, tags: TagRecord },
    FileSkipped { key: String },
    FileFailed { key: String, error: String },
    /// Store and checkpoint were written for this directory.
    DirectoryPersisted { directory: String, tagged: usize },
    Finished(BatchSummary),
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Files that received tags in this run.
    pub tagged: usize,
    /// Files skipped because the store already had them.
    pub already_tagged: usize,
    pub failed: usize,
    /// Directories skipped because of the checkpoint.
    pub resumed_past: usize,
    /// Directories whose files were attempted and persisted.
    pub directories: usize,
    pub unreadable_directories: usize,
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} newly tagged, {} already tagged, {} failed",
            self.tagged, self.already_tagged, self.failed
        )?;
        if self.unreadable_directories > 0 {
            write!(f, ", {} unreadable directories", self.unreadable_directories)?;
        }
        if self.resumed_past > 0 {
            write!(f, " (resumed past {} directories)", self.resumed_past)?;
        }
        Ok(())
    }
}

enum FileOutcome {
    Tagged,
    AlreadyTagged,
    Failed,
}

/// Drives a tagging run over one root.
pub struct BatchOrchestrator<G, S = ThreadSleeper> {
    generator: G,
    retry: RetryPolicy,
    sleeper: S,
}

impl<G: TagGenerator> BatchOrchestrator<G> {
    pub fn new(generator: G, retry: RetryPolicy) -> Self {
        Self {
            generator,
            retry,
            sleeper: ThreadSleeper,
        }
    }
}

impl<G, S> BatchOrchestrator<G, S> {
    /// Replace how backoff delays are waited out.
    pub fn with_sleeper<T: Sleeper>(self, sleeper: T) -> BatchOrchestrator<G, T> {
        BatchOrchestrator {
            generator: self.generator,
            retry: self.retry,
            sleeper,
        }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }
}

impl<G: TagGenerator, S: Sleeper> BatchOrchestrator<G, S> {
    /// Tag every untagged media file under `root`.
    ///
    /// Events are sent to `events` when given; the channel is dropped when the
    /// run returns.
    pub fn run(
        &self,
        root: &Path,
        options: &BatchOptions,
        events: Option<Sender<TagEvent>>,
    ) -> Result<BatchSummary, BatchError> {
        let emit = |event: TagEvent| {
            if let Some(tx) = &events {
                let _ = tx.send(event);
            }
        };

        // INIT
        self.generator.probe()?;
        let mut store = MetadataStore::load(&options.metadata_path)?;
        let checkpoint = Checkpoint::new(&options.checkpoint_path);
        let last_attempted = checkpoint.load()?;

        // WALK
        let plan = DirectoryPlan::build(root)?;
        let resume_after = match last_attempted {
            Some(dir) => match plan.position(&dir) {
                Some(index) => Some(index),
                None => {
                    warn!(checkpoint = %dir.display(), "checkpoint is not part of this tree, starting over");
                    emit(TagEvent::CheckpointIgnored { directory: dir });
                    None
                }
            },
            None => None,
        };
        info!(root = %root.display(), directories = plan.len(), ?resume_after, "tagging run started");
        emit(TagEvent::Started {
            root: root.to_path_buf(),
            directories: plan.len(),
            known_files: store.len(),
            resume_after,
        });

        let mut summary = BatchSummary::default();
        for (index, dir) in plan.directories().iter().enumerate() {
            if resume_after.is_some_and(|done| index <= done) {
                summary.resumed_past += 1;
                continue;
            }
            let label = display_relative(root, dir);

            let listing = match scan::list_media(dir, root, &options.media_extensions) {
                Ok(listing) => listing,
                Err(err) => {
                    warn!(directory = %dir.display(), error = %err, "cannot list directory");
                    emit(TagEvent::DirectoryFailed {
                        directory: label,
                        error: err.to_string(),
                    });
                    summary.unreadable_directories += 1;
                    continue;
                }
            };
            let files: Vec<MediaFile> = listing
                .files
                .into_iter()
                .filter(|f| f.path != options.metadata_path && f.path != options.checkpoint_path)
                .collect();
            if files.is_empty() && listing.unreadable.is_empty() {
                continue;
            }

            emit(TagEvent::DirectoryStarted {
                position: index + 1,
                total: plan.len(),
                directory: label.clone(),
                files: files.len() + listing.unreadable.len(),
            });

            for entry in &listing.unreadable {
                emit(TagEvent::FileFailed {
                    key: display_relative(root, &entry.path),
                    error: entry.error.to_string(),
                });
                summary.failed += 1;
            }

            let mut tagged_here = 0;
            for file in &files {
                match self.process_file(file, &mut store, &emit) {
                    FileOutcome::Tagged => tagged_here += 1,
                    FileOutcome::AlreadyTagged => summary.already_tagged += 1,
                    FileOutcome::Failed => summary.failed += 1,
                }
            }
            summary.tagged += tagged_here;
            summary.directories += 1;

            // PERSIST: store first, so a crash in between re-attempts this
            // directory and finds every tagged file already keyed.
            store.save(&options.metadata_path)?;
            checkpoint.save(dir)?;
            emit(TagEvent::DirectoryPersisted {
                directory: label,
                tagged: tagged_here,
            });
        }

        // DONE
        checkpoint.clear()?;
        info!(%summary, "tagging run finished");
        emit(TagEvent::Finished(summary.clone()));
        Ok(summary)
    }

    fn process_file(
        &self,
        file: &MediaFile,
        store: &mut MetadataStore,
        emit: &impl Fn(TagEvent),
    ) -> FileOutcome {
        if store.contains(&file.key) {
            emit(TagEvent::FileSkipped {
                key: file.key.clone(),
            });
            return FileOutcome::AlreadyTagged;
        }

        match self.tag(file) {
            Ok(tags) => {
                emit(TagEvent::FileTagged {
                    key: file.key.clone(),
                    tags: tags.clone(),
                });
                store.insert(file.key.clone(), tags);
                FileOutcome::Tagged
            }
            Err(err) => {
                warn!(file = %file.key, error = %err, "tagging failed");
                emit(TagEvent::FileFailed {
                    key: file.key.clone(),
                    error: err.to_string(),
                });
                FileOutcome::Failed
            }
        }
    }

    fn tag(&self, file: &MediaFile) -> Result<TagRecord, TagError> {
        self.retry
            .call_with(&self.sleeper, || self.generator.generate(&file.path))
    }
}

/// Label for a path under the root; the root itself is `.`.
fn display_relative(root: &Path, dir: &Path) -> String {
    match scan::relative_key(root, dir) {
        Ok(key) if key.is_empty() => ".".to_string(),
        Ok(key) => key,
        Err(_) => dir.display().to_string(),
    }
}
