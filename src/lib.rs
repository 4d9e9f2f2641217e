//! # fotei
//!
//! Maintenance tools for a large personal photo and video collection:
//!
//! - **tag**: walk a directory tree and ask a vision model for descriptive
//!   tags for every media file, storing them in one JSON file at the root.
//!   Runs survive interruption and never pay twice for the same file.
//! - **shrink**: re-encode images so each fits a byte budget at the best
//!   quality that still fits, optionally bounding the longest side.
//!
//! # Architecture
//!
//! ```text
//! tag     ROOT  ──▶ DirectoryPlan ──▶ per directory: list media
//!                                      └─▶ per file: store hit? skip
//!                                                    else RetryPolicy(TagGenerator)
//!                                      └─▶ persist store, move checkpoint
//!
//! shrink  FOLDER ──▶ per image: decode ─▶ resize_to_fit ─▶ encode_within_budget ─▶ write
//! ```
//!
//! Both commands are strictly sequential. Progress is streamed as events over
//! a channel to a printer thread in the binary, which only formats lines.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`batch`] | Tagging run state machine: checkpoint resume, per-file skip, persist per directory |
//! | [`scan`] | Deterministic directory plan and per-directory media listing |
//! | [`tagging`] | `TagGenerator` trait, error classification, Gemini implementation |
//! | [`retry`] | Bounded exponential backoff around one tagging call |
//! | [`metadata`] | JSON tag store keyed by root-relative path |
//! | [`checkpoint`] | Resume marker naming the last attempted directory |
//! | [`imaging`] | Resize and byte-budget encoding over the `image` crate |
//! | [`shrink`] | Folder-level driver for the imaging pipeline |
//! | [`config`] | `fotei.toml` loading, merging, and validation |
//! | [`output`] | CLI output formatting for both commands |
//!
//! # Design Decisions
//!
//! ## Two Layers of Skipping
//!
//! The checkpoint makes a resumed run jump straight past every directory that
//! was already attempted, without listing it. Store keys make any file that
//! was tagged before (in this run, an earlier one, or a directory the
//! checkpoint did not cover) free to revisit. Either alone would be enough
//! for correctness; the checkpoint keeps resumption over a huge tree cheap.
//!
//! ## Plan Positions, Not Path Comparison
//!
//! "Skip everything up to the checkpoint" is an index comparison in the
//! [`scan::DirectoryPlan`], which is built once in one sorted order. Comparing
//! path strings would depend on how the platform happens to order a walk.
//!
//! ## Persist Order
//!
//! After a directory, the store is written before the checkpoint. A crash
//! between the two re-attempts that directory, and every file it tagged is
//! already keyed, so nothing is paid for twice.

pub mod batch;
pub mod checkpoint;
pub mod config;
pub mod imaging;
pub mod metadata;
pub mod output;
pub mod retry;
pub mod scan;
pub mod shrink;
pub mod tagging;

#[cfg(test)]
pub(crate) mod test_helpers;
