// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # smartparse
//!
//! Watches a folder for new documents and images, asks an AI model for a
//! short description and a category, then renames, files and tags each one.
//!
//! ## Architecture
//!
//! - **Queue** (`queue`): bounded, non-blocking for producers, with drain tracking
//! - **Pipeline** (`pipeline`): worker threads running the per-file state machine
//!   (stabilize → extract → classify → rename/move → tag) and backfill scans
//! - **Extraction** (`extract`): image bytes, first PDF page, plain text
//! - **Classification** (`classify`): prompt profiles per file kind, defensive
//!   response parsing, an OpenAI-compatible completion client
//! - **Filing** (`rename`): timestamped names, per-kind subfolders, quarantine
//! - **Modes** (`watch`, `batch`): filesystem events until a signal, or one
//!   drain-and-exit pass with a summary
//!
//! ## Library usage
//!
//! ```no_run
//! use smartparse::app::Assembly;
//! use smartparse::config::SmartParseConfig;
//! use std::path::Path;
//!
//! let config = SmartParseConfig::default();
//! let assembly = Assembly::from_config(
//!     &config,
//!     Path::new("/tmp/inbox"),
//!     Path::new("/tmp/smartparse-logs"),
//! )
//! .unwrap();
//! let summary = assembly.run_batch().unwrap();
//! println!("{summary}");
//! ```

pub mod app;
pub mod batch;
pub mod classify;
pub mod config;
pub mod desktop;
pub mod error;
pub mod extract;
pub mod filetype;
pub mod outcome;
pub mod paths;
pub mod pipeline;
pub mod queue;
pub mod rename;
pub mod stability;
pub mod watch;
