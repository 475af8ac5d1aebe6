//! Rich diagnostic error types for smartparse.
//!
//! Per-file failures (`ProcessingError`) are caught at the worker boundary and
//! turned into a logged outcome plus a quarantine rename. Process-level
//! failures (`PipelineError`) propagate to `main` and are rendered by miette.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the smartparse binary.
#[derive(Debug, Error, Diagnostic)]
pub enum SmartParseError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Path(#[from] crate::paths::PathError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Convenience alias for process-level results.
pub type SmartParseResult<T> = std::result::Result<T, SmartParseError>;

// ---------------------------------------------------------------------------
// Per-file processing errors
// ---------------------------------------------------------------------------

/// Why a single file could not be filed.
///
/// Only [`ProcessingError::Unstable`] is transient; every other variant is a
/// terminal outcome for the file and leads to quarantine.
#[derive(Debug, Error, Diagnostic)]
pub enum ProcessingError {
    #[error("file is still being written: {path} ({before} -> {after} bytes)")]
    #[diagnostic(
        code(smartparse::file::unstable),
        help("The file will be re-queued and checked again once the writer settles.")
    )]
    Unstable { path: PathBuf, before: u64, after: u64 },

    #[error("file never stabilized after {attempts} checks: {path}")]
    #[diagnostic(
        code(smartparse::file::never_stabilized),
        help(
            "The file kept changing size across every stability check. \
             Raise `max_stability_attempts` if large transfers are expected."
        )
    )]
    NeverStabilized { path: PathBuf, attempts: u32 },

    #[error("unsupported file type: \"{extension}\"")]
    #[diagnostic(
        code(smartparse::file::unsupported_type),
        help("Supported files are images (jpg, jpeg, png, webp, gif, heic), pdf, and plain text.")
    )]
    UnsupportedType { path: PathBuf, extension: String },

    #[error("No extractable text in {path}")]
    #[diagnostic(
        code(smartparse::file::no_text),
        help("The document contains no text on its first page. Scanned PDFs need OCR first.")
    )]
    NoExtractableText { path: PathBuf },

    #[error("content extraction failed for {path}: {message}")]
    #[diagnostic(
        code(smartparse::file::extraction),
        help("The file could not be read or parsed. It may be corrupted or truncated.")
    )]
    ExtractionFailed { path: PathBuf, message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Classification(#[from] ClassificationError),

    #[error("filesystem operation failed on {path}: {message}")]
    #[diagnostic(
        code(smartparse::file::filesystem),
        help("Check permissions on the watch directory and that no other process moved the file.")
    )]
    Filesystem {
        /// Where the file is now, as far as the pipeline knows.
        path: PathBuf,
        message: String,
    },
}

impl ProcessingError {
    /// Whether the file should be retried instead of quarantined.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unstable { .. })
    }

    /// The path the file currently occupies, when the error knows better
    /// than the queue entry (e.g. a rename succeeded but the move did not).
    pub fn current_path(&self) -> Option<&std::path::Path> {
        match self {
            Self::Filesystem { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Convenience alias for per-file results.
pub type ProcessingResult<T> = std::result::Result<T, ProcessingError>;

// ---------------------------------------------------------------------------
// Classification errors
// ---------------------------------------------------------------------------

/// Failures from the external naming/classification service.
#[derive(Debug, Error, Diagnostic)]
pub enum ClassificationError {
    #[error("classification request failed: {message}")]
    #[diagnostic(
        code(smartparse::classify::upstream),
        help("Check the `[llm]` base_url, that the API key variable is set, and network access.")
    )]
    Upstream { message: String },

    #[error("malformed classification response: {message}")]
    #[diagnostic(
        code(smartparse::classify::malformed),
        help("The model returned something other than the expected JSON object.")
    )]
    Malformed { message: String },

    #[error("invalid description \"{description}\": {reason}")]
    #[diagnostic(
        code(smartparse::classify::invalid_description),
        help("Descriptions must be non-empty lowercase words without braces, brackets or slashes.")
    )]
    InvalidDescription { description: String, reason: String },
}

// ---------------------------------------------------------------------------
// Pipeline setup errors
// ---------------------------------------------------------------------------

/// Errors that stop the pipeline from starting or running.
#[derive(Debug, Error, Diagnostic)]
pub enum PipelineError {
    #[error("watch directory is not usable: {path}")]
    #[diagnostic(
        code(smartparse::pipeline::watch_dir),
        help("Pass an existing directory as the first argument or set `watch_dir` in the config.")
    )]
    WatchDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open outcome log: {path}")]
    #[diagnostic(
        code(smartparse::pipeline::log_open),
        help("Ensure the log directory exists and is writable.")
    )]
    LogOpen {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read outcome log: {path}: {message}")]
    #[diagnostic(code(smartparse::pipeline::log_read))]
    LogRead { path: String, message: String },

    #[error("filesystem watcher error: {message}")]
    #[diagnostic(
        code(smartparse::pipeline::watcher),
        help("The platform notification backend refused the watch. Try batch mode with --batch.")
    )]
    Watcher { message: String },

    #[error("failed to install signal handler: {source}")]
    #[diagnostic(code(smartparse::pipeline::signal))]
    Signal {
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn worker thread: {source}")]
    #[diagnostic(code(smartparse::pipeline::spawn))]
    Spawn {
        #[source]
        source: std::io::Error,
    },
}

/// Convenience alias for pipeline-level results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
