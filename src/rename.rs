//! Renaming, filing and quarantine.
//!
//! A classified file is renamed in place to
//! `<description>_<YYYY-MM-DD_HH.MM.SS><ext>` and then moved into its kind's
//! subfolder. The two steps are separate: if the move fails the file stays
//! under its new name in the watch directory, and the error says so.
//!
//! The timestamp comes from the file's own metadata (creation time, else
//! modification time), never from the wall clock.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Local};

use crate::classify::ClassificationResult;
use crate::error::{ProcessingError, ProcessingResult};
use crate::filetype::FileKind;
use crate::queue::WorkQueue;

/// Format of the timestamp embedded in filed names.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H.%M.%S";

/// Creation time of `path`, falling back to modification time.
pub fn file_time(path: &Path) -> ProcessingResult<SystemTime> {
    let meta = std::fs::metadata(path).map_err(|e| ProcessingError::Filesystem {
        path: path.to_path_buf(),
        message: format!("cannot read metadata: {e}"),
    })?;
    meta.created()
        .or_else(|_| meta.modified())
        .map_err(|e| ProcessingError::Filesystem {
            path: path.to_path_buf(),
            message: format!("no creation or modification time: {e}"),
        })
}

/// Render a file time in local time as `YYYY-MM-DD_HH.MM.SS`.
pub fn format_timestamp(time: SystemTime) -> String {
    DateTime::<Local>::from(time).format(TIMESTAMP_FORMAT).to_string()
}

/// Timestamp string for `path` as it will appear in the filed name.
pub fn file_timestamp(path: &Path) -> ProcessingResult<String> {
    file_time(path).map(format_timestamp)
}

/// `<description>_<timestamp><ext>`, keeping the original extension's case.
pub fn target_file_name(description: &str, timestamp: &str, source: &Path) -> String {
    let ext = source
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    format!("{description}_{timestamp}{ext}")
}

fn fs_error(path: &Path, message: String) -> ProcessingError {
    ProcessingError::Filesystem {
        path: path.to_path_buf(),
        message,
    }
}

/// Rename without ever replacing an existing file.
fn rename_no_clobber(from: &Path, to: &Path) -> Result<(), String> {
    if to.exists() {
        return Err(format!("target already exists: {}", to.display()));
    }
    std::fs::rename(from, to).map_err(|e| format!("rename {} -> {}: {e}", from.display(), to.display()))
}

/// Performs the rename and move for classified files.
#[derive(Debug, Clone, Default)]
pub struct Renamer {
    queue: Option<Arc<WorkQueue>>,
}

impl Renamer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold the intermediate name in `queue` for the source file, so scans
    /// and events between the two steps do not pick it up as a new arrival.
    pub fn with_queue(queue: Arc<WorkQueue>) -> Self {
        Self { queue: Some(queue) }
    }

    /// Rename `source` in place, then move it into `<dir>/<subfolder>/`.
    ///
    /// Returns the final path. Re-invoking on a file that already carries its
    /// target name skips the rename step.
    pub fn file(
        &self,
        source: &Path,
        result: &ClassificationResult,
        kind: FileKind,
    ) -> ProcessingResult<PathBuf> {
        let dir = source
            .parent()
            .ok_or_else(|| fs_error(source, "source has no parent directory".into()))?;
        let timestamp = file_timestamp(source)?;
        let new_name = target_file_name(&result.description, &timestamp, source);

        // Step 1: rename within the watch directory.
        let renamed = dir.join(&new_name);
        if renamed != source {
            if let Some(queue) = &self.queue {
                queue.hold_for(source, &renamed);
            }
            rename_no_clobber(source, &renamed).map_err(|m| fs_error(source, m))?;
            tracing::debug!(from = %source.display(), to = %renamed.display(), "renamed");
        }

        // Step 2: move into the kind's subfolder.
        let dest_dir = dir.join(kind.subfolder());
        std::fs::create_dir_all(&dest_dir).map_err(|e| {
            fs_error(
                &renamed,
                format!("create {}: {e}", dest_dir.display()),
            )
        })?;
        let dest = dest_dir.join(&new_name);
        rename_no_clobber(&renamed, &dest).map_err(|m| fs_error(&renamed, m))?;
        tracing::debug!(to = %dest.display(), "moved");

        Ok(dest)
    }
}

/// Renames failed files with a reserved prefix so scans skip them.
#[derive(Debug, Clone)]
pub struct Quarantine {
    prefix: String,
}

impl Quarantine {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Whether a file name already carries the quarantine prefix.
    pub fn is_quarantined(&self, path: &Path) -> bool {
        path.file_name()
            .is_some_and(|n| n.to_string_lossy().starts_with(&self.prefix))
    }

    /// Quarantined path for `path` (same directory, prefixed name).
    pub fn target(&self, path: &Path) -> Option<PathBuf> {
        let name = path.file_name()?.to_string_lossy();
        Some(path.with_file_name(format!("{}{name}", self.prefix)))
    }

    /// Rename `path` to its quarantined name.
    ///
    /// Already-quarantined files are returned unchanged. If the quarantined
    /// name is taken, `FAILED_2_name`, `FAILED_3_name`, ... are tried.
    pub fn apply(&self, path: &Path) -> std::io::Result<PathBuf> {
        if self.is_quarantined(path) {
            return Ok(path.to_path_buf());
        }
        let mut target = self.target(path).ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name")
        })?;
        let name = path.file_name().unwrap_or_default().to_string_lossy().into_owned();
        let mut n = 2;
        while target.exists() {
            if n > 999 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    format!("{} already exists", target.display()),
                ));
            }
            target = path.with_file_name(format!("{}{n}_{name}", self.prefix));
            n += 1;
        }
        std::fs::rename(path, &target)?;
        Ok(target)
    }

    /// Best-effort quarantine: failures are logged, never raised.
    pub fn apply_logged(&self, path: &Path) -> Option<PathBuf> {
        match self.apply(path) {
            Ok(target) => {
                tracing::info!(file = %target.display(), "quarantined");
                Some(target)
            }
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "quarantine rename failed");
                None
            }
        }
    }
}
