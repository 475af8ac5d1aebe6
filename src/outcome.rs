//! Outcome logging: one JSON record per terminal outcome, one file per run.
//!
//! Records are appended and flushed one line at a time under a mutex, so
//! concurrent workers never interleave partial lines.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// Terminal status of one processing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Fail,
}

/// Audit record for one terminal outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingOutcome {
    pub original_path: PathBuf,
    pub new_path: Option<PathBuf>,
    /// `image`, `pdf`, `text`, or `unknown` for unsupported files.
    pub file_type: String,
    pub category: Option<String>,
    pub status: OutcomeStatus,
    pub error: Option<String>,
    pub timestamp: DateTime<Local>,
}

impl ProcessingOutcome {
    pub fn success(
        original_path: PathBuf,
        new_path: PathBuf,
        file_type: &str,
        category: &str,
    ) -> Self {
        Self {
            original_path,
            new_path: Some(new_path),
            file_type: file_type.to_string(),
            category: Some(category.to_string()),
            status: OutcomeStatus::Success,
            error: None,
            timestamp: Local::now(),
        }
    }

    /// A failed attempt. `new_path` is where the file ended up, if it moved.
    pub fn failure(
        original_path: PathBuf,
        new_path: Option<PathBuf>,
        file_type: &str,
        error: String,
    ) -> Self {
        Self {
            original_path,
            new_path,
            file_type: file_type.to_string(),
            category: None,
            status: OutcomeStatus::Fail,
            error: Some(error),
            timestamp: Local::now(),
        }
    }
}

/// Append-only JSONL log for the current run.
pub struct OutcomeLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl OutcomeLog {
    /// Create a fresh log file for this run inside `dir`.
    pub fn create_in(dir: &Path) -> PipelineResult<Self> {
        std::fs::create_dir_all(dir).map_err(|e| PipelineError::LogOpen {
            path: dir.display().to_string(),
            source: e,
        })?;
        let stamp = Local::now().format("%Y%m%d-%H%M%S");
        let mut path = dir.join(format!("smartparse-{stamp}.jsonl"));
        let mut n = 1;
        loop {
            match OpenOptions::new().append(true).create_new(true).open(&path) {
                Ok(file) => {
                    return Ok(Self {
                        path,
                        file: Mutex::new(file),
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    path = dir.join(format!("smartparse-{stamp}-{n}.jsonl"));
                    n += 1;
                }
                Err(e) => {
                    return Err(PipelineError::LogOpen {
                        path: path.display().to_string(),
                        source: e,
                    });
                }
            }
        }
    }

    /// Open (or create) a specific log file in append mode.
    pub fn open(path: &Path) -> PipelineResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| PipelineError::LogOpen {
                path: path.display().to_string(),
                source: e,
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single line.
    pub fn append(&self, outcome: &ProcessingOutcome) -> std::io::Result<()> {
        let mut line = serde_json::to_string(outcome)?;
        line.push('\n');
        let mut file = self
            .file
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        file.write_all(line.as_bytes())?;
        file.flush()
    }
}

/// Read every record back from a log file.
pub fn read_outcomes(path: &Path) -> PipelineResult<Vec<ProcessingOutcome>> {
    let file = File::open(path).map_err(|e| PipelineError::LogRead {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let mut outcomes = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| PipelineError::LogRead {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let outcome = serde_json::from_str(&line).map_err(|e| PipelineError::LogRead {
            path: path.display().to_string(),
            message: format!("line {}: {e}", i + 1),
        })?;
        outcomes.push(outcome);
    }
    Ok(outcomes)
}
