//! Stability probing: is a file still being written?
//!
//! The probe samples the file size twice, one settle interval apart. It only
//! sleeps; it never holds the queue lock, so other workers keep dequeuing.

use std::path::Path;
use std::time::Duration;

use crate::error::{ProcessingError, ProcessingResult};

/// Result of one stability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stability {
    /// Size unchanged across the settle interval.
    Stable { size: u64 },
    /// Size changed; the writer is still active.
    Growing { before: u64, after: u64 },
}

/// Two-sample size prober.
#[derive(Debug, Clone)]
pub struct StabilityProber {
    settle: Duration,
}

impl StabilityProber {
    pub fn new(settle: Duration) -> Self {
        Self { settle }
    }

    pub fn settle_interval(&self) -> Duration {
        self.settle
    }

    /// Sample the size, wait, sample again.
    ///
    /// A file that vanishes between samples is a filesystem failure, not
    /// instability.
    pub fn probe(&self, path: &Path) -> ProcessingResult<Stability> {
        let before = file_size(path)?;
        std::thread::sleep(self.settle);
        let after = file_size(path)?;

        if before == after {
            Ok(Stability::Stable { size: after })
        } else {
            Ok(Stability::Growing { before, after })
        }
    }
}

fn file_size(path: &Path) -> ProcessingResult<u64> {
    let meta = std::fs::metadata(path).map_err(|e| ProcessingError::Filesystem {
        path: path.to_path_buf(),
        message: format!("cannot stat source: {e}"),
    })?;
    if !meta.is_file() {
        return Err(ProcessingError::Filesystem {
            path: path.to_path_buf(),
            message: "not a regular file".into(),
        });
    }
    Ok(meta.len())
}
