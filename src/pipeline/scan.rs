//! Directory scanning: which files in the watch directory are eligible.
//!
//! Only direct children of the watch directory qualify. Hidden files,
//! quarantined files, directories and partial downloads are skipped.

use std::path::{Path, PathBuf};

use crate::queue::{Offer, WorkQueue};
use crate::rename::Quarantine;

/// Suffixes browsers and sync clients use while a download is in progress.
const PARTIAL_SUFFIXES: &[&str] = &[".crdownload", ".part", ".download", ".partial", ".tmp"];

/// Summary of one backfill pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillReport {
    /// Eligible files still present when offered.
    pub found: usize,
    /// Files newly enqueued.
    pub queued: usize,
    /// Files skipped because they were already queued or in flight.
    pub duplicates: usize,
    /// The scan stopped early because the queue filled up.
    pub stopped_full: bool,
}

/// Eligibility rules for one watch directory.
#[derive(Debug, Clone)]
pub struct Scanner {
    watch_dir: PathBuf,
    quarantine: Quarantine,
}

impl Scanner {
    pub fn new(watch_dir: PathBuf, quarantine: Quarantine) -> Self {
        Self {
            watch_dir,
            quarantine,
        }
    }

    pub fn watch_dir(&self) -> &Path {
        &self.watch_dir
    }

    pub fn quarantine(&self) -> &Quarantine {
        &self.quarantine
    }

    /// Whether `path` sits directly in the watch directory.
    pub fn is_direct_child(&self, path: &Path) -> bool {
        let Some(parent) = path.parent() else {
            return false;
        };
        if parent == self.watch_dir {
            return true;
        }
        // Event paths may arrive through a symlinked prefix (/var vs /private/var).
        match (parent.canonicalize(), self.watch_dir.canonicalize()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }

    /// Name-based checks only: hidden, quarantined, partial download.
    pub fn is_candidate_name(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
            return false;
        };
        if name.starts_with('.') || self.quarantine.is_quarantined(path) {
            return false;
        }
        let lower = name.to_ascii_lowercase();
        !PARTIAL_SUFFIXES.iter().any(|s| lower.ends_with(s))
    }

    /// Full eligibility check for a single path.
    pub fn is_eligible(&self, path: &Path) -> bool {
        self.is_candidate_name(path) && self.is_direct_child(path) && path.is_file()
    }

    /// List eligible direct children, sorted by name.
    pub fn scan(&self) -> Vec<PathBuf> {
        let entries = match std::fs::read_dir(&self.watch_dir) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(dir = %self.watch_dir.display(), error = %e, "cannot list watch directory");
                return Vec::new();
            }
        };

        let mut files: Vec<PathBuf> = entries
            .flatten()
            .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
            .map(|e| e.path())
            .filter(|p| self.is_candidate_name(p))
            .collect();
        files.sort();
        files
    }

    /// Enqueue eligible files until the queue is full.
    pub fn backfill(&self, queue: &WorkQueue) -> BackfillReport {
        let mut report = BackfillReport::default();
        for path in self.scan() {
            match queue.offer_if(&path, Path::is_file) {
                Offer::Queued => report.queued += 1,
                Offer::Duplicate => report.duplicates += 1,
                Offer::Gone => continue,
                Offer::Full => {
                    report.found += 1;
                    report.stopped_full = true;
                    break;
                }
            }
            report.found += 1;
        }
        if report.queued > 0 || report.stopped_full {
            tracing::debug!(
                found = report.found,
                queued = report.queued,
                full = report.stopped_full,
                "backfill scan"
            );
        }
        report
    }
}
