//! Worker loop: pop, process, record, acknowledge.

use std::path::Path;
use std::sync::Arc;

use crate::desktop::{Desktop, FAILURE_SOUND, SUCCESS_SOUND};
use crate::error::ProcessingError;
use crate::outcome::{OutcomeLog, ProcessingOutcome};
use crate::queue::{Entry, QueueEntry, QueueFull, WorkQueue};
use crate::rename::Quarantine;

use super::processor::{FileProcessor, ProcessedFile, file_type_label};
use super::scan::Scanner;

/// Title used for every user notification.
pub const NOTIFY_TITLE: &str = "SmartParse";

/// What became of an entry after one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// A terminal outcome was recorded; the entry must be acknowledged.
    Finished,
    /// Back in the queue for another stability check.
    Requeued,
}

/// Everything a worker thread shares with its siblings.
#[derive(Clone)]
pub struct WorkerContext {
    pub queue: Arc<WorkQueue>,
    pub scanner: Scanner,
    pub processor: Arc<dyn FileProcessor>,
    pub quarantine: Quarantine,
    pub log: Arc<OutcomeLog>,
    pub desktop: Arc<dyn Desktop>,
}

impl WorkerContext {
    /// Run until a shutdown signal is popped.
    pub fn run(&self, id: usize) {
        tracing::debug!(worker = id, "worker started");
        loop {
            match self.queue.pop() {
                Entry::Shutdown => break,
                Entry::File(entry) => {
                    if self.handle(&entry) == Disposition::Finished {
                        self.queue.task_done(&entry.path);
                    }
                    if self.queue.is_empty() {
                        self.scanner.backfill(&self.queue);
                    }
                }
            }
        }
        tracing::debug!(worker = id, "worker stopped");
    }

    /// Process one popped entry and record its result. Never panics on I/O
    /// failure.
    pub fn handle(&self, entry: &QueueEntry) -> Disposition {
        match self.processor.process(entry) {
            Ok(done) => {
                self.on_success(&done);
                Disposition::Finished
            }
            Err(e) if e.is_transient() => self.requeue(entry, &e),
            Err(e) => {
                self.on_failure(entry, &e);
                Disposition::Finished
            }
        }
    }

    fn on_success(&self, done: &ProcessedFile) {
        tracing::info!(
            from = %done.original_path.display(),
            to = %done.new_path.display(),
            category = %done.category,
            "filed"
        );
        self.record(&ProcessingOutcome::success(
            done.original_path.clone(),
            done.new_path.clone(),
            done.kind.as_str(),
            &done.category,
        ));
        let name = file_name(&done.new_path);
        self.desktop.notify(
            &format!("{name} → {}", done.category),
            NOTIFY_TITLE,
            Some(SUCCESS_SOUND),
        );
    }

    fn requeue(&self, entry: &QueueEntry, reason: &ProcessingError) -> Disposition {
        tracing::debug!(file = %entry.path.display(), attempt = entry.attempts + 1, %reason, "requeue");
        match self.queue.requeue(entry.retry()) {
            Ok(()) => Disposition::Requeued,
            Err(QueueFull(dropped)) => {
                tracing::warn!(
                    file = %dropped.path.display(),
                    "queue full, unstable file left for the next scan"
                );
                Disposition::Finished
            }
        }
    }

    fn on_failure(&self, entry: &QueueEntry, err: &ProcessingError) {
        tracing::warn!(file = %entry.path.display(), error = %err, "processing failed");
        let location = err.current_path().unwrap_or(&entry.path);
        let quarantined = if location.exists() {
            self.quarantine.apply_logged(location)
        } else {
            None
        };
        self.record(&ProcessingOutcome::failure(
            entry.path.clone(),
            quarantined.clone(),
            file_type_label(&entry.path),
            err.to_string(),
        ));
        let shown = quarantined.as_deref().unwrap_or(&entry.path);
        self.desktop.notify(
            &format!("Failed: {}", file_name(shown)),
            NOTIFY_TITLE,
            Some(FAILURE_SOUND),
        );
    }

    fn record(&self, outcome: &ProcessingOutcome) {
        if let Err(e) = self.log.append(outcome) {
            tracing::error!(
                log = %self.log.path().display(),
                file = %outcome.original_path.display(),
                error = %e,
                "cannot write outcome record"
            );
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
