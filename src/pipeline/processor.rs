//! Per-file state machine and the instrumentation decorator.
//!
//! [`StandardProcessor`] drives one file through
//! stabilize → extract → classify → rename/move → tag. Logging, quarantine
//! and acknowledgement belong to the worker; the processor only reports a
//! typed result.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::classify::{Classifier, ClassifierProfile};
use crate::desktop::Desktop;
use crate::error::{ProcessingError, ProcessingResult};
use crate::extract::extractor_for;
use crate::filetype::FileKind;
use crate::queue::{QueueEntry, WorkQueue};
use crate::rename::Renamer;
use crate::stability::{Stability, StabilityProber};

/// A successfully filed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedFile {
    pub original_path: PathBuf,
    pub new_path: PathBuf,
    pub kind: FileKind,
    pub category: String,
    pub description: String,
}

/// Something that can take one queued file to a terminal (or transient) result.
pub trait FileProcessor: Send + Sync {
    fn process(&self, entry: &QueueEntry) -> ProcessingResult<ProcessedFile>;
}

/// `image`, `pdf`, `text`, or `unknown`.
pub fn file_type_label(path: &Path) -> &'static str {
    FileKind::from_path(path).map_or("unknown", |k| k.as_str())
}

/// The production state machine.
pub struct StandardProcessor {
    prober: StabilityProber,
    classifier: Arc<dyn Classifier>,
    renamer: Renamer,
    desktop: Arc<dyn Desktop>,
    max_prompt_chars: usize,
    max_stability_attempts: u32,
}

impl StandardProcessor {
    pub fn new(
        prober: StabilityProber,
        classifier: Arc<dyn Classifier>,
        desktop: Arc<dyn Desktop>,
    ) -> Self {
        Self {
            prober,
            classifier,
            renamer: Renamer::new(),
            desktop,
            max_prompt_chars: 4000,
            max_stability_attempts: 30,
        }
    }

    pub fn with_max_prompt_chars(mut self, max: usize) -> Self {
        self.max_prompt_chars = max;
        self
    }

    /// Share the work queue so intermediate rename targets are held while
    /// a file moves.
    pub fn with_queue(mut self, queue: Arc<WorkQueue>) -> Self {
        self.renamer = Renamer::with_queue(queue);
        self
    }

    pub fn with_max_stability_attempts(mut self, max: u32) -> Self {
        self.max_stability_attempts = max.max(1);
        self
    }

    fn stabilize(&self, entry: &QueueEntry) -> ProcessingResult<()> {
        match self.prober.probe(&entry.path)? {
            Stability::Stable { size } => {
                tracing::debug!(file = %entry.path.display(), size, "stable");
                Ok(())
            }
            Stability::Growing { before, after } => {
                let attempts = entry.attempts + 1;
                if attempts >= self.max_stability_attempts {
                    Err(ProcessingError::NeverStabilized {
                        path: entry.path.clone(),
                        attempts,
                    })
                } else {
                    Err(ProcessingError::Unstable {
                        path: entry.path.clone(),
                        before,
                        after,
                    })
                }
            }
        }
    }
}

impl FileProcessor for StandardProcessor {
    fn process(&self, entry: &QueueEntry) -> ProcessingResult<ProcessedFile> {
        let path = &entry.path;

        let kind = FileKind::from_path(path).ok_or_else(|| ProcessingError::UnsupportedType {
            path: path.clone(),
            extension: path
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default(),
        })?;

        tracing::debug!(file = %path.display(), state = "stabilizing");
        self.stabilize(entry)?;

        tracing::debug!(file = %path.display(), state = "classifying");
        let content = extractor_for(kind, self.max_prompt_chars).extract(path)?;
        tracing::debug!(file = %path.display(), content = %content.summary(), "extracted");
        let result = self
            .classifier
            .classify(&content, &ClassifierProfile::for_kind(kind))?;

        tracing::debug!(file = %path.display(), state = "renaming");
        let new_path = self.renamer.file(path, &result, kind)?;

        tracing::debug!(file = %new_path.display(), state = "tagging");
        self.desktop.tag(&result.category, kind.tag_color(), &new_path);

        Ok(ProcessedFile {
            original_path: path.clone(),
            new_path,
            kind,
            category: result.category,
            description: result.description,
        })
    }
}

// ---------------------------------------------------------------------------
// Instrumentation
// ---------------------------------------------------------------------------

/// Running totals of terminal outcomes.
#[derive(Debug, Default)]
pub struct ProcessingStats {
    images: AtomicUsize,
    pdfs: AtomicUsize,
    text: AtomicUsize,
    failed: AtomicUsize,
}

/// Point-in-time copy of [`ProcessingStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub images: usize,
    pub pdfs: usize,
    pub text: usize,
    pub failed: usize,
}

impl StatsSnapshot {
    pub fn succeeded(&self) -> usize {
        self.images + self.pdfs + self.text
    }

    pub fn total(&self) -> usize {
        self.succeeded() + self.failed
    }
}

impl ProcessingStats {
    pub fn record_success(&self, kind: FileKind) {
        let counter = match kind {
            FileKind::Image => &self.images,
            FileKind::Pdf => &self.pdfs,
            FileKind::Text => &self.text,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            images: self.images.load(Ordering::Relaxed),
            pdfs: self.pdfs.load(Ordering::Relaxed),
            text: self.text.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Decorator counting every terminal result of the wrapped processor.
/// Transient (re-queued) results are not counted.
pub struct Instrumented<P> {
    inner: P,
    stats: Arc<ProcessingStats>,
}

impl<P: FileProcessor> Instrumented<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            stats: Arc::new(ProcessingStats::default()),
        }
    }

    /// Shared handle to the counters.
    pub fn stats(&self) -> Arc<ProcessingStats> {
        Arc::clone(&self.stats)
    }
}

impl<P: FileProcessor> FileProcessor for Instrumented<P> {
    fn process(&self, entry: &QueueEntry) -> ProcessingResult<ProcessedFile> {
        let result = self.inner.process(entry);
        match &result {
            Ok(done) => self.stats.record_success(done.kind),
            Err(e) if e.is_transient() => {}
            Err(_) => self.stats.record_failure(),
        }
        result
    }
}
