//! Batch mode: process everything currently in the watch directory, then exit.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::desktop::{Desktop, FAILURE_SOUND, SUCCESS_SOUND};
use crate::error::PipelineResult;
use crate::pipeline::{NOTIFY_TITLE, Pipeline, ProcessingStats};

/// Totals for one batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub images: usize,
    pub pdfs: usize,
    pub text: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

impl BatchSummary {
    pub fn processed(&self) -> usize {
        self.images + self.pdfs + self.text + self.failed
    }

    /// Notification sound: the failure sound if anything failed.
    pub fn sound(&self) -> &'static str {
        if self.failed > 0 { FAILURE_SOUND } else { SUCCESS_SOUND }
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} images, {} PDFs, {} text files filed; {} failed ({:.1}s)",
            self.images,
            self.pdfs,
            self.text,
            self.failed,
            self.elapsed.as_secs_f64()
        )
    }
}

/// Drives repeated scan/drain passes over a pipeline.
pub struct BatchCoordinator {
    pipeline: Pipeline,
    stats: Arc<ProcessingStats>,
}

impl BatchCoordinator {
    /// `stats` must be the counters of the `Instrumented` processor inside `pipeline`.
    pub fn new(pipeline: Pipeline, stats: Arc<ProcessingStats>) -> Self {
        Self { pipeline, stats }
    }

    /// Scan, drain, repeat until a pass finds nothing. Workers are shut
    /// down before returning.
    pub fn run(mut self) -> PipelineResult<BatchSummary> {
        let started = Instant::now();
        self.pipeline.start()?;

        let mut passes = 0usize;
        let mut previous = Vec::new();
        loop {
            let present = self.pipeline.scanner().scan();
            if present.is_empty() {
                break;
            }
            if present == previous {
                tracing::warn!(
                    files = present.len(),
                    "files could not be moved out of the watch directory, stopping"
                );
                break;
            }
            let report = self.pipeline.backfill();
            passes += 1;
            tracing::debug!(pass = passes, queued = report.queued, "batch pass");
            self.pipeline.queue().join();
            previous = present;
        }

        let desktop: Arc<dyn Desktop> = Arc::clone(self.pipeline.desktop());
        self.pipeline.shutdown();

        let snap = self.stats.snapshot();
        let summary = BatchSummary {
            images: snap.images,
            pdfs: snap.pdfs,
            text: snap.text,
            failed: snap.failed,
            elapsed: started.elapsed(),
        };
        tracing::info!(passes, %summary, "batch complete");
        desktop.notify(&summary.to_string(), NOTIFY_TITLE, Some(summary.sound()));
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_display() {
        let summary = BatchSummary {
            images: 2,
            pdfs: 1,
            text: 0,
            failed: 3,
            elapsed: Duration::from_millis(1500),
        };
        assert_eq!(
            summary.to_string(),
            "2 images, 1 PDFs, 0 text files filed; 3 failed (1.5s)"
        );
        assert_eq!(summary.processed(), 6);
        assert_eq!(summary.sound(), FAILURE_SOUND);
        assert_eq!(
            BatchSummary {
                failed: 0,
                ..summary
            }
            .sound(),
            SUCCESS_SOUND
        );
    }
}
