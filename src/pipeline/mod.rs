//! Processing pipeline: bounded queue, worker threads, backfill scanning.
//!
//! Producers (the watcher, the batch coordinator, and workers themselves
//! when the queue runs dry) offer paths to a shared [`WorkQueue`]. Each
//! worker drives one file at a time through a [`FileProcessor`] and writes
//! exactly one outcome record per terminal result.

pub mod processor;
pub mod scan;
pub mod worker;

use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::desktop::Desktop;
use crate::error::{PipelineError, PipelineResult};
use crate::outcome::OutcomeLog;
use crate::queue::WorkQueue;

pub use processor::{
    FileProcessor, Instrumented, ProcessedFile, ProcessingStats, StandardProcessor, StatsSnapshot,
};
pub use scan::{BackfillReport, Scanner};
pub use worker::{Disposition, NOTIFY_TITLE, WorkerContext};

/// A running (or ready-to-run) set of workers over one queue.
pub struct Pipeline {
    context: WorkerContext,
    workers: usize,
    handles: Vec<JoinHandle<()>>,
}

impl Pipeline {
    /// `queue` is shared with the processor when it needs to hold paths.
    pub fn new(
        queue: Arc<WorkQueue>,
        workers: usize,
        scanner: Scanner,
        processor: Arc<dyn FileProcessor>,
        log: Arc<OutcomeLog>,
        desktop: Arc<dyn Desktop>,
    ) -> Self {
        let quarantine = scanner.quarantine().clone();
        Self {
            context: WorkerContext {
                queue,
                scanner,
                processor,
                quarantine,
                log,
                desktop,
            },
            workers: workers.max(1),
            handles: Vec::new(),
        }
    }

    /// Spawn the worker threads.
    pub fn start(&mut self) -> PipelineResult<()> {
        for id in self.handles.len()..self.workers {
            let ctx = self.context.clone();
            let handle = thread::Builder::new()
                .name(format!("smartparse-worker-{id}"))
                .spawn(move || ctx.run(id))
                .map_err(|e| PipelineError::Spawn { source: e })?;
            self.handles.push(handle);
        }
        tracing::info!(workers = self.handles.len(), "pipeline started");
        Ok(())
    }

    pub fn queue(&self) -> &Arc<WorkQueue> {
        &self.context.queue
    }

    pub fn scanner(&self) -> &Scanner {
        &self.context.scanner
    }

    pub fn log_path(&self) -> &Path {
        self.context.log.path()
    }

    pub fn desktop(&self) -> &Arc<dyn Desktop> {
        &self.context.desktop
    }

    /// Enqueue every eligible file in the watch directory, up to capacity.
    pub fn backfill(&self) -> BackfillReport {
        self.context.scanner.backfill(&self.context.queue)
    }

    /// Send one shutdown signal per worker and wait for them to exit.
    ///
    /// Files still queued behind the signals are left on disk for the next run.
    pub fn shutdown(mut self) {
        for _ in 0..self.handles.len() {
            self.context.queue.push_shutdown();
        }
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                tracing::error!("worker thread panicked");
            }
        }
        tracing::info!("pipeline stopped");
    }
}
