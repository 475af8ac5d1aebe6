//! Watch mode: filesystem events feed the pipeline until SIGINT/SIGTERM.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc;

use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::{Pipeline, Scanner};
use crate::queue::{Offer, WorkQueue};

/// A file or directory appearing under the watch directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    pub path: PathBuf,
    pub is_directory: bool,
}

impl FsEvent {
    /// Map a `notify` event to arrivals: creations, and the destination of a
    /// rename (a finished download or an atomic save). The pipeline's own
    /// intermediate rename is held in the queue and comes back a duplicate.
    pub fn from_notify(event: &Event) -> Vec<FsEvent> {
        let (paths, folder) = match event.kind {
            EventKind::Create(kind) => (&event.paths[..], kind == CreateKind::Folder),
            EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Any)) => {
                (&event.paths[..], false)
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                (event.paths.last().map(std::slice::from_ref).unwrap_or(&[]), false)
            }
            _ => return Vec::new(),
        };
        paths
            .iter()
            .map(|p| FsEvent {
                path: p.clone(),
                is_directory: folder || p.is_dir(),
            })
            .collect()
    }
}

/// Turns [`FsEvent`]s into queue offers. Never blocks.
#[derive(Clone)]
pub struct EventBridge {
    queue: Arc<WorkQueue>,
    scanner: Scanner,
}

impl EventBridge {
    pub fn new(queue: Arc<WorkQueue>, scanner: Scanner) -> Self {
        Self { queue, scanner }
    }

    pub fn for_pipeline(pipeline: &Pipeline) -> Self {
        Self::new(Arc::clone(pipeline.queue()), pipeline.scanner().clone())
    }

    /// Offer the event's path if eligible. Returns `None` for ignored events.
    pub fn handle(&self, event: &FsEvent) -> Option<Offer> {
        if event.is_directory || !self.scanner.is_eligible(&event.path) {
            return None;
        }
        let offer = self.queue.offer_if(&event.path, Path::is_file);
        match offer {
            Offer::Queued => tracing::info!(file = %event.path.display(), "queued"),
            Offer::Full => {
                tracing::warn!(file = %event.path.display(), "queue full, dropping event")
            }
            Offer::Duplicate => tracing::debug!(file = %event.path.display(), "already queued"),
            Offer::Gone => tracing::debug!(file = %event.path.display(), "vanished before queueing"),
        }
        Some(offer)
    }
}

/// Keeps a platform watcher alive; dropping it stops event delivery.
pub struct DirectoryWatcher {
    _watcher: RecommendedWatcher,
}

impl DirectoryWatcher {
    pub fn start(dir: &Path, recursive: bool, bridge: EventBridge) -> PipelineResult<Self> {
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for arrival in FsEvent::from_notify(&event) {
                    bridge.handle(&arrival);
                }
            }
            Err(e) => tracing::warn!(error = %e, "watch error"),
        })
        .map_err(|e| PipelineError::Watcher {
            message: e.to_string(),
        })?;

        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher
            .watch(dir, mode)
            .map_err(|e| PipelineError::Watcher {
                message: e.to_string(),
            })?;

        Ok(Self { _watcher: watcher })
    }
}

/// Run until SIGINT or SIGTERM, then drain workers and return.
pub fn run(mut pipeline: Pipeline, recursive: bool) -> PipelineResult<()> {
    let stop = shutdown_signal()?;
    pipeline.start()?;

    let report = pipeline.backfill();
    if report.queued > 0 {
        tracing::info!(queued = report.queued, "picked up existing files");
    }

    let watcher = DirectoryWatcher::start(
        pipeline.scanner().watch_dir(),
        recursive,
        EventBridge::for_pipeline(&pipeline),
    )?;
    tracing::info!(
        dir = %pipeline.scanner().watch_dir().display(),
        log = %pipeline.log_path().display(),
        "watching, press Ctrl+C to stop"
    );

    let _ = stop.recv();
    drop(watcher);
    pipeline.shutdown();
    Ok(())
}

#[cfg(unix)]
fn shutdown_signal() -> PipelineResult<mpsc::Receiver<i32>> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals =
        Signals::new([SIGINT, SIGTERM]).map_err(|e| PipelineError::Signal { source: e })?;
    let (tx, rx) = mpsc::channel();
    std::thread::Builder::new()
        .name("smartparse-signals".into())
        .spawn(move || {
            if let Some(sig) = signals.forever().next() {
                tracing::info!(signal = sig, "received signal, shutting down");
                let _ = tx.send(sig);
            }
        })
        .map_err(|e| PipelineError::Spawn { source: e })?;
    Ok(rx)
}

#[cfg(not(unix))]
fn shutdown_signal() -> PipelineResult<mpsc::Receiver<i32>> {
    // No signal iterator here; stop when stdin closes or a line is entered.
    let (tx, rx) = mpsc::channel();
    std::thread::Builder::new()
        .name("smartparse-stdin".into())
        .spawn(move || {
            let mut line = String::new();
            let _ = std::io::stdin().read_line(&mut line);
            let _ = tx.send(0);
        })
        .map_err(|e| PipelineError::Spawn { source: e })?;
    Ok(rx)
}
