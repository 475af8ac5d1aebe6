//! Wiring: build a ready-to-start pipeline from configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::batch::{BatchCoordinator, BatchSummary};
use crate::classify::{Classifier, HttpCompletionClient, LlmClassifier};
use crate::config::SmartParseConfig;
use crate::desktop::{ConsoleDesktop, Desktop, platform_desktop};
use crate::error::{PipelineError, PipelineResult, SmartParseResult};
use crate::outcome::OutcomeLog;
use crate::paths::SmartParsePaths;
use crate::pipeline::{Instrumented, Pipeline, ProcessingStats, Scanner, StandardProcessor};
use crate::queue::WorkQueue;
use crate::rename::Quarantine;
use crate::stability::StabilityProber;

/// Create the watch directory if needed and return its canonical path.
pub fn prepare_watch_dir(dir: &Path) -> PipelineResult<PathBuf> {
    let err = |e| PipelineError::WatchDir {
        path: dir.display().to_string(),
        source: e,
    };
    std::fs::create_dir_all(dir).map_err(err)?;
    dir.canonicalize().map_err(err)
}

/// A pipeline plus the counters of its instrumented processor.
pub struct Assembly {
    pub pipeline: Pipeline,
    pub stats: Arc<ProcessingStats>,
}

impl Assembly {
    /// Wire the processing stack over `watch_dir` with the given service
    /// boundaries. Opens a fresh outcome log in `log_dir`.
    pub fn build(
        config: &SmartParseConfig,
        watch_dir: &Path,
        log_dir: &Path,
        classifier: Arc<dyn Classifier>,
        desktop: Arc<dyn Desktop>,
    ) -> PipelineResult<Self> {
        let watch_dir = prepare_watch_dir(watch_dir)?;
        let log = Arc::new(OutcomeLog::create_in(log_dir)?);
        let quarantine = Quarantine::new(config.quarantine_prefix.clone());
        let queue = Arc::new(WorkQueue::new(config.queue_capacity));

        let processor = Instrumented::new(
            StandardProcessor::new(
                StabilityProber::new(config.settle_interval()),
                classifier,
                Arc::clone(&desktop),
            )
            .with_queue(Arc::clone(&queue))
            .with_max_prompt_chars(config.llm.max_prompt_chars)
            .with_max_stability_attempts(config.max_stability_attempts),
        );
        let stats = processor.stats();

        let pipeline = Pipeline::new(
            queue,
            config.workers,
            Scanner::new(watch_dir, quarantine),
            Arc::new(processor),
            log,
            desktop,
        );
        Ok(Self { pipeline, stats })
    }

    /// Production wiring: HTTP classifier and the platform desktop.
    pub fn from_config(
        config: &SmartParseConfig,
        watch_dir: &Path,
        log_dir: &Path,
    ) -> PipelineResult<Self> {
        let classifier = LlmClassifier::new(
            HttpCompletionClient::from_config(&config.llm),
            config.llm.model.clone(),
            config.llm.vision_model.clone(),
        );
        let desktop: Arc<dyn Desktop> = if config.notifications {
            Arc::from(platform_desktop())
        } else {
            Arc::new(ConsoleDesktop)
        };
        Self::build(config, watch_dir, log_dir, Arc::new(classifier), desktop)
    }

    pub fn run_batch(self) -> PipelineResult<BatchSummary> {
        BatchCoordinator::new(self.pipeline, self.stats).run()
    }

    pub fn run_watch(self, recursive: bool) -> PipelineResult<()> {
        crate::watch::run(self.pipeline, recursive)
    }
}

/// Resolve directories from CLI and config, then run the chosen mode.
pub fn run(
    config: &SmartParseConfig,
    paths: &SmartParsePaths,
    cli_watch_dir: Option<PathBuf>,
    batch: bool,
) -> SmartParseResult<()> {
    let watch_dir = config.resolve_watch_dir(cli_watch_dir, paths);
    let log_dir = config.resolve_log_dir(paths);
    let assembly = Assembly::from_config(config, &watch_dir, &log_dir)?;
    tracing::info!(
        watch_dir = %assembly.pipeline.scanner().watch_dir().display(),
        log = %assembly.pipeline.log_path().display(),
        batch,
        "smartparse starting"
    );

    if batch {
        let summary = assembly.run_batch()?;
        println!("{summary}");
    } else {
        assembly.run_watch(config.recursive)?;
    }
    Ok(())
}
