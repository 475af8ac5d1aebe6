//! Watch-mode tests: files dropped into the directory while the pipeline
//! runs are picked up through filesystem events.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use smartparse::app::Assembly;
use smartparse::classify::{ClassificationResult, Classifier, ClassifierProfile};
use smartparse::config::SmartParseConfig;
use smartparse::desktop::RecordingDesktop;
use smartparse::error::ClassificationError;
use smartparse::extract::ExtractedContent;
use smartparse::outcome::{OutcomeStatus, read_outcomes};
use smartparse::watch::{DirectoryWatcher, EventBridge};

struct ReceiptClassifier;

impl Classifier for ReceiptClassifier {
    fn classify(
        &self,
        _content: &ExtractedContent,
        profile: &ClassifierProfile,
    ) -> Result<ClassificationResult, ClassificationError> {
        ClassificationResult::validated("coffee receipt", "Data", profile.kind)
    }
}

fn wait_for(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
    let until = Instant::now() + deadline;
    while Instant::now() < until {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(25));
    }
    done()
}

fn count_records(log: &Path) -> usize {
    read_outcomes(log).map(|o| o.len()).unwrap_or(0)
}

#[test]
fn dropped_file_is_filed_while_watching() {
    let root = tempfile::TempDir::new().unwrap();
    let watch = root.path().join("watch");
    let config = SmartParseConfig {
        settle_interval_ms: 20,
        notifications: false,
        ..SmartParseConfig::default()
    };
    let desktop = Arc::new(RecordingDesktop::new());
    let Assembly { mut pipeline, .. } = Assembly::build(
        &config,
        &watch,
        &root.path().join("logs"),
        Arc::new(ReceiptClassifier),
        desktop.clone(),
    )
    .unwrap();
    let watch = pipeline.scanner().watch_dir().to_path_buf();
    let log = pipeline.log_path().to_path_buf();

    pipeline.start().unwrap();
    let watcher =
        DirectoryWatcher::start(&watch, true, EventBridge::for_pipeline(&pipeline)).unwrap();

    std::fs::write(watch.join("expenses.csv"), b"date,amount\n2024-05-01,3.50\n").unwrap();

    assert!(wait_for(Duration::from_secs(10), || count_records(&log) == 1));
    drop(watcher);
    pipeline.shutdown();

    let outcomes = read_outcomes(&log).unwrap();
    assert_eq!(outcomes[0].status, OutcomeStatus::Success);
    assert_eq!(outcomes[0].category.as_deref(), Some("Data"));
    let filed = outcomes[0].new_path.clone().unwrap();
    assert!(filed.starts_with(watch.join("text")));
    assert!(
        filed
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("coffee receipt_")
    );
    // Moving into text/ raises more events; none may produce a second record.
    assert_eq!(outcomes.len(), 1);
    assert_eq!(desktop.tags().len(), 1);
}

#[test]
fn download_renamed_into_place_is_filed_once() {
    let root = tempfile::TempDir::new().unwrap();
    let config = SmartParseConfig {
        settle_interval_ms: 20,
        notifications: false,
        ..SmartParseConfig::default()
    };
    let Assembly { mut pipeline, .. } = Assembly::build(
        &config,
        &root.path().join("watch"),
        &root.path().join("logs"),
        Arc::new(ReceiptClassifier),
        Arc::new(RecordingDesktop::new()),
    )
    .unwrap();
    let watch = pipeline.scanner().watch_dir().to_path_buf();
    let log = pipeline.log_path().to_path_buf();

    pipeline.start().unwrap();
    let watcher =
        DirectoryWatcher::start(&watch, true, EventBridge::for_pipeline(&pipeline)).unwrap();

    let partial = watch.join("report.txt.crdownload");
    std::fs::write(&partial, b"quarterly numbers").unwrap();
    std::thread::sleep(Duration::from_millis(100));
    std::fs::rename(&partial, watch.join("report.txt")).unwrap();

    assert!(wait_for(Duration::from_secs(10), || count_records(&log) == 1));
    // Give late rename events from filing a chance to misfire.
    std::thread::sleep(Duration::from_millis(200));
    drop(watcher);
    pipeline.shutdown();

    let outcomes = read_outcomes(&log).unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].status, OutcomeStatus::Success);
    assert!(outcomes[0].original_path.ends_with("report.txt"));
    assert!(!watch.join("report.txt").exists());
}

#[test]
fn files_present_before_start_are_backfilled() {
    let root = tempfile::TempDir::new().unwrap();
    let watch = root.path().join("watch");
    std::fs::create_dir_all(&watch).unwrap();
    std::fs::write(watch.join("old.txt"), b"left over from yesterday").unwrap();

    let config = SmartParseConfig {
        settle_interval_ms: 20,
        notifications: false,
        ..SmartParseConfig::default()
    };
    let Assembly { mut pipeline, .. } = Assembly::build(
        &config,
        &watch,
        &root.path().join("logs"),
        Arc::new(ReceiptClassifier),
        Arc::new(RecordingDesktop::new()),
    )
    .unwrap();
    let log = pipeline.log_path().to_path_buf();

    pipeline.start().unwrap();
    assert_eq!(pipeline.backfill().queued, 1);
    pipeline.queue().join();
    pipeline.shutdown();

    assert_eq!(count_records(&log), 1);
}
