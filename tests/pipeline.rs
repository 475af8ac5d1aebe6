//! End-to-end tests for the processing pipeline in batch mode.
//!
//! A stub classifier stands in for the model and a recording desktop
//! captures tags and notifications, so everything runs offline against a
//! temporary watch directory.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use smartparse::app::Assembly;
use smartparse::batch::BatchSummary;
use smartparse::classify::{ClassificationResult, Classifier, ClassifierProfile};
use smartparse::config::SmartParseConfig;
use smartparse::desktop::{DesktopEvent, FAILURE_SOUND, NullDesktop, RecordingDesktop};
use smartparse::error::ClassificationError;
use smartparse::extract::ExtractedContent;
use smartparse::filetype::TagColor;
use smartparse::outcome::{OutcomeStatus, ProcessingOutcome, read_outcomes};
use smartparse::rename::file_timestamp;

/// Images always fail upstream; text is named after its first word, except
/// the roadmap notes which get a fixed answer.
struct StubClassifier;

impl Classifier for StubClassifier {
    fn classify(
        &self,
        content: &ExtractedContent,
        profile: &ClassifierProfile,
    ) -> Result<ClassificationResult, ClassificationError> {
        match content {
            ExtractedContent::Image { .. } => Err(ClassificationError::Upstream {
                message: "vision model unavailable".into(),
            }),
            ExtractedContent::Text(text) if text.contains("Q3 roadmap") => {
                ClassificationResult::validated(
                    "q3 roadmap discussion meeting notes",
                    "Notes",
                    profile.kind,
                )
            }
            ExtractedContent::Text(text) => {
                let first = text.split_whitespace().next().unwrap_or("blank");
                ClassificationResult::validated(&format!("{first} notes"), "Notes", profile.kind)
            }
        }
    }
}

struct Harness {
    _root: tempfile::TempDir,
    watch: PathBuf,
    logs: PathBuf,
    config: SmartParseConfig,
}

impl Harness {
    fn new() -> Self {
        let root = tempfile::TempDir::new().unwrap();
        let watch = root.path().join("watch");
        let logs = root.path().join("logs");
        std::fs::create_dir_all(&watch).unwrap();
        let watch = watch.canonicalize().unwrap();
        let config = SmartParseConfig {
            settle_interval_ms: 30,
            queue_capacity: 2,
            workers: 2,
            notifications: false,
            ..SmartParseConfig::default()
        };
        Self {
            _root: root,
            watch,
            logs,
            config,
        }
    }

    fn write(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.watch.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn batch(&self, desktop: Arc<RecordingDesktop>) -> (BatchSummary, Vec<ProcessingOutcome>) {
        let assembly = Assembly::build(
            &self.config,
            &self.watch,
            &self.logs,
            Arc::new(StubClassifier),
            desktop,
        )
        .unwrap();
        let log = assembly.pipeline.log_path().to_path_buf();
        let summary = assembly.run_batch().unwrap();
        (summary, read_outcomes(&log).unwrap())
    }
}

/// A one-page PDF whose page has an empty content stream.
fn blank_pdf() -> Vec<u8> {
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>",
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Resources << >> /Contents 4 0 R >>",
        "<< /Length 0 >>\nstream\n\nendstream",
    ];
    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        write!(pdf, "{} 0 obj\n{body}\nendobj\n", i + 1).unwrap();
    }
    let xref = pdf.len();
    write!(pdf, "xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).unwrap();
    for off in offsets {
        write!(pdf, "{off:010} 00000 n \n").unwrap();
    }
    write!(
        pdf,
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n",
        objects.len() + 1
    )
    .unwrap();
    pdf
}

fn listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|rd| {
            rd.flatten()
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

#[test]
fn text_file_is_renamed_filed_tagged_and_logged() {
    let h = Harness::new();
    let mut body = b"Meeting notes: Q3 roadmap discussion\n".to_vec();
    body.resize(10 * 1024, b'.');
    let src = h.write("meeting.txt", &body);
    let stamp = file_timestamp(&src).unwrap();
    let desktop = Arc::new(RecordingDesktop::new());

    let (summary, outcomes) = h.batch(desktop.clone());

    let expected = h
        .watch
        .join("text")
        .join(format!("q3 roadmap discussion meeting notes_{stamp}.txt"));
    assert!(expected.is_file(), "missing {}", expected.display());
    assert_eq!(std::fs::read(&expected).unwrap(), body);
    assert!(!src.exists());

    assert_eq!(summary.text, 1);
    assert_eq!(summary.failed, 0);

    assert_eq!(outcomes.len(), 1);
    let record = &outcomes[0];
    assert_eq!(record.status, OutcomeStatus::Success);
    assert_eq!(record.original_path, src);
    assert_eq!(record.new_path.as_deref(), Some(expected.as_path()));
    assert_eq!(record.file_type, "text");
    assert_eq!(record.category.as_deref(), Some("Notes"));

    assert_eq!(
        desktop.tags(),
        vec![DesktopEvent::Tag {
            label: "Notes".into(),
            color: TagColor::Blue,
            path: expected,
        }]
    );
}

#[test]
fn pdf_without_text_is_quarantined_under_its_own_name() {
    let h = Harness::new();
    let src = h.write("scan.pdf", &blank_pdf());

    let (summary, outcomes) = h.batch(Arc::new(RecordingDesktop::new()));

    let quarantined = h.watch.join("FAILED_scan.pdf");
    assert!(quarantined.is_file());
    assert!(!src.exists());
    assert!(!h.watch.join("pdfs").exists());
    assert_eq!(summary.failed, 1);

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].status, OutcomeStatus::Fail);
    assert_eq!(outcomes[0].file_type, "pdf");
    assert!(
        outcomes[0]
            .error
            .as_deref()
            .unwrap()
            .contains("No extractable text")
    );
}

#[test]
fn image_with_failed_classification_never_reaches_images_folder() {
    let h = Harness::new();
    h.write("IMG_0042.PNG", b"\x89PNG\r\n\x1a\nnot really an image");
    let desktop = Arc::new(RecordingDesktop::new());

    let (summary, outcomes) = h.batch(desktop.clone());

    assert_eq!(listing(&h.watch), vec!["FAILED_IMG_0042.PNG".to_string()]);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.images, 0);
    assert_eq!(outcomes[0].file_type, "image");
    assert!(
        outcomes[0]
            .error
            .as_deref()
            .unwrap()
            .contains("vision model unavailable")
    );
    assert!(desktop.tags().is_empty());
    // The batch summary goes out last, with the failure sound.
    assert!(matches!(
        desktop.events().last(),
        Some(DesktopEvent::Notify { sound: Some(s), .. }) if s == FAILURE_SOUND
    ));
}

#[test]
fn invalid_description_quarantines_without_renaming() {
    struct SlashClassifier;
    impl Classifier for SlashClassifier {
        fn classify(
            &self,
            _content: &ExtractedContent,
            profile: &ClassifierProfile,
        ) -> Result<ClassificationResult, ClassificationError> {
            ClassificationResult::validated("notes/2024", "Notes", profile.kind)
        }
    }

    let h = Harness::new();
    h.write("todo.md", b"- buy milk");
    let assembly = Assembly::build(
        &h.config,
        &h.watch,
        &h.logs,
        Arc::new(SlashClassifier),
        Arc::new(NullDesktop),
    )
    .unwrap();
    let summary = assembly.run_batch().unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(listing(&h.watch), vec!["FAILED_todo.md".to_string()]);
}

#[test]
fn quarantined_and_hidden_files_are_left_alone() {
    let h = Harness::new();
    h.write("FAILED_old.txt", b"already failed");
    h.write(".DS_Store", b"finder");

    let (summary, outcomes) = h.batch(Arc::new(RecordingDesktop::new()));

    assert_eq!(summary.processed(), 0);
    assert!(outcomes.is_empty());
    assert_eq!(
        listing(&h.watch),
        vec![".DS_Store".to_string(), "FAILED_old.txt".to_string()]
    );
}

#[test]
fn batch_accounts_for_every_file_exactly_once() {
    let h = Harness::new();
    for word in ["alpha", "bravo", "charlie", "delta", "echo"] {
        h.write(&format!("{word}.txt"), format!("{word} minutes").as_bytes());
    }
    h.write("blank.pdf", &blank_pdf());
    h.write("photo.jpg", b"\xff\xd8\xff\xe0 jpeg");
    h.write("archive.zip", b"PK\x03\x04");

    let (summary, outcomes) = h.batch(Arc::new(RecordingDesktop::new()));

    assert_eq!(summary.text, 5);
    assert_eq!(summary.failed, 3);
    assert_eq!(summary.processed(), 8);
    assert_eq!(outcomes.len(), 8);

    let mut originals: Vec<_> = outcomes.iter().map(|o| o.original_path.clone()).collect();
    originals.sort();
    originals.dedup();
    assert_eq!(originals.len(), 8);

    let unknown = outcomes
        .iter()
        .find(|o| o.original_path.ends_with("archive.zip"))
        .unwrap();
    assert_eq!(unknown.file_type, "unknown");
    assert_eq!(listing(&h.watch.join("text")).len(), 5);
    assert!(h.watch.join("FAILED_archive.zip").is_file());
}

#[test]
fn growing_file_is_only_filed_once_complete() {
    let h = Harness::new();
    let src = h.write("download.txt", b"growing ");

    let writer = {
        let src = src.clone();
        std::thread::spawn(move || {
            let mut f = std::fs::OpenOptions::new().append(true).open(&src).unwrap();
            for _ in 0..40 {
                f.write_all(b"chunk ").unwrap();
                f.flush().unwrap();
                std::thread::sleep(Duration::from_millis(5));
            }
        })
    };

    let (summary, outcomes) = h.batch(Arc::new(RecordingDesktop::new()));
    writer.join().unwrap();

    assert_eq!(summary.text, 1);
    assert_eq!(outcomes.len(), 1);
    let filed = outcomes[0].new_path.clone().unwrap();
    assert_eq!(
        std::fs::metadata(&filed).unwrap().len(),
        (b"growing ".len() + 40 * b"chunk ".len()) as u64
    );
}

#[test]
fn second_run_writes_a_separate_log() {
    let h = Harness::new();
    h.write("alpha.txt", b"alpha");
    let (_, first) = h.batch(Arc::new(RecordingDesktop::new()));
    h.write("bravo.txt", b"bravo");
    let (_, second) = h.batch(Arc::new(RecordingDesktop::new()));

    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert!(second[0].original_path.ends_with("bravo.txt"));
    assert_eq!(listing(&h.logs).len(), 2);
}
