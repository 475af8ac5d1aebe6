//! Content extraction: turns a file on disk into what the classifier sees.
//!
//! Images are passed through as raw bytes, PDFs contribute the text of their
//! first page (via `pdf-extract`), and text files their decoded contents.
//! Each kind implements [`ContentExtractor`]; [`extractor_for`] picks one.

use std::path::Path;

use crate::error::{ProcessingError, ProcessingResult};
use crate::filetype::FileKind;

/// What the classifier receives for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedContent {
    /// Raw image bytes and their MIME type.
    Image { bytes: Vec<u8>, media_type: String },
    /// Extracted text, already truncated.
    Text(String),
}

impl ExtractedContent {
    /// Short description for logs.
    pub fn summary(&self) -> String {
        match self {
            Self::Image { bytes, media_type } => format!("{media_type}, {} bytes", bytes.len()),
            Self::Text(text) => format!("{} chars of text", text.chars().count()),
        }
    }
}

/// Trait for kind-specific extractors.
pub trait ContentExtractor: Send + Sync {
    /// Read the file and produce classifier input.
    fn extract(&self, path: &Path) -> ProcessingResult<ExtractedContent>;

    /// The kind this extractor handles.
    fn kind(&self) -> FileKind;
}

/// Get the extractor for a file kind. Text is cut to `max_chars` characters.
pub fn extractor_for(kind: FileKind, max_chars: usize) -> Box<dyn ContentExtractor> {
    match kind {
        FileKind::Image => Box::new(ImageExtractor),
        FileKind::Pdf => Box::new(PdfExtractor { max_chars }),
        FileKind::Text => Box::new(TextExtractor { max_chars }),
    }
}

fn read_bytes(path: &Path) -> ProcessingResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| ProcessingError::Filesystem {
        path: path.to_path_buf(),
        message: format!("read failed: {e}"),
    })
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Passes image bytes through untouched.
pub struct ImageExtractor;

impl ContentExtractor for ImageExtractor {
    fn kind(&self) -> FileKind {
        FileKind::Image
    }

    fn extract(&self, path: &Path) -> ProcessingResult<ExtractedContent> {
        let bytes = read_bytes(path)?;
        if bytes.is_empty() {
            return Err(ProcessingError::ExtractionFailed {
                path: path.to_path_buf(),
                message: "image file is empty".into(),
            });
        }
        Ok(ExtractedContent::Image {
            bytes,
            media_type: FileKind::image_media_type(path).to_string(),
        })
    }
}

/// First-page text of a PDF.
pub struct PdfExtractor {
    max_chars: usize,
}

impl PdfExtractor {
    /// Text of the first page, or an empty string when it has none.
    ///
    /// `pdf-extract` returns all pages as one string with form feeds between
    /// pages, so the first page is everything before the first `\x0C`.
    pub fn first_page_text(data: &[u8]) -> Result<String, String> {
        // pdf-extract panics on some malformed inputs; the worker must survive them.
        let text = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(data))
            .map_err(|_| "pdf parser panicked".to_string())?
            .map_err(|e| e.to_string())?;
        let first = text.split('\x0C').next().unwrap_or_default();
        Ok(first.trim().to_string())
    }
}

impl ContentExtractor for PdfExtractor {
    fn kind(&self) -> FileKind {
        FileKind::Pdf
    }

    fn extract(&self, path: &Path) -> ProcessingResult<ExtractedContent> {
        let data = read_bytes(path)?;
        let text = Self::first_page_text(&data).map_err(|message| {
            ProcessingError::ExtractionFailed {
                path: path.to_path_buf(),
                message,
            }
        })?;

        // Normalize internal whitespace (PDF often has weird line breaks).
        let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if normalized.is_empty() {
            return Err(ProcessingError::NoExtractableText {
                path: path.to_path_buf(),
            });
        }
        Ok(ExtractedContent::Text(truncate_chars(&normalized, self.max_chars)))
    }
}

/// Plain text, decoded lossily.
pub struct TextExtractor {
    max_chars: usize,
}

impl ContentExtractor for TextExtractor {
    fn kind(&self) -> FileKind {
        FileKind::Text
    }

    fn extract(&self, path: &Path) -> ProcessingResult<ExtractedContent> {
        let data = read_bytes(path)?;
        let text = String::from_utf8_lossy(&data);
        let text = text.trim();
        if text.is_empty() {
            return Err(ProcessingError::NoExtractableText {
                path: path.to_path_buf(),
            });
        }
        Ok(ExtractedContent::Text(truncate_chars(text, self.max_chars)))
    }
}
