//! File kinds recognised by the pipeline.
//!
//! Each kind fixes its destination subfolder, the closed set of categories
//! the classifier may answer with, and the colour of the tag applied after
//! filing.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Category every kind accepts when nothing else fits.
pub const OTHER_CATEGORY: &str = "Other";

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "heic"];
const PDF_EXTENSIONS: &[&str] = &["pdf"];
const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "csv", "json", "log"];

const IMAGE_CATEGORIES: &[&str] = &[
    "Screenshot",
    "Photo",
    "Receipt",
    "Document",
    "Diagram",
    "Meme",
    "Artwork",
    OTHER_CATEGORY,
];
const PDF_CATEGORIES: &[&str] = &[
    "Invoice",
    "Receipt",
    "Contract",
    "Statement",
    "Report",
    "Manual",
    "Letter",
    "Form",
    OTHER_CATEGORY,
];
const TEXT_CATEGORIES: &[&str] = &[
    "Notes",
    "Code",
    "Log",
    "Data",
    "Letter",
    "Draft",
    "List",
    OTHER_CATEGORY,
];

/// Supported file kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Image,
    Pdf,
    Text,
}

impl FileKind {
    pub const ALL: [FileKind; 3] = [FileKind::Image, FileKind::Pdf, FileKind::Text];

    /// Detect the kind from a path's extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        Self::from_extension(&ext)
    }

    /// Detect the kind from a bare extension without the leading dot.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Image)
        } else if PDF_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Pdf)
        } else if TEXT_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Text)
        } else {
            None
        }
    }

    /// Short name used in logs and outcome records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Pdf => "pdf",
            Self::Text => "text",
        }
    }

    /// Subfolder of the watch directory that receives filed files.
    pub fn subfolder(&self) -> &'static str {
        match self {
            Self::Image => "images",
            Self::Pdf => "pdfs",
            Self::Text => "text",
        }
    }

    /// Closed set of categories the classifier may assign.
    pub fn categories(&self) -> &'static [&'static str] {
        match self {
            Self::Image => IMAGE_CATEGORIES,
            Self::Pdf => PDF_CATEGORIES,
            Self::Text => TEXT_CATEGORIES,
        }
    }

    /// Map a free-form category onto the closed set, falling back to `Other`.
    pub fn canonical_category(&self, raw: &str) -> &'static str {
        let raw = raw.trim();
        self.categories()
            .iter()
            .find(|c| c.eq_ignore_ascii_case(raw))
            .copied()
            .unwrap_or(OTHER_CATEGORY)
    }

    /// Colour of the tag applied to filed files of this kind.
    pub fn tag_color(&self) -> TagColor {
        match self {
            Self::Image => TagColor::Green,
            Self::Pdf => TagColor::Red,
            Self::Text => TagColor::Blue,
        }
    }

    /// MIME type for an image extension, used when inlining image data.
    pub fn image_media_type(path: &Path) -> &'static str {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "png" => "image/png",
            "webp" => "image/webp",
            "gif" => "image/gif",
            "heic" => "image/heic",
            _ => "image/jpeg",
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Finder-style tag colours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagColor {
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
    Purple,
    Gray,
}

impl TagColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Red => "Red",
            Self::Orange => "Orange",
            Self::Yellow => "Yellow",
            Self::Green => "Green",
            Self::Blue => "Blue",
            Self::Purple => "Purple",
            Self::Gray => "Gray",
        }
    }

    /// Finder `label index` for this colour.
    pub fn finder_label_index(&self) -> u8 {
        match self {
            Self::Orange => 1,
            Self::Red => 2,
            Self::Yellow => 3,
            Self::Blue => 4,
            Self::Purple => 5,
            Self::Green => 6,
            Self::Gray => 7,
        }
    }
}

impl TagColor {
    /// Colour number stored with a Finder user tag
    /// (`com.apple.metadata:_kMDItemUserTags`).
    pub fn user_tag_index(&self) -> u8 {
        match self {
            Self::Gray => 1,
            Self::Green => 2,
            Self::Purple => 3,
            Self::Blue => 4,
            Self::Yellow => 5,
            Self::Red => 6,
            Self::Orange => 7,
        }
    }
}

impl std::fmt::Display for TagColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
