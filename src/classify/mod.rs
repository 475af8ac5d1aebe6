//! Classifier adapter: turns extracted content into a validated
//! `(description, category)` pair.
//!
//! The model is asked for a JSON object `{"description", "category"}`.
//! Parsing is defensive: the first `{...}` span in the reply is decoded, and
//! when the reply carries no JSON object at all, the trimmed, lowercased raw
//! reply is used as the description with category `Other`. Either way the
//! description is validated before anything touches the filesystem.
//!
//! Failures are never retried here; one failed classification is terminal
//! for the file.

pub mod client;

use crate::error::ClassificationError;
use crate::extract::ExtractedContent;
use crate::filetype::{FileKind, OTHER_CATEGORY};

pub use client::{CompletionClient, CompletionContent, CompletionRequest, HttpCompletionClient};

/// Longest description accepted, in characters.
pub const MAX_DESCRIPTION_LEN: usize = 80;

/// Characters that would break a filename or a path.
const FORBIDDEN_CHARS: &[char] = &['{', '}', '[', ']', '/', '\\'];

/// A validated naming suggestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationResult {
    /// Lowercase words separated by single spaces.
    pub description: String,
    /// Member of the kind's closed category set.
    pub category: String,
}

impl ClassificationResult {
    /// Validate and normalise a raw suggestion for `kind`.
    ///
    /// The raw description is rejected when empty, when it contains any of
    /// `{ } [ ] / \`, or when longer than [`MAX_DESCRIPTION_LEN`]. Surviving
    /// text is lowercased, `_` and `-` become spaces, other punctuation is
    /// dropped and whitespace collapsed. Unknown categories become `Other`.
    pub fn validated(
        raw_description: &str,
        raw_category: &str,
        kind: FileKind,
    ) -> Result<Self, ClassificationError> {
        let raw = raw_description.trim();
        let invalid = |reason: &str| ClassificationError::InvalidDescription {
            description: raw.to_string(),
            reason: reason.to_string(),
        };

        if raw.is_empty() {
            return Err(invalid("description is empty"));
        }
        if let Some(c) = raw.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
            return Err(invalid(&format!("contains path-breaking character '{c}'")));
        }
        if raw.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(invalid(&format!(
                "longer than {MAX_DESCRIPTION_LEN} characters"
            )));
        }

        let description = normalize_description(raw);
        if description.is_empty() {
            return Err(invalid("no words left after normalisation"));
        }

        Ok(Self {
            description,
            category: kind.canonical_category(raw_category).to_string(),
        })
    }

    /// The description as individual words.
    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.description.split(' ')
    }
}

fn normalize_description(raw: &str) -> String {
    let cleaned: String = raw
        .to_lowercase()
        .chars()
        .map(|c| if c == '_' || c == '-' { ' ' } else { c })
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Per-kind prompt and category set.
#[derive(Debug, Clone)]
pub struct ClassifierProfile {
    pub kind: FileKind,
    pub system_prompt: String,
}

impl ClassifierProfile {
    pub fn for_kind(kind: FileKind) -> Self {
        let subject = match kind {
            FileKind::Image => "an image",
            FileKind::Pdf => "the first page of a PDF document",
            FileKind::Text => "a plain text file",
        };
        let system_prompt = format!(
            "You name files. You will be given {subject}. Reply with only a JSON object \
             of the form {{\"description\": \"...\", \"category\": \"...\"}}. \
             The description is 3 to 8 lowercase words that summarise the content, \
             with no punctuation and no underscores. \
             The category must be exactly one of: {}.",
            kind.categories().join(", ")
        );
        Self {
            kind,
            system_prompt,
        }
    }

    pub fn categories(&self) -> &'static [&'static str] {
        self.kind.categories()
    }
}

/// Anything that can name and categorise extracted content.
pub trait Classifier: Send + Sync {
    fn classify(
        &self,
        content: &ExtractedContent,
        profile: &ClassifierProfile,
    ) -> Result<ClassificationResult, ClassificationError>;
}

/// Parse a model reply into a validated result.
pub fn parse_response(
    response: &str,
    profile: &ClassifierProfile,
) -> Result<ClassificationResult, ClassificationError> {
    let trimmed = response.trim();

    let json_str = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(s), Some(e)) if e > s => Some(&trimmed[s..=e]),
        _ => None,
    };

    let Some(json_str) = json_str else {
        // Degraded mode: the reply is the filename itself.
        return ClassificationResult::validated(&trimmed.to_lowercase(), OTHER_CATEGORY, profile.kind);
    };

    let value: serde_json::Value =
        serde_json::from_str(json_str).map_err(|e| ClassificationError::Malformed {
            message: format!("JSON parse error: {e}"),
        })?;

    let description = value["description"]
        .as_str()
        .ok_or_else(|| ClassificationError::Malformed {
            message: "missing 'description' field".into(),
        })?;
    let category = value["category"].as_str().unwrap_or(OTHER_CATEGORY);

    ClassificationResult::validated(description, category, profile.kind)
}

/// Classifier backed by a completion service.
pub struct LlmClassifier<C> {
    client: C,
    text_model: String,
    vision_model: String,
}

impl<C: CompletionClient> LlmClassifier<C> {
    pub fn new(client: C, text_model: impl Into<String>, vision_model: impl Into<String>) -> Self {
        Self {
            client,
            text_model: text_model.into(),
            vision_model: vision_model.into(),
        }
    }

    fn request_for(&self, content: &ExtractedContent, profile: &ClassifierProfile) -> CompletionRequest {
        match content {
            ExtractedContent::Image { bytes, media_type } => CompletionRequest {
                model: self.vision_model.clone(),
                system: profile.system_prompt.clone(),
                content: CompletionContent::Image {
                    prompt: "Name this image.".into(),
                    media_type: media_type.clone(),
                    bytes: bytes.clone(),
                },
            },
            ExtractedContent::Text(text) => CompletionRequest {
                model: self.text_model.clone(),
                system: profile.system_prompt.clone(),
                content: CompletionContent::Text(format!("File content:\n{text}")),
            },
        }
    }
}

impl<C: CompletionClient> Classifier for LlmClassifier<C> {
    fn classify(
        &self,
        content: &ExtractedContent,
        profile: &ClassifierProfile,
    ) -> Result<ClassificationResult, ClassificationError> {
        let request = self.request_for(content, profile);
        let response = self.client.complete(&request)?;
        tracing::debug!(kind = %profile.kind, response = %response.trim(), "classifier replied");
        parse_response(&response, profile)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn text_profile() -> ClassifierProfile {
        ClassifierProfile::for_kind(FileKind::Text)
    }

    #[test]
    fn valid_description_is_normalised() {
        let result =
            ClassificationResult::validated("Q3 Roadmap_Discussion, meeting-notes!", "notes", FileKind::Text)
                .unwrap();
        assert_eq!(result.description, "q3 roadmap discussion meeting notes");
        assert_eq!(result.category, "Notes");
        assert_eq!(result.words().count(), 5);
    }

    #[test]
    fn empty_description_is_invalid() {
        for raw in ["", "   ", "!!!"] {
            assert!(
                ClassificationResult::validated(raw, "Notes", FileKind::Text).is_err(),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn path_breaking_characters_are_invalid() {
        for raw in ["a/b", "a\\b", "{x}", "[draft] notes", "notes]"] {
            let err = ClassificationResult::validated(raw, "Notes", FileKind::Text).unwrap_err();
            assert!(matches!(err, ClassificationError::InvalidDescription { .. }));
        }
    }

    #[test]
    fn overlong_description_is_invalid() {
        let raw = "word ".repeat(20);
        assert!(raw.trim().chars().count() > MAX_DESCRIPTION_LEN);
        assert!(ClassificationResult::validated(&raw, "Notes", FileKind::Text).is_err());

        let at_limit = "a".repeat(MAX_DESCRIPTION_LEN);
        assert!(ClassificationResult::validated(&at_limit, "Notes", FileKind::Text).is_ok());
    }

    #[test]
    fn unknown_category_falls_back_to_other() {
        let result = ClassificationResult::validated("cat on sofa", "Invoice", FileKind::Image).unwrap();
        assert_eq!(result.category, "Other");
    }

    #[test]
    fn parse_plain_json() {
        let result = parse_response(
            r#"{"description": "q3 roadmap discussion meeting notes", "category": "Notes"}"#,
            &text_profile(),
        )
        .unwrap();
        assert_eq!(result.description, "q3 roadmap discussion meeting notes");
        assert_eq!(result.category, "Notes");
    }

    #[test]
    fn parse_json_inside_code_fence() {
        let reply = "Sure!\n```json\n{\"description\": \"grocery list\", \"category\": \"List\"}\n```";
        let result = parse_response(reply, &text_profile()).unwrap();
        assert_eq!(result.description, "grocery list");
        assert_eq!(result.category, "List");
    }

    #[test]
    fn parse_raw_filename_fallback() {
        let result = parse_response("  Grocery List For Saturday \n", &text_profile()).unwrap();
        assert_eq!(result.description, "grocery list for saturday");
        assert_eq!(result.category, "Other");
    }

    #[test]
    fn raw_fallback_still_validates() {
        assert!(parse_response("notes/2024", &text_profile()).is_err());
        assert!(parse_response("", &text_profile()).is_err());
    }

    #[test]
    fn json_without_description_is_malformed() {
        let err = parse_response(r#"{"category": "Notes"}"#, &text_profile()).unwrap_err();
        assert!(matches!(err, ClassificationError::Malformed { .. }));
    }

    #[test]
    fn broken_json_is_malformed() {
        let err = parse_response(r#"{"description": "x", }"#, &text_profile()).unwrap_err();
        assert!(matches!(err, ClassificationError::Malformed { .. }));
    }

    #[test]
    fn profile_lists_categories() {
        let profile = ClassifierProfile::for_kind(FileKind::Pdf);
        assert!(profile.system_prompt.contains("Invoice"));
        assert!(profile.system_prompt.contains("Other"));
        assert_eq!(profile.categories(), FileKind::Pdf.categories());
    }

    struct RecordingClient {
        reply: Result<String, String>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl CompletionClient for RecordingClient {
        fn complete(&self, request: &CompletionRequest) -> Result<String, ClassificationError> {
            self.seen.lock().unwrap().push(request.clone());
            self.reply
                .clone()
                .map_err(|message| ClassificationError::Upstream { message })
        }
    }

    #[test]
    fn llm_classifier_routes_images_to_vision_model() {
        let client = RecordingClient {
            reply: Ok(r#"{"description": "sunset over lake", "category": "Photo"}"#.into()),
            seen: Mutex::new(Vec::new()),
        };
        let classifier = LlmClassifier::new(client, "text-model", "vision-model");
        let content = ExtractedContent::Image {
            bytes: vec![1, 2, 3],
            media_type: "image/png".into(),
        };
        let result = classifier
            .classify(&content, &ClassifierProfile::for_kind(FileKind::Image))
            .unwrap();
        assert_eq!(result.category, "Photo");

        let seen = classifier.client.seen.lock().unwrap();
        assert_eq!(seen[0].model, "vision-model");
        assert!(matches!(seen[0].content, CompletionContent::Image { .. }));
    }

    #[test]
    fn llm_classifier_propagates_upstream_failure() {
        let client = RecordingClient {
            reply: Err("503 service unavailable".into()),
            seen: Mutex::new(Vec::new()),
        };
        let classifier = LlmClassifier::new(client, "text-model", "vision-model");
        let err = classifier
            .classify(&ExtractedContent::Text("hello".into()), &text_profile())
            .unwrap_err();
        assert!(matches!(err, ClassificationError::Upstream { .. }));
        assert_eq!(classifier.client.seen.lock().unwrap()[0].model, "text-model");
    }
}
