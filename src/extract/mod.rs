//! Plain-text extraction from stored evidence artifacts.

pub mod formats;
pub mod normalize;

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use crate::config::EvaluationSettings;
use crate::errors::AttestError;

pub use formats::DocumentKind;
pub use normalize::{fit_to_cap, normalize_line_endings};

/// Below this many characters a document is treated as unreadable.
pub const MIN_TEXT_CHARS: usize = 50;

#[derive(Debug, Clone)]
pub struct TextExtractor {
    media_root: PathBuf,
    text_char_cap: usize,
    cross_document_char_cap: usize,
}

impl TextExtractor {
    pub fn new(media_root: impl Into<PathBuf>, settings: &EvaluationSettings) -> Self {
        Self {
            media_root: media_root.into(),
            text_char_cap: settings.text_char_cap,
            cross_document_char_cap: settings.cross_document_char_cap,
        }
    }

    pub fn text_char_cap(&self) -> usize {
        self.text_char_cap
    }

    pub fn cross_document_char_cap(&self) -> usize {
        self.cross_document_char_cap
    }

    /// Absolute paths are used as-is; anything else is under the media root.
    pub fn resolve_path(&self, stored_path: &str) -> PathBuf {
        let path = Path::new(stored_path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.media_root.join(path)
        }
    }

    /// Full normalized text of an artifact. Unknown formats yield an empty
    /// string; only a missing or unreadable file is an error.
    pub async fn extract(&self, stored_path: &str, mime_type: &str) -> Result<String, AttestError> {
        let path = self.resolve_path(stored_path);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(AttestError::ExtractionFailed(format!("file not found: {}", path.display())));
        }

        let kind = DocumentKind::detect(mime_type, &path);
        let bytes = tokio::fs::read(&path).await
            .map_err(|e| AttestError::ExtractionFailed(format!("cannot read {}: {}", path.display(), e)))?;

        let raw = match kind {
            DocumentKind::PlainText => formats::plain_text(&bytes),
            DocumentKind::Pdf => formats::pdf_text(bytes).await?,
            DocumentKind::Docx => formats::docx_text(bytes).await?,
            DocumentKind::Unknown => {
                warn!(path = %path.display(), mime_type, "Unsupported evidence type, no text extracted");
                String::new()
            }
        };

        let text = normalize_line_endings(&raw);
        debug!(path = %path.display(), kind = kind.as_str(), chars = text.chars().count(), "Extracted text");
        Ok(text)
    }

    /// Text for a single-document evaluation prompt: at least
    /// `MIN_TEXT_CHARS` of content, fitted to the per-call cap.
    pub async fn extract_for_evaluation(&self, stored_path: &str, mime_type: &str) -> Result<String, AttestError> {
        let text = self.extract(stored_path, mime_type).await?;
        require_substantive(&text)?;
        Ok(fit_to_cap(&text, self.text_char_cap))
    }

    /// Text for two-document comparisons, which get the larger cap.
    pub async fn extract_for_comparison(&self, stored_path: &str, mime_type: &str) -> Result<String, AttestError> {
        let text = self.extract(stored_path, mime_type).await?;
        Ok(fit_to_cap(&text, self.cross_document_char_cap))
    }
}

/// Reject documents with too little text to be worth a model call.
pub fn require_substantive(text: &str) -> Result<(), AttestError> {
    let meaningful = text.chars().filter(|c| !c.is_whitespace()).count();
    if meaningful < MIN_TEXT_CHARS {
        return Err(AttestError::ExtractionFailed(format!(
            "insufficient extractable text ({} characters, need {})",
            meaningful, MIN_TEXT_CHARS
        )));
    }
    Ok(())
}
