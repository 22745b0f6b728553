//! AI enrichment: document transcription and image description.
//!
//! The [`Enricher`] trait is the seam to the external generative-AI
//! endpoint. [`gemini::GeminiEnricher`] talks to it over HTTP/JSON;
//! [`DisabledEnricher`] is used when no API key is configured.

pub mod gemini;
pub mod timeouts;

use tracing::warn;

use crate::error::{ArchiveError, Result};
use crate::model::attachment::{ANALYSIS_FAILED_PREFIX, TRANSCRIPTION_FAILED_PREFIX};
use crate::model::{FileAttachment, FileKind};

/// Extracts or generates text for uploaded files.
///
/// Implementations are stateless and may be called concurrently.
pub trait Enricher: Send + Sync {
    /// Extract the text of a document.
    fn transcribe(&self, bytes: &[u8], mime_type: &str) -> Result<String>;

    /// Describe what an image shows.
    fn describe_image(&self, bytes: &[u8], mime_type: &str) -> Result<String>;
}

/// An enricher that always fails, so uploads record placeholders.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledEnricher;

impl Enricher for DisabledEnricher {
    fn transcribe(&self, _bytes: &[u8], _mime_type: &str) -> Result<String> {
        Err(ArchiveError::enrichment("enrichment disabled"))
    }

    fn describe_image(&self, _bytes: &[u8], _mime_type: &str) -> Result<String> {
        Err(ArchiveError::enrichment("enrichment disabled"))
    }
}

/// Whether `transcribe` can read the bytes directly instead of calling out.
pub fn is_plain_text(mime_type: &str) -> bool {
    mime_type
        .split(';')
        .next()
        .map(|m| m.trim().eq_ignore_ascii_case("text/plain"))
        .unwrap_or(false)
}

/// Decode plain text bytes, replacing invalid UTF-8.
pub fn decode_plain_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Run the enrichment matching the attachment's kind and record the result.
///
/// Failures never propagate: they are logged and stored as a placeholder
/// with the `has_*` flag left `false`.
pub fn enrich_attachment(
    enricher: &dyn Enricher,
    attachment: &mut FileAttachment,
    bytes: &[u8],
) {
    match attachment.kind() {
        FileKind::Document => match enricher.transcribe(bytes, &attachment.mime_type) {
            Ok(text) => {
                attachment.transcription = Some(text);
                attachment.has_transcription = true;
            }
            Err(e) => {
                warn!(file = %attachment.name, error = %e, "Transcription failed");
                attachment.transcription = Some(format!("{TRANSCRIPTION_FAILED_PREFIX}{}", reason(&e)));
                attachment.has_transcription = false;
            }
        },
        FileKind::Image => match enricher.describe_image(bytes, &attachment.mime_type) {
            Ok(text) => {
                attachment.ai_description = Some(text);
                attachment.has_ai_description = true;
            }
            Err(e) => {
                warn!(file = %attachment.name, error = %e, "Image analysis failed");
                attachment.ai_description = Some(format!("{ANALYSIS_FAILED_PREFIX}{}", reason(&e)));
                attachment.has_ai_description = false;
            }
        },
        FileKind::Video | FileKind::Other => {}
    }
}

fn reason(e: &ArchiveError) -> String {
    match e {
        ArchiveError::EnrichmentFailure { reason, .. } => reason.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    struct Fixed;

    impl Enricher for Fixed {
        fn transcribe(&self, bytes: &[u8], _mime_type: &str) -> Result<String> {
            Ok(format!("{} bytes of text", bytes.len()))
        }

        fn describe_image(&self, _bytes: &[u8], _mime_type: &str) -> Result<String> {
            Ok("A sepia portrait".into())
        }
    }

    fn attachment(name: &str, mime: &str) -> FileAttachment {
        FileAttachment {
            name: name.into(),
            mime_type: mime.into(),
            size: 3,
            url: String::new(),
            path: String::new(),
            uploaded_at: Utc::now(),
            transcription: None,
            has_transcription: false,
            ai_description: None,
            has_ai_description: false,
        }
    }

    #[test]
    fn test_plain_text_detection() {
        assert!(is_plain_text("text/plain"));
        assert!(is_plain_text("Text/Plain; charset=utf-8"));
        assert!(!is_plain_text("text/markdown"));
        assert!(!is_plain_text(""));
    }

    #[test]
    fn test_enrich_document_and_image() {
        let mut doc = attachment("a.pdf", "application/pdf");
        enrich_attachment(&Fixed, &mut doc, b"abc");
        assert_eq!(doc.transcription.as_deref(), Some("3 bytes of text"));
        assert!(doc.has_transcription);

        let mut img = attachment("a.jpg", "image/jpeg");
        enrich_attachment(&Fixed, &mut img, b"abc");
        assert_eq!(img.ai_description.as_deref(), Some("A sepia portrait"));
        assert!(img.has_ai_description);
        assert!(img.transcription.is_none());
    }

    #[test]
    fn test_enrichment_failure_records_placeholder() {
        let mut doc = attachment("a.pdf", "application/pdf");
        enrich_attachment(&DisabledEnricher, &mut doc, b"abc");
        assert!(!doc.has_transcription);
        assert_eq!(
            doc.transcription.as_deref(),
            Some("Transcription failed: enrichment disabled")
        );
        assert!(doc.transcription_text().is_none());

        let mut img = attachment("a.png", "image/png");
        enrich_attachment(&DisabledEnricher, &mut img, b"abc");
        assert!(!img.has_ai_description);
        assert_eq!(
            img.ai_description.as_deref(),
            Some("Analysis failed: enrichment disabled")
        );
    }

    #[test]
    fn test_video_is_left_alone() {
        let mut vid = attachment("a.mp4", "video/mp4");
        enrich_attachment(&DisabledEnricher, &mut vid, b"abc");
        assert!(vid.transcription.is_none());
        assert!(vid.ai_description.is_none());
    }
}
