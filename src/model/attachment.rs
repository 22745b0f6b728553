//! File attachments and their classification.
//!
//! Attachment bytes never live in the catalog: a record only carries the
//! blob store `path` (used for deletion) and a retrieval `url`.

use chrono::{DateTime, Utc};

/// Placeholder prefix recorded when document transcription fails.
pub const TRANSCRIPTION_FAILED_PREFIX: &str = "Transcription failed: ";

/// Placeholder prefix recorded when image description fails.
pub const ANALYSIS_FAILED_PREFIX: &str = "Analysis failed: ";

/// One uploaded file bound to an archive item.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAttachment {
    /// Original file name.
    pub name: String,

    /// MIME type reported at upload time (may be empty).
    #[serde(rename = "type")]
    pub mime_type: String,

    /// Size in bytes. Counted exactly once in the owner's `storage_used`.
    pub size: u64,

    /// Retrieval URL returned by the blob store.
    pub url: String,

    /// Blob store location, used for deletion.
    pub path: String,

    /// When the upload finished.
    pub uploaded_at: DateTime<Utc>,

    /// Extracted text for documents, or a failure placeholder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcription: Option<String>,

    /// `true` only if `transcription` holds real extracted text.
    #[serde(default)]
    pub has_transcription: bool,

    /// Generated description for images, or a failure placeholder.
    #[serde(default, rename = "aiDescription", skip_serializing_if = "Option::is_none")]
    pub ai_description: Option<String>,

    /// `true` only if `ai_description` holds a real description.
    #[serde(default, rename = "hasAIDescription")]
    pub has_ai_description: bool,
}

impl FileAttachment {
    /// Classify this attachment by its MIME type and name.
    pub fn kind(&self) -> FileKind {
        FileKind::classify(&self.mime_type, &self.name)
    }

    /// Successful transcription text, ignoring failure placeholders.
    pub fn transcription_text(&self) -> Option<&str> {
        if self.has_transcription {
            self.transcription.as_deref()
        } else {
            None
        }
    }
}

/// What kind of content a file holds, which decides how it is enriched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// PDFs, Word files, RTF and any `text/*` content: transcribed.
    Document,
    /// `image/*`: described.
    Image,
    /// `video/*`: stored as-is.
    Video,
    /// Anything else: stored as-is.
    Other,
}

const DOCUMENT_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/rtf",
];

const DOCUMENT_EXTENSIONS: &[&str] = &["txt", "md", "pdf", "doc", "docx"];

impl FileKind {
    /// Classify a file from its MIME type, falling back to the name suffix.
    pub fn classify(mime_type: &str, name: &str) -> Self {
        let mime = mime_type.trim().to_ascii_lowercase();

        if DOCUMENT_MIME_TYPES.contains(&mime.as_str()) || mime.starts_with("text/") {
            return Self::Document;
        }
        if mime.starts_with("image/") {
            return Self::Image;
        }
        if mime.starts_with("video/") {
            return Self::Video;
        }

        match extension(name) {
            Some(ext) if DOCUMENT_EXTENSIONS.contains(&ext.as_str()) => Self::Document,
            _ => Self::Other,
        }
    }
}

/// Lowercased extension of a file name, without the dot.
fn extension(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Best-effort MIME type from a file name, for callers that only have a path.
///
/// Returns `"application/octet-stream"` for unknown extensions.
pub fn guess_mime_type(name: &str) -> &'static str {
    match extension(name).as_deref() {
        Some("txt") => "text/plain",
        Some("md") => "text/markdown",
        Some("html" | "htm") => "text/html",
        Some("pdf") => "application/pdf",
        Some("doc") => "application/msword",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        Some("rtf") => "application/rtf",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        Some("tif" | "tiff") => "image/tiff",
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        _ => "application/octet-stream",
    }
}

/// A file selected for upload, not yet stored.
#[derive(Debug, Clone)]
pub struct PendingFile {
    /// Original file name.
    pub name: String,
    /// MIME type (may be empty if unknown).
    pub mime_type: String,
    /// Full file content.
    pub bytes: Vec<u8>,
}

impl PendingFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, guessing its MIME type from the extension.
    pub fn from_path(path: &std::path::Path) -> crate::error::Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| crate::error::ArchiveError::io(path, e))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        let mime_type = guess_mime_type(&name).to_string();
        Ok(Self {
            name,
            mime_type,
            bytes,
        })
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn kind(&self) -> FileKind {
        FileKind::classify(&self.mime_type, &self.name)
    }
}
