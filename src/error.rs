//! Centralized error types for famarchive.

use std::path::PathBuf;
use thiserror::Error;

use crate::sync::session::UploadPhase;

/// Errors returned by the external collaborators (catalog, blob store).
#[derive(Error, Debug)]
pub enum BackendError {
    /// The store could not be reached or refused the request.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The addressed record or blob does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A blob or record already exists at the requested location.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The request did not complete within its deadline.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The request or the stored data could not be interpreted.
    #[error("malformed: {0}")]
    Malformed(String),

    /// Local I/O failure (filesystem-backed stores).
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl BackendError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the same request may succeed if simply retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}

/// All errors produced by the famarchive library.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Querying or mutating the catalog failed. No partial result is returned.
    #[error("Could not sync archive items ({operation}): {source}")]
    SyncFailure {
        operation: &'static str,
        source: BackendError,
    },

    /// Writing a file to the blob store failed; the batch was aborted.
    #[error("Upload of '{file}' (file {} of batch) failed: {source}", .index + 1)]
    UploadFailure {
        file: String,
        index: usize,
        retryable: bool,
        source: BackendError,
    },

    /// The enrichment service did not return usable text.
    #[error("Enrichment failed: {reason}")]
    EnrichmentFailure { reason: String, retryable: bool },

    /// The atomic storage counter update failed. The displayed quota may
    /// drift until the next reload from the server.
    #[error("Storage quota update of {delta} bytes failed: {source}")]
    QuotaUpdateFailure { delta: i64, source: BackendError },

    /// One or more files exceed the per-file size cap.
    #[error("{} file(s) exceed the {limit_mb} MB limit: {}", .files.len(), .files.join(", "))]
    FilesTooLarge { files: Vec<String>, limit_mb: u64 },

    /// The combined size of a batch exceeds the per-item cap.
    #[error("Total file size for this item ({total} bytes) exceeds {limit} bytes")]
    ItemTooLarge { total: u64, limit: u64 },

    /// The record or the viewer is missing required data.
    #[error("Invalid archive item: {0}")]
    InvalidItem(String),

    /// The viewer attempted an owner-only operation.
    #[error("Only the owner can modify item {0}")]
    NotOwner(String),

    /// The referenced item does not exist.
    #[error("Archive item not found: {0}")]
    ItemNotFound(String),

    /// The user cancelled the operation.
    #[error("Operation cancelled during {phase}")]
    Cancelled { phase: UploadPhase },

    /// An upload session was driven through an illegal transition.
    #[error("Invalid upload session transition: {0}")]
    SessionState(String),

    /// An export operation failed.
    #[error("Export error: {0}")]
    Export(String),

    /// Configuration could not be used.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias for `Result<T, ArchiveError>`.
pub type Result<T> = std::result::Result<T, ArchiveError>;

impl ArchiveError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a catalog failure for the named operation.
    pub fn sync(operation: &'static str, source: BackendError) -> Self {
        Self::SyncFailure { operation, source }
    }

    /// Build an `EnrichmentFailure` that should not be retried.
    pub fn enrichment(reason: impl Into<String>) -> Self {
        Self::EnrichmentFailure {
            reason: reason.into(),
            retryable: false,
        }
    }

    /// Whether retrying the same operation may succeed (timeouts, outages).
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::UploadFailure { retryable, .. } | Self::EnrichmentFailure { retryable, .. } => {
                *retryable
            }
            Self::SyncFailure { source, .. } | Self::QuotaUpdateFailure { source, .. } => {
                source.is_transient()
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_files_too_large_names_every_file() {
        let err = ArchiveError::FilesTooLarge {
            files: vec!["scan.pdf".into(), "video.mp4".into()],
            limit_mb: 10,
        };
        let msg = err.to_string();
        assert!(msg.contains("scan.pdf"));
        assert!(msg.contains("video.mp4"));
        assert!(msg.contains("10 MB"));
    }

    #[test]
    fn test_upload_failure_reports_one_based_index() {
        let err = ArchiveError::UploadFailure {
            file: "b.jpg".into(),
            index: 1,
            retryable: true,
            source: BackendError::Timeout("put".into()),
        };
        assert!(err.to_string().contains("file 2 of batch"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_retryable_follows_backend_error() {
        let transient = ArchiveError::sync("owned items", BackendError::Unavailable("x".into()));
        assert!(transient.is_retryable());
        let permanent = ArchiveError::sync("owned items", BackendError::Malformed("x".into()));
        assert!(!permanent.is_retryable());
        assert!(!ArchiveError::enrichment("no candidates").is_retryable());
    }
}
