//! Batch upload: validate, store each file, enrich it, then charge the
//! storage counter once for the whole batch.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::enrich::enrich_attachment;
use crate::error::{ArchiveError, Result};
use crate::model::{FileAttachment, FileKind, PendingFile, Viewer};

use super::session::{ProgressFn, UploadSession, UploadState};
use super::{blob_path, SyncLimits, Synchronizer};

const MB: u64 = 1024 * 1024;

/// Result of a successful batch upload.
#[derive(Debug)]
pub struct UploadOutcome {
    /// One attachment per input file, in input order.
    pub attachments: Vec<FileAttachment>,
    /// Sum of the attachment sizes.
    pub bytes_added: u64,
    /// Set when the blobs were stored but the counter update failed. The
    /// attachments are still valid; the displayed quota may lag until the
    /// next reload.
    pub quota_error: Option<ArchiveError>,
}

/// Check a batch against the size caps without touching any collaborator.
///
/// Every oversized file is named in the error, not just the first one.
pub fn validate_files(files: &[PendingFile], limits: SyncLimits) -> Result<()> {
    let oversized: Vec<String> = files
        .iter()
        .filter(|f| f.size() > limits.max_file_size)
        .map(|f| f.name.clone())
        .collect();
    if !oversized.is_empty() {
        return Err(ArchiveError::FilesTooLarge {
            files: oversized,
            limit_mb: limits.max_file_size / MB,
        });
    }

    let empty: Vec<&str> = files
        .iter()
        .filter(|f| f.size() == 0)
        .map(|f| f.name.as_str())
        .collect();
    if !empty.is_empty() {
        return Err(ArchiveError::InvalidItem(format!(
            "empty file(s): {}",
            empty.join(", ")
        )));
    }

    let total: u64 = files.iter().map(PendingFile::size).sum();
    if total > limits.max_item_upload {
        return Err(ArchiveError::ItemTooLarge {
            total,
            limit: limits.max_item_upload,
        });
    }
    Ok(())
}

impl Synchronizer<'_> {
    /// Upload a batch of files for `viewer`.
    ///
    /// Files are validated first; an oversized file rejects the whole batch
    /// before any blob is written. Files are then stored and enriched one at
    /// a time in input order. A storage failure aborts the batch (blobs
    /// already written stay in the store and are logged). After the last
    /// file the counter is incremented once by the batch total.
    ///
    /// `progress` observes every state change and may return `false` to
    /// cancel at the next file boundary.
    pub fn record_upload(
        &self,
        viewer: &Viewer,
        files: &[PendingFile],
        progress: Option<ProgressFn<'_>>,
    ) -> Result<UploadOutcome> {
        viewer.validate()?;

        let mut session = UploadSession::new(progress);
        let outcome = self.upload_batch(viewer, files, &mut session)?;
        session.advance(UploadState::Done)?;
        Ok(outcome)
    }

    /// The upload steps shared by [`record_upload`](Self::record_upload) and
    /// `save_item`. Leaves the session in `UpdatingQuota`, or in
    /// `ValidatingFiles` for an empty batch.
    ///
    /// Size checks run before any collaborator is called; the user record is
    /// only touched once there is something to store.
    pub(crate) fn upload_batch(
        &self,
        viewer: &Viewer,
        files: &[PendingFile],
        session: &mut UploadSession<'_>,
    ) -> Result<UploadOutcome> {
        session.advance(UploadState::ValidatingFiles)?;
        if let Err(e) = validate_files(files, self.limits) {
            warn!(user = %viewer.id, error = %e, "Rejected upload batch");
            session.fail(&e);
            return Err(e);
        }

        if files.is_empty() {
            return Ok(UploadOutcome {
                attachments: Vec::new(),
                bytes_added: 0,
                quota_error: None,
            });
        }

        if let Err(e) = self.ensure_account(viewer) {
            session.fail(&e);
            return Err(e);
        }

        let total = files.len();
        let batch_millis = Utc::now().timestamp_millis();
        let mut attachments = Vec::with_capacity(total);
        let mut stored_paths: Vec<String> = Vec::with_capacity(total);

        for (index, file) in files.iter().enumerate() {
            if let Err(e) = session.advance(UploadState::UploadingFile {
                index,
                total,
                name: file.name.clone(),
            }) {
                log_abandoned(&stored_paths);
                return Err(e);
            }

            let path = blob_path(&viewer.id, batch_millis, index, &file.name);
            let stored = match self.blobs.put(&path, &file.bytes) {
                Ok(stored) => stored,
                Err(source) => {
                    let err = ArchiveError::UploadFailure {
                        file: file.name.clone(),
                        index,
                        retryable: source.is_transient(),
                        source,
                    };
                    warn!(user = %viewer.id, error = %err, "Upload batch aborted");
                    session.fail(&err);
                    log_abandoned(&stored_paths);
                    return Err(err);
                }
            };
            debug!(file = %file.name, path = %stored.path, bytes = file.size(), "Stored blob");
            stored_paths.push(stored.path.clone());

            let mut attachment = FileAttachment {
                name: file.name.clone(),
                mime_type: file.mime_type.clone(),
                size: file.size(),
                url: stored.url,
                path: stored.path,
                uploaded_at: Utc::now(),
                transcription: None,
                has_transcription: false,
                ai_description: None,
                has_ai_description: false,
            };

            let enrich_state = match file.kind() {
                FileKind::Document => Some(UploadState::Transcribing {
                    index,
                    total,
                    name: file.name.clone(),
                }),
                FileKind::Image => Some(UploadState::Describing {
                    index,
                    total,
                    name: file.name.clone(),
                }),
                FileKind::Video | FileKind::Other => None,
            };
            if let Some(state) = enrich_state {
                if let Err(e) = session.advance(state) {
                    log_abandoned(&stored_paths);
                    return Err(e);
                }
                enrich_attachment(self.enricher, &mut attachment, &file.bytes);
            }

            attachments.push(attachment);
        }

        let bytes_added: u64 = attachments.iter().map(|a| a.size).sum();
        session.advance(UploadState::UpdatingQuota)?;
        let quota_error = self.charge_storage(viewer, bytes_added);

        info!(
            user = %viewer.id,
            files = attachments.len(),
            bytes = bytes_added,
            "Upload batch stored"
        );
        Ok(UploadOutcome {
            attachments,
            bytes_added,
            quota_error,
        })
    }

    /// Apply one atomic counter adjustment. Failures are logged and handed
    /// back instead of undoing work that already succeeded.
    pub(crate) fn adjust_storage(&self, viewer: &Viewer, delta: i64) -> Option<ArchiveError> {
        match self.catalog.adjust_storage_used(&viewer.id, delta) {
            Ok(used) => {
                debug!(user = %viewer.id, delta, storage_used = used, "Adjusted storage counter");
                None
            }
            Err(source) => {
                let err = ArchiveError::QuotaUpdateFailure { delta, source };
                warn!(user = %viewer.id, error = %err, "Storage counter is out of date");
                Some(err)
            }
        }
    }

    fn charge_storage(&self, viewer: &Viewer, bytes: u64) -> Option<ArchiveError> {
        if bytes == 0 {
            return None;
        }
        self.adjust_storage(viewer, i64::try_from(bytes).unwrap_or(i64::MAX))
    }
}

fn log_abandoned(paths: &[String]) {
    if !paths.is_empty() {
        warn!(
            count = paths.len(),
            paths = ?paths,
            "Blobs from the aborted batch were left in storage"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> SyncLimits {
        SyncLimits {
            max_file_size: 100,
            max_item_upload: 150,
        }
    }

    fn file(name: &str, size: usize) -> PendingFile {
        PendingFile::new(name, "application/octet-stream", vec![b'x'; size])
    }

    #[test]
    fn test_validate_accepts_within_limits() {
        assert!(validate_files(&[file("a", 100), file("b", 50)], limits()).is_ok());
        assert!(validate_files(&[], limits()).is_ok());
    }

    #[test]
    fn test_validate_names_every_oversized_file() {
        let err = validate_files(&[file("a", 101), file("b", 10), file("c", 200)], limits())
            .unwrap_err();
        match err {
            ArchiveError::FilesTooLarge { files, .. } => assert_eq!(files, vec!["a", "c"]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_empty_and_total() {
        assert!(matches!(
            validate_files(&[file("a", 0)], limits()),
            Err(ArchiveError::InvalidItem(_))
        ));
        assert!(matches!(
            validate_files(&[file("a", 100), file("b", 100)], limits()),
            Err(ArchiveError::ItemTooLarge {
                total: 200,
                limit: 150
            })
        ));
    }
}
