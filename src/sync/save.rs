//! Create or update an item together with its new attachments.

use tracing::{info, warn};

use crate::backend::{ItemUpdate, NewItem};
use crate::error::{ArchiveError, Result};
use crate::model::{ArchiveItem, FileAttachment, ItemDraft, PendingFile, Viewer};

use super::session::{ProgressFn, UploadSession, UploadState};
use super::Synchronizer;

/// The result of [`Synchronizer::save_item`].
#[derive(Debug)]
pub struct SavedItem {
    pub id: String,
    /// `true` when a new record was created.
    pub created: bool,
    /// Attachments added by this save.
    pub attachments: Vec<FileAttachment>,
    pub bytes_added: u64,
    /// Set when the counter update failed after the blobs were stored.
    pub quota_error: Option<ArchiveError>,
}

/// Append each successful transcription to `existing` as a
/// `--- {file name} ---` block. Blocks are separated by a blank line.
pub fn append_transcriptions(existing: &str, attachments: &[FileAttachment]) -> String {
    let mut out = existing.trim_end().to_string();
    for attachment in attachments {
        let Some(text) = attachment.transcription_text() else {
            continue;
        };
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(&format!("--- {} ---\n{}", attachment.name, text.trim()));
    }
    out
}

impl Synchronizer<'_> {
    /// Save an item and upload its new files in one session.
    ///
    /// With `existing = None` a record is created owned by `viewer`;
    /// otherwise the viewer must own `existing`, its metadata is replaced by
    /// `draft` and the new attachments are appended after the old ones.
    ///
    /// The record is persisted only after every file was stored and the
    /// counter was charged.
    pub fn save_item(
        &self,
        viewer: &Viewer,
        draft: ItemDraft,
        existing: Option<&ArchiveItem>,
        files: &[PendingFile],
        progress: Option<ProgressFn<'_>>,
    ) -> Result<SavedItem> {
        viewer.validate()?;
        let mut draft = draft.normalized()?;
        if let Some(item) = existing {
            if !item.is_owned_by(viewer) {
                return Err(ArchiveError::NotOwner(item.id.clone()));
            }
        }

        let mut session = UploadSession::new(progress);
        let outcome = self.upload_batch(viewer, files, &mut session)?;
        draft.transcription = append_transcriptions(&draft.transcription, &outcome.attachments);

        session.advance(UploadState::PersistingRecord)?;
        let persisted = match existing {
            None => self.catalog.create_item(NewItem {
                owner_id: viewer.id.clone(),
                owner_email: viewer.email.clone(),
                draft,
                files: outcome.attachments.clone(),
            }),
            Some(item) => self
                .catalog
                .update_item(
                    &item.id,
                    ItemUpdate {
                        draft: Some(draft),
                        append_files: outcome.attachments.clone(),
                    },
                )
                .map(|()| item.id.clone()),
        };

        let id = match persisted {
            Ok(id) => id,
            Err(source) => {
                let err = ArchiveError::sync("save item", source);
                if outcome.bytes_added > 0 {
                    warn!(
                        user = %viewer.id,
                        bytes = outcome.bytes_added,
                        "Files were stored and counted but the item was not saved"
                    );
                }
                session.fail(&err);
                return Err(err);
            }
        };
        session.advance(UploadState::Done)?;

        info!(
            item = %id,
            created = existing.is_none(),
            files = outcome.attachments.len(),
            "Saved archive item"
        );
        Ok(SavedItem {
            id,
            created: existing.is_none(),
            attachments: outcome.attachments,
            bytes_added: outcome.bytes_added,
            quota_error: outcome.quota_error,
        })
    }
}
