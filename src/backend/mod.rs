//! Contracts for the external collaborators: the document catalog and the
//! blob store.
//!
//! The archive never implements a real database or object store. Production
//! deployments plug in a managed service behind these traits; the crate ships
//! an in-memory pair ([`memory`]) and a local filesystem pair ([`local`]).

pub mod local;
pub mod memory;

use crate::error::BackendError;
use crate::model::{ArchiveItem, FileAttachment, ItemDraft, UserAccount};

/// Result type for collaborator calls.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Everything the catalog needs to create an item. The catalog assigns the
/// id and both timestamps.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub owner_id: String,
    pub owner_email: String,
    pub draft: ItemDraft,
    pub files: Vec<FileAttachment>,
}

/// A partial update. Owner fields are never part of an update.
#[derive(Debug, Clone, Default)]
pub struct ItemUpdate {
    /// Replacement metadata, if any.
    pub draft: Option<ItemDraft>,
    /// Attachments appended after the existing ones.
    pub append_files: Vec<FileAttachment>,
}

/// Where a blob ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub path: String,
    pub url: String,
}

/// The document database holding `archiveItems` and `users`.
pub trait CatalogStore: Send + Sync {
    /// Items whose `owner_id` equals `owner_id`, newest `created_at` first.
    fn items_owned_by(&self, owner_id: &str) -> BackendResult<Vec<ArchiveItem>>;

    /// Items whose `shared_with` contains `email`, newest `created_at` first.
    fn items_shared_with(&self, email: &str) -> BackendResult<Vec<ArchiveItem>>;

    fn get_item(&self, id: &str) -> BackendResult<Option<ArchiveItem>>;

    /// Create an item and return its new id.
    fn create_item(&self, item: NewItem) -> BackendResult<String>;

    /// Apply a partial update and bump `updated_at`.
    fn update_item(&self, id: &str, update: ItemUpdate) -> BackendResult<()>;

    fn delete_item(&self, id: &str) -> BackendResult<()>;

    fn get_user(&self, id: &str) -> BackendResult<Option<UserAccount>>;

    /// Create the user record with `storage_used = 0` if it does not exist.
    fn ensure_user(&self, id: &str, email: &str) -> BackendResult<UserAccount>;

    /// Atomically add `delta` (which may be negative) to the user's
    /// `storage_used`, clamping at zero, and return the new value.
    ///
    /// This is a single store-side operation, never a read followed by a
    /// write from the client.
    fn adjust_storage_used(&self, user_id: &str, delta: i64) -> BackendResult<u64>;
}

/// Path-addressed file storage.
pub trait BlobStore: Send + Sync {
    /// Store `bytes` at `path`. Fails with [`BackendError::AlreadyExists`]
    /// if something is already stored there.
    fn put(&self, path: &str, bytes: &[u8]) -> BackendResult<StoredBlob>;

    fn delete(&self, path: &str) -> BackendResult<()>;
}

/// Sort newest first by `created_at`, treating a missing timestamp as 0.
///
/// Used by the bundled stores to honour the `orderBy createdAt desc` contract.
pub(crate) fn sort_newest_first(items: &mut [ArchiveItem]) {
    items.sort_by(|a, b| b.created_millis().cmp(&a.created_millis()));
}

/// Turn a draft plus server-assigned fields into a stored item.
pub(crate) fn materialize(
    id: String,
    new: NewItem,
    now: chrono::DateTime<chrono::Utc>,
) -> ArchiveItem {
    let NewItem {
        owner_id,
        owner_email,
        draft,
        files,
    } = new;
    ArchiveItem {
        id,
        owner_id,
        owner_email,
        title: draft.title,
        item_type: draft.item_type,
        category: draft.category,
        description: draft.description,
        transcription: draft.transcription,
        related_date: draft.related_date,
        physical_location: draft.physical_location,
        shared_with: draft.shared_with,
        files,
        created_at: Some(now),
        updated_at: Some(now),
    }
}

/// Apply a partial update in place.
pub(crate) fn apply_update(
    item: &mut ArchiveItem,
    update: ItemUpdate,
    now: chrono::DateTime<chrono::Utc>,
) {
    if let Some(draft) = update.draft {
        item.title = draft.title;
        item.item_type = draft.item_type;
        item.category = draft.category;
        item.description = draft.description;
        item.transcription = draft.transcription;
        item.related_date = draft.related_date;
        item.physical_location = draft.physical_location;
        item.shared_with = draft.shared_with;
    }
    item.files.extend(update.append_files);
    item.updated_at = Some(match item.created_at {
        Some(created) if created > now => created,
        _ => now,
    });
}

/// Add a signed delta to a counter, clamping at zero.
pub(crate) fn clamped_add(current: u64, delta: i64) -> u64 {
    if delta >= 0 {
        current.saturating_add(delta as u64)
    } else {
        current.saturating_sub(delta.unsigned_abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamped_add() {
        assert_eq!(clamped_add(100, 50), 150);
        assert_eq!(clamped_add(100, -40), 60);
        assert_eq!(clamped_add(100, -600), 0);
        assert_eq!(clamped_add(u64::MAX, 1), u64::MAX);
        assert_eq!(clamped_add(0, i64::MIN), 0);
    }
}
