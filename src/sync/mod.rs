//! The item synchronizer: merges the owned and shared query results into
//! one view, uploads and enriches attachments, keeps the per-user storage
//! counter consistent, and persists records.
//!
//! All operations are synchronous and talk to the collaborators through
//! the [`CatalogStore`], [`BlobStore`] and [`Enricher`] traits.

pub mod delete;
pub mod save;
pub mod session;
pub mod upload;
pub mod view;

use std::collections::HashSet;

use tracing::debug;

use crate::backend::{BlobStore, CatalogStore};
use crate::enrich::Enricher;
use crate::error::{ArchiveError, Result};
use crate::model::{ArchiveItem, StorageQuota, Viewer, VisibleItem};

pub use delete::DeletionReport;
pub use save::SavedItem;
pub use session::{ProgressFn, UploadPhase, UploadSession, UploadState};
pub use upload::UploadOutcome;
pub use view::ArchiveView;

/// Size caps enforced before anything is uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncLimits {
    /// Per-file cap in bytes.
    pub max_file_size: u64,
    /// Cap on the combined size of one batch in bytes.
    pub max_item_upload: u64,
}

impl Default for SyncLimits {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024,
            max_item_upload: 50 * 1024 * 1024,
        }
    }
}

/// Borrowing handle over the three collaborators.
///
/// Cheap to construct; the CLI builds one per command and tests build one
/// per scenario.
pub struct Synchronizer<'a> {
    catalog: &'a dyn CatalogStore,
    blobs: &'a dyn BlobStore,
    enricher: &'a dyn Enricher,
    limits: SyncLimits,
}

impl<'a> Synchronizer<'a> {
    pub fn new(
        catalog: &'a dyn CatalogStore,
        blobs: &'a dyn BlobStore,
        enricher: &'a dyn Enricher,
        limits: SyncLimits,
    ) -> Self {
        Self {
            catalog,
            blobs,
            enricher,
            limits,
        }
    }

    pub fn limits(&self) -> SyncLimits {
        self.limits
    }

    /// Every item the viewer may see, tagged with ownership and sorted
    /// newest first.
    ///
    /// Both catalog queries must succeed; if either fails the whole load
    /// fails with [`ArchiveError::SyncFailure`] and no partial list is
    /// returned.
    pub fn load_visible_items(&self, viewer: &Viewer) -> Result<Vec<VisibleItem>> {
        viewer.validate()?;

        let owned = self
            .catalog
            .items_owned_by(&viewer.id)
            .map_err(|e| ArchiveError::sync("owned items query", e))?;
        let shared = self
            .catalog
            .items_shared_with(&viewer.email)
            .map_err(|e| ArchiveError::sync("shared items query", e))?;

        let (owned_count, shared_count) = (owned.len(), shared.len());
        let items = merge_visible(owned, shared);
        debug!(
            user = %viewer.id,
            owned = owned_count,
            shared = shared_count,
            visible = items.len(),
            "Loaded archive items"
        );
        Ok(items)
    }

    /// Look up one item the viewer can see.
    pub fn visible_item(&self, viewer: &Viewer, id: &str) -> Result<VisibleItem> {
        viewer.validate()?;
        let item = self
            .catalog
            .get_item(id)
            .map_err(|e| ArchiveError::sync("item lookup", e))?
            .ok_or_else(|| ArchiveError::ItemNotFound(id.to_string()))?;
        if !item.is_owned_by(viewer) && !item.is_shared_with(&viewer.email) {
            // Hidden items look the same as missing ones.
            return Err(ArchiveError::ItemNotFound(id.to_string()));
        }
        let is_owner = item.is_owned_by(viewer);
        Ok(VisibleItem { item, is_owner })
    }

    /// The viewer's storage counter as stored on the server, creating the
    /// user record on first use.
    pub fn storage_used(&self, viewer: &Viewer) -> Result<u64> {
        viewer.validate()?;
        let account = self
            .catalog
            .ensure_user(&viewer.id, &viewer.email)
            .map_err(|e| ArchiveError::sync("user record", e))?;
        Ok(account.storage_used)
    }

    /// The storage counter against `limit`.
    pub fn storage_quota(
        &self,
        viewer: &Viewer,
        limit: u64,
        warning_threshold: f64,
    ) -> Result<StorageQuota> {
        let used = self.storage_used(viewer)?;
        Ok(StorageQuota::new(used, limit, warning_threshold))
    }

    /// Make sure the viewer has a user record so counter adjustments have a
    /// target.
    pub(crate) fn ensure_account(&self, viewer: &Viewer) -> Result<()> {
        let account = self
            .catalog
            .ensure_user(&viewer.id, &viewer.email)
            .map_err(|e| ArchiveError::sync("user record", e))?;
        debug!(user = %account.id, storage_used = account.storage_used, "User record ready");
        Ok(())
    }
}

/// Merge the owned and shared result sets into one view.
///
/// Owned items are inserted first with `is_owner = true`; a shared item is
/// added only if its id is not already present, so an item that is both
/// owned and shared appears once, as owned. The result is sorted newest
/// first (see [`sort_visible`]).
pub fn merge_visible(owned: Vec<ArchiveItem>, shared: Vec<ArchiveItem>) -> Vec<VisibleItem> {
    let mut seen: HashSet<String> = HashSet::with_capacity(owned.len() + shared.len());
    let mut merged: Vec<VisibleItem> = Vec::with_capacity(owned.len() + shared.len());

    for (items, is_owner) in [(owned, true), (shared, false)] {
        for item in items {
            if !seen.insert(item.id.clone()) {
                continue;
            }
            merged.push(VisibleItem { item, is_owner });
        }
    }

    sort_visible(&mut merged);
    merged
}

/// Sort by `created_at` descending. A missing timestamp counts as epoch 0,
/// so such items sink to the end. Equal keys keep their relative order.
pub fn sort_visible(items: &mut [VisibleItem]) {
    items.sort_by(|a, b| b.created_millis().cmp(&a.created_millis()));
}

/// Blob path for a new upload: `users/{owner}/items/{millis}_{index}_{name}`,
/// where `index` is the file's position in its batch.
///
/// Path separators in the file name are replaced so the name stays a single
/// path segment.
pub fn blob_path(owner_id: &str, batch_millis: i64, index: usize, file_name: &str) -> String {
    let safe: String = file_name
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    format!("users/{owner_id}/items/{batch_millis}_{index}_{safe}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, ItemType};
    use chrono::{TimeZone, Utc};

    fn item(id: &str, owner: &str, millis: Option<i64>) -> ArchiveItem {
        ArchiveItem {
            id: id.into(),
            owner_id: owner.into(),
            owner_email: format!("{owner}@x.com"),
            title: id.into(),
            item_type: ItemType::Photo,
            category: Category::Personal,
            description: String::new(),
            transcription: String::new(),
            related_date: String::new(),
            physical_location: String::new(),
            shared_with: vec![],
            files: vec![],
            created_at: millis.and_then(|m| Utc.timestamp_millis_opt(m).single()),
            updated_at: None,
        }
    }

    #[test]
    fn test_owned_wins_over_shared() {
        let owned = vec![item("1", "a", Some(5)), item("2", "a", Some(3))];
        let shared = vec![item("2", "a", Some(3)), item("3", "b", Some(4))];
        let merged = merge_visible(owned, shared);
        let ids: Vec<_> = merged.iter().map(|v| (v.id.as_str(), v.is_owner)).collect();
        assert_eq!(ids, vec![("1", true), ("3", false), ("2", true)]);
    }

    #[test]
    fn test_missing_timestamps_sort_last() {
        let owned = vec![
            item("a", "u", Some(5)),
            item("b", "u", None),
            item("c", "u", Some(3)),
            item("d", "u", Some(5)),
        ];
        let merged = merge_visible(owned, vec![]);
        let ids: Vec<_> = merged.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "d", "c", "b"]);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(merge_visible(vec![], vec![]).is_empty());
        let only_shared = merge_visible(vec![], vec![item("x", "b", Some(1))]);
        assert_eq!(only_shared.len(), 1);
        assert!(!only_shared[0].is_owner);
    }

    #[test]
    fn test_blob_path_is_single_segment() {
        assert_eq!(
            blob_path("u1", 1700, 0, "scans/letter.pdf"),
            "users/u1/items/1700_0_scans_letter.pdf"
        );
        assert_eq!(blob_path("u1", 1, 2, "a.jpg"), "users/u1/items/1_2_a.jpg");
    }

    #[test]
    fn test_blob_path_keeps_batches_apart() {
        // Second file of one batch vs first file of a batch a millisecond later.
        assert_ne!(blob_path("u1", 1000, 1, "y"), blob_path("u1", 1001, 0, "y"));
        assert_ne!(blob_path("u1", 1000, 0, "y"), blob_path("u1", 1000, 1, "y"));
    }
}
