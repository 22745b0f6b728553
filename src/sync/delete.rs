//! Item deletion with best-effort blob cleanup.

use tracing::{debug, info, warn};

use crate::error::{ArchiveError, BackendError, Result};
use crate::model::{ArchiveItem, Viewer};

use super::Synchronizer;

/// What a deletion released and what it could not clean up.
#[derive(Debug, Default)]
pub struct DeletionReport {
    /// Sum of the sizes of all attachments of the deleted item.
    pub bytes_released: u64,
    /// Blobs whose deletion failed. They are no longer referenced by any
    /// record.
    pub orphaned_paths: Vec<String>,
    /// Set when the counter decrement failed.
    pub quota_error: Option<ArchiveError>,
}

impl Synchronizer<'_> {
    /// Delete `item` and its blobs, and release its bytes from the owner's
    /// counter.
    ///
    /// Only the owner may delete. Each blob delete is attempted once; a
    /// failure is recorded in [`DeletionReport::orphaned_paths`] and does
    /// not stop the rest. The counter is decremented once by the total
    /// attachment size, then the record is removed.
    pub fn record_deletion(&self, viewer: &Viewer, item: &ArchiveItem) -> Result<DeletionReport> {
        viewer.validate()?;
        if !item.is_owned_by(viewer) {
            return Err(ArchiveError::NotOwner(item.id.clone()));
        }

        let mut report = DeletionReport::default();
        for file in &item.files {
            match self.blobs.delete(&file.path) {
                Ok(()) => debug!(path = %file.path, "Deleted blob"),
                Err(BackendError::NotFound(_)) => {
                    debug!(path = %file.path, "Blob already gone");
                }
                Err(e) => {
                    warn!(path = %file.path, error = %e, "Could not delete blob");
                    report.orphaned_paths.push(file.path.clone());
                }
            }
            report.bytes_released += file.size;
        }

        if report.bytes_released > 0 {
            let delta = i64::try_from(report.bytes_released)
                .map(|b| -b)
                .unwrap_or(i64::MIN);
            report.quota_error = self.adjust_storage(viewer, delta);
        }

        self.catalog
            .delete_item(&item.id)
            .map_err(|e| ArchiveError::sync("delete item", e))?;

        info!(
            item = %item.id,
            files = item.files.len(),
            bytes_released = report.bytes_released,
            orphaned = report.orphaned_paths.len(),
            "Deleted archive item"
        );
        Ok(report)
    }

    /// Fetch an item by id and delete it.
    pub fn delete_item_by_id(&self, viewer: &Viewer, id: &str) -> Result<DeletionReport> {
        let item = self
            .catalog
            .get_item(id)
            .map_err(|e| ArchiveError::sync("item lookup", e))?
            .ok_or_else(|| ArchiveError::ItemNotFound(id.to_string()))?;
        self.record_deletion(viewer, &item)
    }
}
