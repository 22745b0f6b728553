//! In-memory catalog and blob store.
//!
//! Both are mutex-guarded and safe to share between threads. They support a
//! small amount of fault injection so callers can exercise failure paths,
//! and they record every quota adjustment.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};

use crate::error::BackendError;
use crate::model::{ArchiveItem, UserAccount};

use super::{
    apply_update, clamped_add, materialize, sort_newest_first, BackendResult, BlobStore,
    CatalogStore, ItemUpdate, NewItem, StoredBlob,
};

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panic while holding the lock leaves plain data behind; keep going.
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Failures the in-memory catalog should simulate.
#[derive(Debug, Default, Clone)]
pub struct CatalogFaults {
    pub fail_owned_query: bool,
    pub fail_shared_query: bool,
    /// Number of upcoming `adjust_storage_used` calls that fail.
    pub fail_adjustments: u32,
    pub fail_delete_item: bool,
}

#[derive(Default)]
struct CatalogState {
    items: BTreeMap<String, ArchiveItem>,
    users: HashMap<String, UserAccount>,
    next_id: u64,
    last_timestamp: Option<DateTime<Utc>>,
    adjustments: Vec<(String, i64)>,
    faults: CatalogFaults,
}

impl CatalogState {
    /// Server clock: strictly increasing so `created_at` ordering is stable.
    fn now(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_timestamp {
            if now <= last {
                now = last + Duration::milliseconds(1);
            }
        }
        self.last_timestamp = Some(now);
        now
    }
}

/// A catalog kept entirely in memory.
pub struct MemoryCatalog {
    store_id: u64,
    state: Mutex<CatalogState>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self {
            store_id: NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed),
            state: Mutex::new(CatalogState::default()),
        }
    }

    /// Insert or replace an item verbatim, including its id and timestamps.
    pub fn insert_item(&self, item: ArchiveItem) {
        lock(&self.state).items.insert(item.id.clone(), item);
    }

    /// Overwrite a user's counter directly, bypassing the adjust log.
    pub fn set_storage_used(&self, user_id: &str, email: &str, bytes: u64) {
        let mut state = lock(&self.state);
        let user = state
            .users
            .entry(user_id.to_string())
            .or_insert_with(|| UserAccount {
                id: user_id.to_string(),
                email: email.to_string(),
                storage_used: 0,
                created_at: None,
            });
        user.storage_used = bytes;
    }

    /// Replace the active fault configuration.
    pub fn set_faults(&self, faults: CatalogFaults) {
        lock(&self.state).faults = faults;
    }

    /// Every successful `adjust_storage_used` call, in order.
    pub fn adjustments(&self) -> Vec<(String, i64)> {
        lock(&self.state).adjustments.clone()
    }

    pub fn item_count(&self) -> usize {
        lock(&self.state).items.len()
    }
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogStore for MemoryCatalog {
    fn items_owned_by(&self, owner_id: &str) -> BackendResult<Vec<ArchiveItem>> {
        let state = lock(&self.state);
        if state.faults.fail_owned_query {
            return Err(BackendError::Unavailable("owned items query".into()));
        }
        let mut items: Vec<ArchiveItem> = state
            .items
            .values()
            .filter(|i| i.owner_id == owner_id)
            .cloned()
            .collect();
        sort_newest_first(&mut items);
        Ok(items)
    }

    fn items_shared_with(&self, email: &str) -> BackendResult<Vec<ArchiveItem>> {
        let state = lock(&self.state);
        if state.faults.fail_shared_query {
            return Err(BackendError::Unavailable("shared items query".into()));
        }
        let mut items: Vec<ArchiveItem> = state
            .items
            .values()
            .filter(|i| i.is_shared_with(email))
            .cloned()
            .collect();
        sort_newest_first(&mut items);
        Ok(items)
    }

    fn get_item(&self, id: &str) -> BackendResult<Option<ArchiveItem>> {
        Ok(lock(&self.state).items.get(id).cloned())
    }

    fn create_item(&self, item: NewItem) -> BackendResult<String> {
        let mut state = lock(&self.state);
        state.next_id += 1;
        let id = format!("mem{}-{:06}", self.store_id, state.next_id);
        let now = state.now();
        state.items.insert(id.clone(), materialize(id.clone(), item, now));
        Ok(id)
    }

    fn update_item(&self, id: &str, update: ItemUpdate) -> BackendResult<()> {
        let mut state = lock(&self.state);
        let now = state.now();
        let item = state
            .items
            .get_mut(id)
            .ok_or_else(|| BackendError::NotFound(format!("archiveItems/{id}")))?;
        apply_update(item, update, now);
        Ok(())
    }

    fn delete_item(&self, id: &str) -> BackendResult<()> {
        let mut state = lock(&self.state);
        if state.faults.fail_delete_item {
            return Err(BackendError::Unavailable(format!("delete archiveItems/{id}")));
        }
        state
            .items
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| BackendError::NotFound(format!("archiveItems/{id}")))
    }

    fn get_user(&self, id: &str) -> BackendResult<Option<UserAccount>> {
        Ok(lock(&self.state).users.get(id).cloned())
    }

    fn ensure_user(&self, id: &str, email: &str) -> BackendResult<UserAccount> {
        let mut state = lock(&self.state);
        if let Some(user) = state.users.get(id) {
            return Ok(user.clone());
        }
        let now = state.now();
        let user = UserAccount {
            id: id.to_string(),
            email: email.to_string(),
            storage_used: 0,
            created_at: Some(now),
        };
        state.users.insert(id.to_string(), user.clone());
        Ok(user)
    }

    fn adjust_storage_used(&self, user_id: &str, delta: i64) -> BackendResult<u64> {
        let mut state = lock(&self.state);
        if state.faults.fail_adjustments > 0 {
            state.faults.fail_adjustments -= 1;
            return Err(BackendError::Unavailable(format!("users/{user_id} increment")));
        }
        let user = state
            .users
            .get_mut(user_id)
            .ok_or_else(|| BackendError::NotFound(format!("users/{user_id}")))?;
        user.storage_used = clamped_add(user.storage_used, delta);
        let value = user.storage_used;
        state.adjustments.push((user_id.to_string(), delta));
        Ok(value)
    }
}

/// Failures the in-memory blob store should simulate.
#[derive(Debug, Default, Clone)]
pub struct BlobFaults {
    /// Fail every `put` once this many puts have succeeded.
    pub fail_puts_after: Option<usize>,
    /// Report failing puts as timeouts instead of outages.
    pub puts_time_out: bool,
    /// Paths whose deletion fails.
    pub fail_deletes: HashSet<String>,
}

#[derive(Default)]
struct BlobState {
    blobs: BTreeMap<String, Vec<u8>>,
    puts: usize,
    faults: BlobFaults,
}

/// A blob store kept entirely in memory. URLs use the `mem://` scheme.
#[derive(Default)]
pub struct MemoryBlobStore {
    state: Mutex<BlobState>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_faults(&self, faults: BlobFaults) {
        lock(&self.state).faults = faults;
    }

    pub fn contains(&self, path: &str) -> bool {
        lock(&self.state).blobs.contains_key(path)
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        lock(&self.state).blobs.get(path).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.state).blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of successful puts so far.
    pub fn put_count(&self) -> usize {
        lock(&self.state).puts
    }
}

impl BlobStore for MemoryBlobStore {
    fn put(&self, path: &str, bytes: &[u8]) -> BackendResult<StoredBlob> {
        let mut state = lock(&self.state);
        if let Some(limit) = state.faults.fail_puts_after {
            if state.puts >= limit {
                return Err(if state.faults.puts_time_out {
                    BackendError::Timeout(format!("put {path}"))
                } else {
                    BackendError::Unavailable(format!("put {path}"))
                });
            }
        }
        if state.blobs.contains_key(path) {
            return Err(BackendError::AlreadyExists(path.to_string()));
        }
        state.blobs.insert(path.to_string(), bytes.to_vec());
        state.puts += 1;
        Ok(StoredBlob {
            path: path.to_string(),
            url: format!("mem://{path}"),
        })
    }

    fn delete(&self, path: &str) -> BackendResult<()> {
        let mut state = lock(&self.state);
        if state.faults.fail_deletes.contains(path) {
            return Err(BackendError::Unavailable(format!("delete {path}")));
        }
        state
            .blobs
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| BackendError::NotFound(path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, ItemDraft, ItemType};

    fn new_item(owner: &str, shared: &[&str]) -> NewItem {
        let mut draft = ItemDraft::new("Item", ItemType::Photo, Category::Personal);
        draft.shared_with = shared.iter().map(|s| s.to_string()).collect();
        NewItem {
            owner_id: owner.into(),
            owner_email: format!("{owner}@x.com"),
            draft,
            files: vec![],
        }
    }

    #[test]
    fn test_queries_return_newest_first() {
        let catalog = MemoryCatalog::new();
        let first = catalog.create_item(new_item("u1", &[])).unwrap();
        let second = catalog.create_item(new_item("u1", &[])).unwrap();
        let items = catalog.items_owned_by("u1").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, second);
        assert_eq!(items[1].id, first);
    }

    #[test]
    fn test_shared_query_uses_exact_membership() {
        let catalog = MemoryCatalog::new();
        catalog.create_item(new_item("u1", &["b@x.com"])).unwrap();
        assert_eq!(catalog.items_shared_with("b@x.com").unwrap().len(), 1);
        assert!(catalog.items_shared_with("B@x.com").unwrap().is_empty());
        assert!(catalog.items_shared_with("b@x.co").unwrap().is_empty());
    }

    #[test]
    fn test_adjust_clamps_and_records() {
        let catalog = MemoryCatalog::new();
        catalog.ensure_user("u1", "a@x.com").unwrap();
        assert_eq!(catalog.adjust_storage_used("u1", 100).unwrap(), 100);
        assert_eq!(catalog.adjust_storage_used("u1", -250).unwrap(), 0);
        assert_eq!(
            catalog.adjustments(),
            vec![("u1".to_string(), 100), ("u1".to_string(), -250)]
        );
    }

    #[test]
    fn test_update_appends_files_and_bumps_updated_at() {
        let catalog = MemoryCatalog::new();
        let id = catalog.create_item(new_item("u1", &[])).unwrap();
        let before = catalog.get_item(&id).unwrap().unwrap();
        catalog
            .update_item(&id, ItemUpdate::default())
            .unwrap();
        let after = catalog.get_item(&id).unwrap().unwrap();
        assert!(after.updated_at > before.updated_at);
        assert_eq!(after.created_at, before.created_at);
    }

    #[test]
    fn test_blob_put_rejects_existing_path() {
        let blobs = MemoryBlobStore::new();
        blobs.put("a/b", b"1").unwrap();
        assert!(matches!(
            blobs.put("a/b", b"2"),
            Err(BackendError::AlreadyExists(_))
        ));
        assert_eq!(blobs.get("a/b").unwrap(), b"1".to_vec());
    }
}
