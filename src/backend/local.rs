//! Filesystem-backed catalog and blob store, used by the CLI.
//!
//! ```text
//! <root>/
//!   catalog.json      items + users + id counter, rewritten atomically
//!   blobs/<path>      one file per stored blob
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::error::BackendError;
use crate::model::{ArchiveItem, UserAccount};

use super::{
    apply_update, clamped_add, materialize, sort_newest_first, BackendResult, BlobStore,
    CatalogStore, ItemUpdate, NewItem, StoredBlob,
};

const CATALOG_FILE: &str = "catalog.json";
const BLOB_DIR: &str = "blobs";

#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CatalogDocument {
    next_id: u64,
    last_timestamp: Option<DateTime<Utc>>,
    archive_items: Vec<ArchiveItem>,
    users: Vec<UserAccount>,
}

impl CatalogDocument {
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

    fn user_mut(&mut self, id: &str) -> Option<&mut UserAccount> {
        self.users.iter_mut().find(|u| u.id == id)
    }
}

/// A catalog persisted as a single JSON document.
///
/// Every operation loads, modifies and rewrites the document under one
/// process-wide lock, so concurrent callers in the same process see atomic
/// operations.
pub struct LocalCatalog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl LocalCatalog {
    /// Open (or lazily create) the catalog under `root`.
    pub fn open(root: impl AsRef<Path>) -> BackendResult<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root).map_err(|e| BackendError::io(root, e))?;
        Ok(Self {
            path: root.join(CATALOG_FILE),
            lock: Mutex::new(()),
        })
    }

    fn load(&self) -> BackendResult<CatalogDocument> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                BackendError::Malformed(format!("{}: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(CatalogDocument::default()),
            Err(e) => Err(BackendError::io(&self.path, e)),
        }
    }

    fn save(&self, doc: &CatalogDocument) -> BackendResult<()> {
        let json = serde_json::to_string_pretty(doc)
            .map_err(|e| BackendError::Malformed(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| BackendError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| BackendError::io(&self.path, e))?;
        Ok(())
    }

    /// Run a read-only closure against the current document.
    fn read<T>(&self, f: impl FnOnce(&CatalogDocument) -> T) -> BackendResult<T> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        let doc = self.load()?;
        Ok(f(&doc))
    }

    /// Run a mutating closure and persist the document if it succeeds.
    fn write<T>(
        &self,
        f: impl FnOnce(&mut CatalogDocument) -> BackendResult<T>,
    ) -> BackendResult<T> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut doc = self.load()?;
        let out = f(&mut doc)?;
        self.save(&doc)?;
        Ok(out)
    }
}

impl CatalogStore for LocalCatalog {
    fn items_owned_by(&self, owner_id: &str) -> BackendResult<Vec<ArchiveItem>> {
        self.read(|doc| {
            let mut items: Vec<ArchiveItem> = doc
                .archive_items
                .iter()
                .filter(|i| i.owner_id == owner_id)
                .cloned()
                .collect();
            sort_newest_first(&mut items);
            items
        })
    }

    fn items_shared_with(&self, email: &str) -> BackendResult<Vec<ArchiveItem>> {
        self.read(|doc| {
            let mut items: Vec<ArchiveItem> = doc
                .archive_items
                .iter()
                .filter(|i| i.is_shared_with(email))
                .cloned()
                .collect();
            sort_newest_first(&mut items);
            items
        })
    }

    fn get_item(&self, id: &str) -> BackendResult<Option<ArchiveItem>> {
        self.read(|doc| doc.archive_items.iter().find(|i| i.id == id).cloned())
    }

    fn create_item(&self, item: NewItem) -> BackendResult<String> {
        self.write(|doc| {
            doc.next_id += 1;
            let id = format!("item-{:08}", doc.next_id);
            let now = doc.now();
            doc.archive_items.push(materialize(id.clone(), item, now));
            debug!(item_id = %id, "Created catalog item");
            Ok(id)
        })
    }

    fn update_item(&self, id: &str, update: ItemUpdate) -> BackendResult<()> {
        self.write(|doc| {
            let now = doc.now();
            let item = doc
                .archive_items
                .iter_mut()
                .find(|i| i.id == id)
                .ok_or_else(|| BackendError::NotFound(format!("archiveItems/{id}")))?;
            apply_update(item, update, now);
            Ok(())
        })
    }

    fn delete_item(&self, id: &str) -> BackendResult<()> {
        self.write(|doc| {
            let before = doc.archive_items.len();
            doc.archive_items.retain(|i| i.id != id);
            if doc.archive_items.len() == before {
                return Err(BackendError::NotFound(format!("archiveItems/{id}")));
            }
            Ok(())
        })
    }

    fn get_user(&self, id: &str) -> BackendResult<Option<UserAccount>> {
        self.read(|doc| doc.users.iter().find(|u| u.id == id).cloned())
    }

    fn ensure_user(&self, id: &str, email: &str) -> BackendResult<UserAccount> {
        self.write(|doc| {
            if let Some(user) = doc.user_mut(id) {
                return Ok(user.clone());
            }
            let now = doc.now();
            let user = UserAccount {
                id: id.to_string(),
                email: email.to_string(),
                storage_used: 0,
                created_at: Some(now),
            };
            doc.users.push(user.clone());
            Ok(user)
        })
    }

    fn adjust_storage_used(&self, user_id: &str, delta: i64) -> BackendResult<u64> {
        self.write(|doc| {
            let user = doc
                .user_mut(user_id)
                .ok_or_else(|| BackendError::NotFound(format!("users/{user_id}")))?;
            user.storage_used = clamped_add(user.storage_used, delta);
            Ok(user.storage_used)
        })
    }
}

/// Blob store writing one file per blob under `<root>/blobs`.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn open(root: impl AsRef<Path>) -> BackendResult<Self> {
        let root = root.as_ref().join(BLOB_DIR);
        fs::create_dir_all(&root).map_err(|e| BackendError::io(&root, e))?;
        let root = root.canonicalize().unwrap_or(root);
        Ok(Self { root })
    }

    /// Map a blob path to a file, refusing anything that escapes the root.
    fn local_path(&self, path: &str) -> BackendResult<PathBuf> {
        let relative = path.trim_start_matches('/');
        if relative.is_empty()
            || relative
                .split('/')
                .any(|part| part.is_empty() || part == "." || part == "..")
        {
            return Err(BackendError::Malformed(format!("invalid blob path '{path}'")));
        }
        Ok(self.root.join(relative))
    }
}

impl BlobStore for LocalBlobStore {
    fn put(&self, path: &str, bytes: &[u8]) -> BackendResult<StoredBlob> {
        let local = self.local_path(path)?;
        if let Some(parent) = local.parent() {
            fs::create_dir_all(parent).map_err(|e| BackendError::io(parent, e))?;
        }
        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&local)
        {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(BackendError::AlreadyExists(path.to_string()))
            }
            Err(e) => return Err(BackendError::io(&local, e)),
        };
        std::io::Write::write_all(&mut file, bytes).map_err(|e| BackendError::io(&local, e))?;
        Ok(StoredBlob {
            path: path.to_string(),
            url: format!("file://{}", local.display()),
        })
    }

    fn delete(&self, path: &str) -> BackendResult<()> {
        let local = self.local_path(path)?;
        match fs::remove_file(&local) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(BackendError::NotFound(path.to_string()))
            }
            Err(e) => Err(BackendError::io(&local, e)),
        }
    }
}
