//! Core data model types: archive items, attachments, and user accounts.

pub mod attachment;
pub mod item;
pub mod user;

pub use attachment::{FileAttachment, FileKind, PendingFile};
pub use item::{ArchiveItem, Category, ItemDraft, ItemType, Viewer, VisibleItem};
pub use user::{StorageQuota, UserAccount};
