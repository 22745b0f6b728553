//! Integration tests for the filesystem catalog and blob store, driven
//! through the synchronizer the way the CLI uses them.

use assert_fs::prelude::*;
use assert_fs::TempDir;
use chrono::{NaiveDate, Utc};
use predicates::prelude::*;

use famarchive::backend::local::{LocalBlobStore, LocalCatalog};
use famarchive::backend::CatalogStore;
use famarchive::enrich::DisabledEnricher;
use famarchive::export::{default_file_name, export_to_file, ExportContext, ExportFormat};
use famarchive::model::{Category, ItemDraft, ItemType, PendingFile, Viewer};
use famarchive::sync::{SyncLimits, Synchronizer};

fn open(root: &TempDir) -> (LocalCatalog, LocalBlobStore) {
    let catalog = LocalCatalog::open(root.path()).unwrap();
    let blobs = LocalBlobStore::open(root.path()).unwrap();
    (catalog, blobs)
}

#[test]
fn test_saved_item_lands_in_catalog_and_blob_dir() {
    let root = TempDir::new().unwrap();
    let (catalog, blobs) = open(&root);
    let sync = Synchronizer::new(&catalog, &blobs, &DisabledEnricher, SyncLimits::default());
    let viewer = Viewer::new("alice", "a@x.com");

    let mut draft = ItemDraft::new("Wedding album", ItemType::Photo, Category::Personal);
    draft.shared_with = vec!["B@X.com".into()];
    let saved = sync
        .save_item(
            &viewer,
            draft,
            None,
            &[PendingFile::new("cover.png", "image/png", vec![7u8; 128])],
            None,
        )
        .unwrap();

    let catalog_file = root.child("catalog.json");
    catalog_file.assert(predicate::path::is_file());
    catalog_file.assert(predicate::str::contains("\"archiveItems\""));
    catalog_file.assert(predicate::str::contains("\"title\": \"Wedding album\""));
    catalog_file.assert(predicate::str::contains("\"storageUsed\": 128"));

    let path = &saved.attachments[0].path;
    assert!(path.starts_with("users/alice/items/"));
    assert!(path.ends_with("_cover.png"));
    root.child("blobs")
        .child(path)
        .assert(predicate::path::is_file());
    assert!(saved.attachments[0].url.starts_with("file://"));
}

#[test]
fn test_state_survives_reopen_and_delete_cleans_up() {
    let root = TempDir::new().unwrap();
    let alice = Viewer::new("alice", "a@x.com");
    let bob = Viewer::new("bob", "b@x.com");

    let (id, path) = {
        let (catalog, blobs) = open(&root);
        let sync = Synchronizer::new(&catalog, &blobs, &DisabledEnricher, SyncLimits::default());
        let mut draft =
            ItemDraft::new("Letter", ItemType::LetterCorrespondence, Category::FamilyHistory);
        draft.shared_with = vec!["b@x.com".into()];
        let saved = sync
            .save_item(
                &alice,
                draft,
                None,
                &[PendingFile::new("letter.txt", "text/plain", vec![b'x'; 50])],
                None,
            )
            .unwrap();
        (saved.id, saved.attachments[0].path.clone())
    };

    let (catalog, blobs) = open(&root);
    let sync = Synchronizer::new(&catalog, &blobs, &DisabledEnricher, SyncLimits::default());
    assert_eq!(sync.storage_used(&alice).unwrap(), 50);

    let shared = sync.load_visible_items(&bob).unwrap();
    assert_eq!(shared.len(), 1);
    assert!(!shared[0].is_owner);

    let report = sync.delete_item_by_id(&alice, &id).unwrap();
    assert_eq!(report.bytes_released, 50);
    assert!(report.orphaned_paths.is_empty());
    root.child("blobs")
        .child(&path)
        .assert(predicate::path::missing());
    assert!(catalog.get_item(&id).unwrap().is_none());
    assert_eq!(sync.storage_used(&alice).unwrap(), 0);
    assert!(sync.load_visible_items(&bob).unwrap().is_empty());
}

#[test]
fn test_corrupt_catalog_is_a_sync_failure() {
    let root = TempDir::new().unwrap();
    root.child("catalog.json").write_str("{ not json").unwrap();
    let (catalog, blobs) = open(&root);
    let sync = Synchronizer::new(&catalog, &blobs, &DisabledEnricher, SyncLimits::default());

    let err = sync
        .load_visible_items(&Viewer::new("alice", "a@x.com"))
        .unwrap_err();
    assert!(err.to_string().contains("Could not sync archive items"));
    assert!(!err.is_retryable());
}

#[test]
fn test_export_writes_named_files() {
    let root = TempDir::new().unwrap();
    let (catalog, blobs) = open(&root);
    let sync = Synchronizer::new(&catalog, &blobs, &DisabledEnricher, SyncLimits::default());
    let viewer = Viewer::new("alice", "a@x.com");

    sync.save_item(
        &viewer,
        ItemDraft::new("Pocket watch", ItemType::Jewelry, Category::Genealogy),
        None,
        &[],
        None,
    )
    .unwrap();
    let items = sync.load_visible_items(&viewer).unwrap();

    let date = NaiveDate::from_ymd_opt(2024, 5, 17).unwrap();
    let context = ExportContext {
        generated_at: Utc::now(),
        user_email: viewer.email.clone(),
    };

    let csv = root.child(default_file_name(ExportFormat::Csv, date));
    export_to_file(&items, ExportFormat::Csv, &context, csv.path()).unwrap();
    csv.assert(predicate::str::contains("Pocket watch"));
    assert!(csv.path().ends_with("family_archive_export_2024-05-17.csv"));

    let sql = root.child(default_file_name(ExportFormat::Sql, date));
    export_to_file(&items, ExportFormat::Sql, &context, sql.path()).unwrap();
    sql.assert(predicate::str::starts_with("-- Family Archive Tracker Export"));
    sql.assert(predicate::str::contains("'Pocket watch'"));
    sql.assert(predicate::str::contains("-- Total archive items: 1"));

    let empty = root.child("empty.csv");
    assert!(export_to_file(&[], ExportFormat::Csv, &context, empty.path()).is_err());
}
