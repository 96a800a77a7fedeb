//! Integration tests for the identity engine over a real SQLite store.
//!
//! These tests exercise the archive → directory-index → resolver path the
//! way the HTTP server and CLI drive it: one engine per temporary database,
//! real files on disk where content hashing matters.

use std::fs;
use std::sync::Arc;

use tempfile::TempDir;

use docvault::blob::BlobStore;
use docvault::db;
use docvault::dirindex::BUCKET_CAPACITY;
use docvault::engine::Engine;
use docvault::migrate;
use docvault::models::ImportRequest;
use docvault::store::{RecordStore, SqliteStore};

async fn engine_in(tmp: &TempDir) -> (Engine, Arc<SqliteStore>) {
    let pool = db::connect(&tmp.path().join("data").join("docvault.sqlite"))
        .await
        .unwrap();
    migrate::run_migrations(&pool).await.unwrap();
    let store = Arc::new(SqliteStore::new(pool));
    let blobs = Arc::new(BlobStore::new(tmp.path().join("blobs")));
    (Engine::new(store.clone(), blobs), store)
}

fn numbered_request(directory: &str, number: &str) -> ImportRequest {
    ImportRequest {
        directory: Some(directory.to_string()),
        document_number0: Some(number.to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_second_import_of_same_abstract_reuses_record_and_bucket_slot() {
    let tmp = TempDir::new().unwrap();
    let (engine, store) = engine_in(&tmp).await;

    // Two revisions of the same part with identical content
    let ws = tmp.path().join("ws");
    fs::create_dir_all(&ws).unwrap();
    fs::write(ws.join("part.001.step"), b"solid part").unwrap();
    fs::write(ws.join("part.002.step"), b"solid part").unwrap();

    let ws_str = ws.to_string_lossy().into_owned();
    let mut first = ImportRequest {
        file_path: Some(ws.join("part.001.step")),
        directory: Some(ws_str.clone()),
        document_number0: Some("D-100".to_string()),
        ..Default::default()
    };
    let records = engine.import(std::slice::from_ref(&first)).await.unwrap();
    first.file_path = Some(ws.join("part.002.step"));
    let second = engine.import(&[first]).await.unwrap();

    assert_eq!(records[0].key, second[0].key);
    assert_eq!(records[0].id, second[0].id);

    // The directory tracks one id, not two
    let ids = engine.index.document_ids(&ws_str).await.unwrap();
    assert_eq!(ids, vec![records[0].id.clone()]);

    let buckets = store
        .find_directories_by_path(&ws_str.to_lowercase())
        .await
        .unwrap();
    assert_eq!(buckets.len(), 1);
}

#[tokio::test]
async fn test_forty_imports_fill_two_buckets() {
    let tmp = TempDir::new().unwrap();
    let (engine, store) = engine_in(&tmp).await;

    let requests: Vec<ImportRequest> = (0..40)
        .map(|i| numbered_request("/ws/bulk", &format!("D-{i}")))
        .collect();
    let records = engine.import(&requests).await.unwrap();
    assert_eq!(records.len(), 40);

    let buckets = store.find_directories_by_path("/ws/bulk").await.unwrap();
    assert_eq!(buckets.len(), 2);
    assert_eq!(buckets[0].documents.len(), BUCKET_CAPACITY);
    assert_eq!(buckets[1].documents.len(), 8);
    for bucket in &buckets {
        assert!(bucket.live_documents().count() <= BUCKET_CAPACITY);
    }
}

#[tokio::test]
async fn test_fill_once_merge_over_sqlite() {
    let tmp = TempDir::new().unwrap();
    let (engine, _) = engine_in(&tmp).await;

    let bare = numbered_request("/ws", "D-7");
    let created = engine.archive.archive(&bare).await.unwrap();
    assert!(created.display_name.is_empty());

    let mut named = bare.clone();
    named.display_name = Some("X".to_string());
    let merged = engine.archive.archive(&named).await.unwrap();
    assert_eq!(merged.display_name, "X");
    assert_eq!(merged.id, created.id);

    named.display_name = Some("Y".to_string());
    let again = engine.archive.archive(&named).await.unwrap();
    assert_eq!(again.display_name, "X");
    assert_eq!(again.update_time, merged.update_time);
}

#[tokio::test]
async fn test_is_imported_reflects_archive_state_without_writing() {
    let tmp = TempDir::new().unwrap();
    let (engine, _) = engine_in(&tmp).await;

    let request = numbered_request("/ws", "D-9");
    let states = engine.is_imported(std::slice::from_ref(&request)).await.unwrap();
    assert!(!states[0].is_imported);

    engine.import(std::slice::from_ref(&request)).await.unwrap();
    let states = engine.is_imported(&[request]).await.unwrap();
    assert!(states[0].is_imported);
}

#[tokio::test]
async fn test_documents_by_directory_applies_precedence_resolution() {
    let tmp = TempDir::new().unwrap();
    let (engine, _) = engine_in(&tmp).await;

    // Classified by document number only
    engine
        .import(&[numbered_request("/ws/parts", "D-1")])
        .await
        .unwrap();
    // Classified by filename (path does not exist on disk; identity still
    // derives from the name)
    engine
        .import(&[ImportRequest {
            file_path: Some("/ws/parts/housing.004.step".into()),
            directory: Some("/ws/parts".to_string()),
            ..Default::default()
        }])
        .await
        .unwrap();

    let records = engine.documents_by_directory("/ws/parts").await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].lower_format_file_name, "housing.step");
    assert_eq!(records[1].document_number0, "D-1");
}

#[tokio::test]
async fn test_concurrent_imports_of_novel_key_converge_on_one_record() {
    let tmp = TempDir::new().unwrap();
    let (engine, store) = engine_in(&tmp).await;

    let request = numbered_request("/ws", "D-race");
    let (a, b) = tokio::join!(
        engine.archive.archive(&request),
        engine.archive.archive(&request)
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.id, b.id);
    assert!(store.contains_document_key(&a.key).await.unwrap());
}

#[tokio::test]
async fn test_side_document_relation_cache_round_trip() {
    let tmp = TempDir::new().unwrap();
    let (engine, _) = engine_in(&tmp).await;

    let side = serde_json::json!({"material": "AlMg3", "rev": "B"});
    engine
        .archive
        .cache_side_document("content-1", &side)
        .await
        .unwrap();

    let cached = engine
        .archive
        .side_document_by_content("content-1")
        .await
        .unwrap();
    assert_eq!(cached, Some(side));

    // First write wins
    engine
        .archive
        .cache_side_document("content-1", &serde_json::json!({"rev": "C"}))
        .await
        .unwrap();
    let cached = engine
        .archive
        .side_document_by_content("content-1")
        .await
        .unwrap();
    assert_eq!(cached.unwrap()["rev"], "B");
}

#[tokio::test]
async fn test_normalized_paths_share_one_directory() {
    let tmp = TempDir::new().unwrap();
    let (engine, store) = engine_in(&tmp).await;

    engine
        .import(&[numbered_request(r"C:\Work\Parts", "D-1")])
        .await
        .unwrap();
    engine
        .import(&[numbered_request("c:/work/parts", "D-2")])
        .await
        .unwrap();

    let buckets = store.find_directories_by_path("c:/work/parts").await.unwrap();
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].live_documents().count(), 2);
}
