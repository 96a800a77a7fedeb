//! End-to-end reconciliation scans over real directories.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use docvault::blob::BlobStore;
use docvault::db;
use docvault::engine::Engine;
use docvault::migrate;
use docvault::models::{DocumentRecord, ImportRequest};
use docvault::store::{RecordStore, SqliteStore};

async fn engine_in(tmp: &TempDir) -> (Engine, Arc<SqliteStore>, Arc<BlobStore>) {
    let pool = db::connect(&tmp.path().join("data").join("docvault.sqlite"))
        .await
        .unwrap();
    migrate::run_migrations(&pool).await.unwrap();
    let store = Arc::new(SqliteStore::new(pool));
    let blobs = Arc::new(BlobStore::new(tmp.path().join("blobs")));
    (Engine::new(store.clone(), blobs.clone()), store, blobs)
}

fn file_request(ws: &Path, name: &str) -> ImportRequest {
    ImportRequest {
        file_path: Some(ws.join(name)),
        directory: Some(ws.to_string_lossy().into_owned()),
        ..Default::default()
    }
}

async fn import_files(engine: &Engine, ws: &Path, names: &[&str]) {
    let requests: Vec<ImportRequest> = names.iter().map(|n| file_request(ws, n)).collect();
    engine.import(&requests).await.unwrap();
}

#[tokio::test]
async fn test_scan_classification_is_exhaustive() {
    let tmp = TempDir::new().unwrap();
    let (engine, _, _) = engine_in(&tmp).await;

    let ws = tmp.path().join("ws");
    fs::create_dir_all(&ws).unwrap();
    fs::write(ws.join("alpha.step"), b"alpha geometry").unwrap();
    fs::write(ws.join("beta.step"), b"beta geometry").unwrap();
    fs::write(ws.join("gamma.step"), b"gamma geometry").unwrap();

    import_files(&engine, &ws, &["alpha.step", "beta.step", "gamma.step"]).await;

    // beta changes length, gamma disappears, delta shows up untracked
    fs::write(ws.join("beta.step"), b"beta geometry, reworked").unwrap();
    fs::remove_file(ws.join("gamma.step")).unwrap();
    fs::write(ws.join("delta.step"), b"delta geometry").unwrap();

    let result = engine.scan_directory(&ws).await.unwrap();

    let names = |entries: &[docvault::scan::ScannedDocument]| -> Vec<String> {
        entries
            .iter()
            .map(|e| e.document.origin_file_name.clone())
            .collect()
    };
    assert_eq!(names(&result.unchanged), vec!["alpha.step"]);
    assert_eq!(names(&result.modified), vec!["beta.step"]);
    assert_eq!(names(&result.missing), vec!["gamma.step"]);
    assert_eq!(result.untracked_files.len(), 1);
    assert!(result.untracked_files[0].ends_with("delta.step"));

    // Every tracked document lands in exactly one class
    let tracked = engine
        .documents_by_directory(&ws.to_string_lossy())
        .await
        .unwrap();
    let total = result.unchanged.len() + result.modified.len() + result.missing.len();
    assert_eq!(total, tracked.len());
}

#[tokio::test]
async fn test_version_collapsing_considers_only_greatest_revision() {
    let tmp = TempDir::new().unwrap();
    let (engine, _, _) = engine_in(&tmp).await;

    let ws = tmp.path().join("ws");
    fs::create_dir_all(&ws).unwrap();
    fs::write(ws.join("part.0001"), b"rev 1").unwrap();
    fs::write(ws.join("part.0002"), b"rev 2").unwrap();
    fs::write(ws.join("part.0010"), b"rev 10").unwrap();

    // Nothing tracked: only the surviving revision may appear as untracked
    let result = engine.scan_directory(&ws).await.unwrap();
    assert_eq!(result.untracked_files.len(), 1);
    assert!(result.untracked_files[0].ends_with("part.0010"));
    assert!(result.unchanged.is_empty());
    assert!(result.modified.is_empty());
    assert!(result.missing.is_empty());
}

#[tokio::test]
async fn test_scan_matches_tracked_document_across_revisions() {
    let tmp = TempDir::new().unwrap();
    let (engine, _, _) = engine_in(&tmp).await;

    let ws = tmp.path().join("ws");
    fs::create_dir_all(&ws).unwrap();
    fs::write(ws.join("bracket.0003"), b"rev 3").unwrap();
    import_files(&engine, &ws, &["bracket.0003"]).await;

    // A newer revision replaces the imported one on disk
    fs::write(ws.join("bracket.0004"), b"rev 4, longer").unwrap();

    let result = engine.scan_directory(&ws).await.unwrap();
    // bracket.0004 survives collapsing, matches the tracked document by
    // stripped name, and differs in metadata
    assert_eq!(result.modified.len(), 1);
    assert_eq!(result.modified[0].document.origin_file_name, "bracket.0003");
    assert!(result.unchanged.is_empty());
    assert!(result.missing.is_empty());
    assert!(result.untracked_files.is_empty());
}

#[tokio::test]
async fn test_scan_attaches_side_documents() {
    let tmp = TempDir::new().unwrap();
    let (engine, _, _) = engine_in(&tmp).await;

    let ws = tmp.path().join("ws");
    fs::create_dir_all(&ws).unwrap();
    fs::write(ws.join("pump.step"), b"pump geometry").unwrap();

    let side = serde_json::json!({"partNumber": "P-500", "material": "steel"});
    let mut request = file_request(&ws, "pump.step");
    request.side_document = Some(side.clone());
    engine.import(&[request]).await.unwrap();

    let result = engine.scan_directory(&ws).await.unwrap();
    assert_eq!(result.unchanged.len(), 1);
    assert_eq!(result.unchanged[0].side_document, Some(side));
}

#[tokio::test]
async fn test_malformed_side_document_blob_is_isolated() {
    let tmp = TempDir::new().unwrap();
    let (engine, store, blobs) = engine_in(&tmp).await;

    let ws = tmp.path().join("ws");
    fs::create_dir_all(&ws).unwrap();
    fs::write(ws.join("valve.step"), b"valve geometry").unwrap();

    // A record whose side-document blob is not valid JSON
    let bad_hash = blobs.import_string("not { json").await.unwrap();
    let record = DocumentRecord {
        id: String::new(),
        key: "key-valve".to_string(),
        origin_file_name: "valve.step".to_string(),
        format_file_name: "valve.step".to_string(),
        lower_format_file_name: "valve.step".to_string(),
        content_hash: "c".to_string(),
        side_document_hash: bad_hash,
        document_number0: String::new(),
        document_number1: String::new(),
        document_number2: String::new(),
        part_number0: String::new(),
        part_number1: String::new(),
        part_number2: String::new(),
        document_remote_id: String::new(),
        part_remote_id: String::new(),
        display_name: String::new(),
        create_time: 1,
        update_time: 1,
        file_last_write_time: 0,
        file_length: 0,
    };
    let id = store.insert_document(&record).await.unwrap();
    engine
        .index
        .add_to_directory(&ws.to_string_lossy(), &[id])
        .await
        .unwrap();

    // The scan still succeeds; the entry just has no side document.
    // Metadata differs (0 vs real mtime), so the document lands in modified.
    let result = engine.scan_directory(&ws).await.unwrap();
    assert_eq!(result.modified.len(), 1);
    assert!(result.modified[0].side_document.is_none());
}

#[tokio::test]
async fn test_scan_of_missing_directory_fails() {
    let tmp = TempDir::new().unwrap();
    let (engine, _, _) = engine_in(&tmp).await;
    let missing = tmp.path().join("nowhere");
    assert!(engine.scan_directory(&missing).await.is_err());
}
