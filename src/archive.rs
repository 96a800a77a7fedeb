//! Idempotent document archiving.
//!
//! `archive` is the single write path for document records: fingerprint the
//! request, then either insert a fresh record or merge annotation fields into
//! the existing one. Merging is fill-once — a stored non-empty annotation is
//! never overwritten — and `update_time` advances only when something
//! actually changed. Primary file bytes and the side document are imported
//! into the blob store on every archive call (idempotent by content hash).

use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

use crate::blob::BlobStore;
use crate::fingerprint::fingerprint;
use crate::locks::KeyedLocks;
use crate::models::{now_millis, DocumentRecord, ImportRequest, SideDocumentRelation};
use crate::store::RecordStore;

#[derive(Clone)]
pub struct Archive {
    store: Arc<dyn RecordStore>,
    blobs: Arc<BlobStore>,
    key_locks: KeyedLocks,
}

/// Set an empty annotation slot from a supplied non-empty value.
fn fill_once(slot: &mut String, value: Option<&str>) -> bool {
    match value {
        Some(value) if slot.is_empty() && !value.is_empty() => {
            *slot = value.to_string();
            true
        }
        _ => false,
    }
}

impl Archive {
    pub fn new(store: Arc<dyn RecordStore>, blobs: Arc<BlobStore>) -> Self {
        Self {
            store,
            blobs,
            key_locks: KeyedLocks::new(),
        }
    }

    /// Upsert a document record for this import request.
    ///
    /// Returns the stored record — freshly inserted with its store-assigned
    /// id, or the existing record after a fill-once merge of
    /// `document_remote_id`, `part_remote_id`, and `display_name`.
    pub async fn archive(&self, request: &ImportRequest) -> Result<DocumentRecord> {
        let fp = fingerprint(request).await?;

        if let Some(document) = &request.side_document {
            self.blobs
                .import_string(&serde_json::to_string(document)?)
                .await?;
        }
        if let Some(path) = request.file_path.as_deref() {
            if tokio::fs::try_exists(path).await.unwrap_or(false) {
                self.blobs.import_file(path).await?;
            }
        }

        // Serialize writers per fingerprint so two concurrent imports of a
        // novel key cannot both observe "not found".
        let _guard = self.key_locks.acquire(&fp.key).await;

        if let Some(mut record) = self.store.find_document_by_key(&fp.key).await? {
            let mut updated = false;
            updated |= fill_once(
                &mut record.document_remote_id,
                request.document_remote_id.as_deref(),
            );
            updated |= fill_once(&mut record.part_remote_id, request.part_remote_id.as_deref());
            updated |= fill_once(&mut record.display_name, request.display_name.as_deref());
            if updated {
                record.update_time = now_millis();
                self.store.update_document(&record).await?;
                debug!(key = %record.key, id = %record.id, "merged annotations into document");
            }
            return Ok(record);
        }

        let now = now_millis();
        let mut record = DocumentRecord {
            id: String::new(),
            key: fp.key,
            origin_file_name: fp.origin_file_name,
            format_file_name: fp.format_file_name,
            lower_format_file_name: fp.identity.lower_format_file_name,
            content_hash: fp.identity.content_hash,
            side_document_hash: fp.identity.side_document_hash,
            document_number0: request.document_number0.clone().unwrap_or_default(),
            document_number1: request.document_number1.clone().unwrap_or_default(),
            document_number2: request.document_number2.clone().unwrap_or_default(),
            part_number0: request.part_number0.clone().unwrap_or_default(),
            part_number1: request.part_number1.clone().unwrap_or_default(),
            part_number2: request.part_number2.clone().unwrap_or_default(),
            document_remote_id: request.document_remote_id.clone().unwrap_or_default(),
            part_remote_id: request.part_remote_id.clone().unwrap_or_default(),
            display_name: request.display_name.clone().unwrap_or_default(),
            create_time: now,
            update_time: now,
            file_last_write_time: fp.file_last_write_time,
            file_length: fp.file_length,
        };
        record.id = self.store.insert_document(&record).await?;
        debug!(key = %record.key, id = %record.id, "archived new document");
        Ok(record)
    }

    /// Fingerprint-then-lookup without any write.
    pub async fn is_archived(&self, request: &ImportRequest) -> Result<bool> {
        let fp = fingerprint(request).await?;
        self.store.contains_document_key(&fp.key).await
    }

    /// Cache a side document for a primary content hash.
    ///
    /// The canonical serialization goes into the blob store; the relation is
    /// first-write-wins. Returns the side document's content hash.
    pub async fn cache_side_document(
        &self,
        content_hash: &str,
        side_document: &serde_json::Value,
    ) -> Result<String> {
        let side_hash = self
            .blobs
            .import_string(&serde_json::to_string(side_document)?)
            .await?;
        if !self.store.contains_side_relation(content_hash).await? {
            self.store
                .insert_side_relation(&SideDocumentRelation {
                    id: String::new(),
                    content_hash: content_hash.to_string(),
                    side_document_hash: side_hash.clone(),
                })
                .await?;
        }
        Ok(side_hash)
    }

    /// The cached side document for a primary content hash, if a relation
    /// exists and its blob parses as JSON.
    pub async fn side_document_by_content(
        &self,
        content_hash: &str,
    ) -> Result<Option<serde_json::Value>> {
        let relation = match self.store.find_side_relation(content_hash).await? {
            Some(relation) => relation,
            None => return Ok(None),
        };
        match self.blobs.read_string(&relation.side_document_hash).await? {
            Some(text) => Ok(serde_json::from_str(&text).ok()),
            None => Ok(None),
        }
    }

    pub async fn has_side_relation(&self, content_hash: &str) -> Result<bool> {
        self.store.contains_side_relation(content_hash).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;
    use tempfile::TempDir;

    fn archive_over_memory(tmp: &TempDir) -> Archive {
        Archive::new(
            Arc::new(MemoryStore::new()),
            Arc::new(BlobStore::new(tmp.path())),
        )
    }

    fn request_with_number(number: &str) -> ImportRequest {
        ImportRequest {
            document_number0: Some(number.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_archive_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let archive = archive_over_memory(&tmp);

        let first = archive.archive(&request_with_number("D-1")).await.unwrap();
        let second = archive.archive(&request_with_number("D-1")).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.key, second.key);
        assert_eq!(first.update_time, second.update_time);
    }

    #[tokio::test]
    async fn test_fill_once_merge() {
        let tmp = TempDir::new().unwrap();
        let archive = archive_over_memory(&tmp);

        let created = archive.archive(&request_with_number("D-2")).await.unwrap();
        assert!(created.display_name.is_empty());

        let mut with_name = request_with_number("D-2");
        with_name.display_name = Some("X".into());
        let merged = archive.archive(&with_name).await.unwrap();
        assert_eq!(merged.display_name, "X");
        assert!(merged.update_time >= created.update_time);

        let mut with_other_name = request_with_number("D-2");
        with_other_name.display_name = Some("Y".into());
        let unchanged = archive.archive(&with_other_name).await.unwrap();
        assert_eq!(unchanged.display_name, "X");
        assert_eq!(unchanged.update_time, merged.update_time);
    }

    #[tokio::test]
    async fn test_is_archived_does_not_write() {
        let tmp = TempDir::new().unwrap();
        let archive = archive_over_memory(&tmp);

        assert!(!archive.is_archived(&request_with_number("D-3")).await.unwrap());
        archive.archive(&request_with_number("D-3")).await.unwrap();
        assert!(archive.is_archived(&request_with_number("D-3")).await.unwrap());
    }

    #[tokio::test]
    async fn test_side_document_cache_first_write_wins() {
        let tmp = TempDir::new().unwrap();
        let archive = archive_over_memory(&tmp);

        archive
            .cache_side_document("c1", &json!({"rev": 1}))
            .await
            .unwrap();
        archive
            .cache_side_document("c1", &json!({"rev": 2}))
            .await
            .unwrap();

        let cached = archive.side_document_by_content("c1").await.unwrap();
        assert_eq!(cached, Some(json!({"rev": 1})));
        assert!(archive.has_side_relation("c1").await.unwrap());
        assert!(archive.side_document_by_content("nope").await.unwrap().is_none());
    }
}
