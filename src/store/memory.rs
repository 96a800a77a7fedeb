//! In-memory [`RecordStore`] implementation for testing.
//!
//! Uses `Vec`s behind `std::sync::RwLock` for thread safety. Insertion order
//! of directory buckets doubles as bucket-creation order, matching the rowid
//! ordering of the SQLite backend.

use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{DirectoryRecord, DocumentRecord, SideDocumentRelation};

use super::RecordStore;

#[derive(Default)]
pub struct MemoryStore {
    documents: RwLock<Vec<DocumentRecord>>,
    directories: RwLock<Vec<DirectoryRecord>>,
    relations: RwLock<Vec<SideDocumentRelation>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert_document(&self, record: &DocumentRecord) -> Result<String> {
        let mut documents = self.documents.write().unwrap();
        if documents.iter().any(|d| d.key == record.key) {
            bail!("duplicate document key: {}", record.key);
        }
        let id = Uuid::new_v4().to_string();
        let mut stored = record.clone();
        stored.id = id.clone();
        documents.push(stored);
        Ok(id)
    }

    async fn update_document(&self, record: &DocumentRecord) -> Result<()> {
        let mut documents = self.documents.write().unwrap();
        match documents.iter_mut().find(|d| d.id == record.id) {
            Some(stored) => {
                *stored = record.clone();
                Ok(())
            }
            None => bail!("no document with id: {}", record.id),
        }
    }

    async fn find_document_by_key(&self, key: &str) -> Result<Option<DocumentRecord>> {
        let documents = self.documents.read().unwrap();
        Ok(documents.iter().find(|d| d.key == key).cloned())
    }

    async fn contains_document_key(&self, key: &str) -> Result<bool> {
        let documents = self.documents.read().unwrap();
        Ok(documents.iter().any(|d| d.key == key))
    }

    async fn find_document_by_id(&self, id: &str) -> Result<Option<DocumentRecord>> {
        let documents = self.documents.read().unwrap();
        Ok(documents.iter().find(|d| d.id == id).cloned())
    }

    async fn insert_directory(&self, record: &DirectoryRecord) -> Result<String> {
        let mut directories = self.directories.write().unwrap();
        let id = Uuid::new_v4().to_string();
        let mut stored = record.clone();
        stored.id = id.clone();
        directories.push(stored);
        Ok(id)
    }

    async fn update_directory(&self, record: &DirectoryRecord) -> Result<()> {
        let mut directories = self.directories.write().unwrap();
        match directories.iter_mut().find(|d| d.id == record.id) {
            Some(stored) => {
                *stored = record.clone();
                Ok(())
            }
            None => bail!("no directory with id: {}", record.id),
        }
    }

    async fn find_directories_by_path(&self, path: &str) -> Result<Vec<DirectoryRecord>> {
        let directories = self.directories.read().unwrap();
        Ok(directories
            .iter()
            .filter(|d| d.path == path)
            .cloned()
            .collect())
    }

    async fn insert_side_relation(&self, relation: &SideDocumentRelation) -> Result<String> {
        let mut relations = self.relations.write().unwrap();
        if relations
            .iter()
            .any(|r| r.content_hash == relation.content_hash)
        {
            bail!("duplicate content hash: {}", relation.content_hash);
        }
        let id = Uuid::new_v4().to_string();
        let mut stored = relation.clone();
        stored.id = id.clone();
        relations.push(stored);
        Ok(id)
    }

    async fn find_side_relation(
        &self,
        content_hash: &str,
    ) -> Result<Option<SideDocumentRelation>> {
        let relations = self.relations.read().unwrap();
        Ok(relations
            .iter()
            .find(|r| r.content_hash == content_hash)
            .cloned())
    }

    async fn contains_side_relation(&self, content_hash: &str) -> Result<bool> {
        let relations = self.relations.read().unwrap();
        Ok(relations.iter().any(|r| r.content_hash == content_hash))
    }
}
