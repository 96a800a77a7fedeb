//! Record-store abstraction.
//!
//! [`RecordStore`] captures exactly the read/write contract the identity
//! engine requires — indexed lookups and whole-record writes — so the engine
//! never depends on how records are physically stored. Two backends are
//! provided: [`SqliteStore`] for production and [`MemoryStore`] for tests.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{DirectoryRecord, DocumentRecord, SideDocumentRelation};

/// Abstract indexed record store.
///
/// Lookups that legitimately find nothing return `Ok(None)` / empty vectors;
/// `Err` always means the store itself failed and is propagated unmodified.
///
/// The store must enforce uniqueness of `documents.key` at insert time —
/// that guarantee is what makes concurrent duplicate inserts on the same
/// fingerprint fail instead of silently forking an identity.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new document; the store assigns and returns its id.
    async fn insert_document(&self, record: &DocumentRecord) -> Result<String>;

    /// Update an existing document by primary key.
    async fn update_document(&self, record: &DocumentRecord) -> Result<()>;

    /// Exact-match lookup on the unique `key` index.
    async fn find_document_by_key(&self, key: &str) -> Result<Option<DocumentRecord>>;

    /// Membership test on the unique `key` index, without materializing rows.
    async fn contains_document_key(&self, key: &str) -> Result<bool>;

    /// Primary-key lookup.
    async fn find_document_by_id(&self, id: &str) -> Result<Option<DocumentRecord>>;

    /// Insert a new directory bucket; the store assigns and returns its id.
    async fn insert_directory(&self, record: &DirectoryRecord) -> Result<String>;

    /// Update an existing bucket by primary key.
    async fn update_directory(&self, record: &DirectoryRecord) -> Result<()>;

    /// All buckets for a normalized path, in bucket-creation order.
    async fn find_directories_by_path(&self, path: &str) -> Result<Vec<DirectoryRecord>>;

    /// Insert a content→side-document relation; returns its id.
    async fn insert_side_relation(&self, relation: &SideDocumentRelation) -> Result<String>;

    /// Exact-match lookup on the unique `content_hash` index.
    async fn find_side_relation(&self, content_hash: &str)
        -> Result<Option<SideDocumentRelation>>;

    /// Membership test on the unique `content_hash` index.
    async fn contains_side_relation(&self, content_hash: &str) -> Result<bool>;
}
