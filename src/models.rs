//! Core data models used throughout DocVault.
//!
//! These types represent the tracked documents, directory buckets, and import
//! requests that flow through the identity engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Current wall-clock time as unix milliseconds.
///
/// All persisted timestamps (`create_time`, `update_time`,
/// `file_last_write_time`) use this resolution; the reconciliation scanner
/// compares file modification times at the same granularity.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A tracked document, persisted in the record store.
///
/// `key` is the identity fingerprint (unique index); `id` is assigned by the
/// store at insert and never changes. Classifier and annotation fields use
/// the empty string for "not supplied".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: String,
    pub key: String,
    pub origin_file_name: String,
    pub format_file_name: String,
    pub lower_format_file_name: String,
    pub content_hash: String,
    pub side_document_hash: String,
    pub document_number0: String,
    pub document_number1: String,
    pub document_number2: String,
    pub part_number0: String,
    pub part_number1: String,
    pub part_number2: String,
    pub document_remote_id: String,
    pub part_remote_id: String,
    pub display_name: String,
    pub create_time: i64,
    pub update_time: i64,
    pub file_last_write_time: i64,
    pub file_length: i64,
}

/// One capacity-bounded bucket mapping a normalized directory path to
/// document ids.
///
/// A directory's full document set is the union of all buckets sharing its
/// `path`, in bucket-creation order. Empty-string entries are reserved slots
/// with no document and are filtered out before membership tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryRecord {
    pub id: String,
    pub path: String,
    pub documents: Vec<String>,
}

impl DirectoryRecord {
    /// Non-sentinel document ids in slot order.
    pub fn live_documents(&self) -> impl Iterator<Item = &str> {
        self.documents
            .iter()
            .filter(|id| !id.is_empty())
            .map(String::as_str)
    }
}

/// Relation between a primary file's content hash and a cached side-document
/// hash in the blob store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SideDocumentRelation {
    pub id: String,
    pub content_hash: String,
    pub side_document_hash: String,
}

/// An import request as submitted by a client.
///
/// Everything is optional: a request with no file path and no classifiers
/// still fingerprints (to the all-empty abstract). `directory`, the remote
/// ids, and `display_name` are annotations — they never participate in
/// identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportRequest {
    pub file_path: Option<PathBuf>,
    pub directory: Option<String>,
    pub side_document: Option<serde_json::Value>,
    pub document_number0: Option<String>,
    pub document_number1: Option<String>,
    pub document_number2: Option<String>,
    pub part_number0: Option<String>,
    pub part_number1: Option<String>,
    pub part_number2: Option<String>,
    pub document_remote_id: Option<String>,
    pub part_remote_id: Option<String>,
    pub display_name: Option<String>,
}
