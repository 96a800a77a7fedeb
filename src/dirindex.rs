//! Capacity-bounded directory-to-document indexing.
//!
//! Each normalized directory path owns an ordered series of buckets
//! ([`DirectoryRecord`]s) of at most [`BUCKET_CAPACITY`] document ids. New
//! ids greedily fill the remaining capacity of existing buckets, then spill
//! into freshly created ones. Placement is best-effort bin-packing — already
//! placed ids are never reshuffled into denser packings.

use anyhow::Result;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

use crate::locks::KeyedLocks;
use crate::models::{DirectoryRecord, DocumentRecord};
use crate::store::RecordStore;

/// Maximum non-sentinel entries per bucket.
pub const BUCKET_CAPACITY: usize = 32;

/// Canonical form of a directory path: backslashes become forward slashes,
/// everything is lower-cased.
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/").to_lowercase()
}

/// Computed placement of pending ids into a path's buckets.
#[derive(Debug, Default, PartialEq, Eq)]
struct Placement {
    /// Existing buckets that changed and must be persisted.
    updated: Vec<DirectoryRecord>,
    /// Slot arrays for buckets that must be created, in creation order.
    created: Vec<Vec<String>>,
}

/// Pure placement planning over a snapshot of the path's buckets.
///
/// Ids already present anywhere under the path, sentinel entries, and
/// within-call duplicates are dropped from the pending list before filling.
/// Buckets are persisted (with their sentinel slots compacted away) only
/// when at least one id was inserted.
fn plan_placement(buckets: &[DirectoryRecord], ids: &[String]) -> Placement {
    let present: HashSet<&str> = buckets
        .iter()
        .flat_map(DirectoryRecord::live_documents)
        .collect();

    let mut seen = HashSet::new();
    let mut pending: Vec<&String> = ids
        .iter()
        .filter(|id| !id.is_empty() && !present.contains(id.as_str()) && seen.insert(id.as_str()))
        .collect();
    pending.reverse(); // take from the front via pop()

    let mut placement = Placement::default();

    for bucket in buckets {
        let mut live: Vec<String> = bucket
            .live_documents()
            .map(str::to_string)
            .collect();
        let mut inserted = false;
        while live.len() < BUCKET_CAPACITY {
            match pending.pop() {
                Some(id) => {
                    live.push(id.clone());
                    inserted = true;
                }
                None => break,
            }
        }
        if inserted {
            placement.updated.push(DirectoryRecord {
                id: bucket.id.clone(),
                path: bucket.path.clone(),
                documents: live,
            });
        }
    }

    while !pending.is_empty() {
        let chunk: Vec<String> = pending
            .drain(pending.len().saturating_sub(BUCKET_CAPACITY)..)
            .rev()
            .cloned()
            .collect();
        placement.created.push(chunk);
    }

    placement
}

#[derive(Clone)]
pub struct DirectoryIndex {
    store: Arc<dyn RecordStore>,
    path_locks: KeyedLocks,
}

impl DirectoryIndex {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            path_locks: KeyedLocks::new(),
        }
    }

    /// Track `document_ids` under `path`.
    ///
    /// Read-modify-write over the path's buckets, serialized per normalized
    /// path so concurrent imports into one directory cannot clobber each
    /// other's membership changes.
    pub async fn add_to_directory(&self, path: &str, document_ids: &[String]) -> Result<()> {
        let path = normalize_path(path);
        let _guard = self.path_locks.acquire(&path).await;

        let buckets = self.store.find_directories_by_path(&path).await?;
        let placement = plan_placement(&buckets, document_ids);
        for bucket in &placement.updated {
            self.store.update_directory(bucket).await?;
        }
        for documents in placement.created {
            self.store
                .insert_directory(&DirectoryRecord {
                    id: String::new(),
                    path: path.clone(),
                    documents,
                })
                .await?;
        }
        Ok(())
    }

    /// All document ids tracked under `path`, in bucket-creation order.
    pub async fn document_ids(&self, path: &str) -> Result<Vec<String>> {
        let path = normalize_path(path);
        let buckets = self.store.find_directories_by_path(&path).await?;
        let mut seen = HashSet::new();
        Ok(buckets
            .iter()
            .flat_map(DirectoryRecord::live_documents)
            .filter(|id| seen.insert(id.to_string()))
            .map(str::to_string)
            .collect())
    }

    /// All document records tracked under `path`. Ids whose record has
    /// vanished from the store are skipped.
    pub async fn documents_of(&self, path: &str) -> Result<Vec<DocumentRecord>> {
        let mut records = Vec::new();
        for id in self.document_ids(path).await? {
            match self.store.find_document_by_id(&id).await? {
                Some(record) => records.push(record),
                None => warn!(%id, "directory bucket references a missing document"),
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(id: &str, documents: &[&str]) -> DirectoryRecord {
        DirectoryRecord {
            id: id.to_string(),
            path: "p".to_string(),
            documents: documents.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("doc-{i}")).collect()
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(r"C:\Work\Parts"), "c:/work/parts");
        assert_eq!(normalize_path("/ws/Parts"), "/ws/parts");
    }

    #[test]
    fn test_empty_directory_chunks_into_capacity_buckets() {
        let placement = plan_placement(&[], &ids(40));
        assert!(placement.updated.is_empty());
        assert_eq!(placement.created.len(), 2);
        assert_eq!(placement.created[0].len(), BUCKET_CAPACITY);
        assert_eq!(placement.created[1].len(), 8);
        assert_eq!(placement.created[0][0], "doc-0");
        assert_eq!(placement.created[1][7], "doc-39");
    }

    #[test]
    fn test_fills_existing_bucket_before_creating() {
        let existing = bucket("b1", &["a", "b"]);
        let placement = plan_placement(&[existing], &ids(31));
        assert_eq!(placement.updated.len(), 1);
        assert_eq!(placement.updated[0].documents.len(), BUCKET_CAPACITY);
        assert_eq!(placement.created.len(), 1);
        assert_eq!(placement.created[0].len(), 1);
        assert_eq!(placement.created[0][0], "doc-30");
    }

    #[test]
    fn test_sentinels_do_not_count_toward_capacity() {
        let mut slots: Vec<&str> = vec![""; 4];
        slots.extend(["a", "b"]);
        let existing = bucket("b1", &slots);
        let placement = plan_placement(&[existing], &["c".to_string()]);
        assert_eq!(placement.updated.len(), 1);
        // Sentinels are compacted away on persist
        assert_eq!(placement.updated[0].documents, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_present_ids_are_not_reinserted_anywhere() {
        let b1 = bucket("b1", &["a"]);
        let mut full: Vec<String> = ids(BUCKET_CAPACITY);
        full[0] = "b".to_string();
        let b2 = DirectoryRecord {
            id: "b2".to_string(),
            path: "p".to_string(),
            documents: full,
        };
        // "b" lives in a full bucket; it must not spill into b1 or a new one
        let placement = plan_placement(&[b1, b2], &["b".to_string()]);
        assert!(placement.updated.is_empty());
        assert!(placement.created.is_empty());
    }

    #[test]
    fn test_duplicate_pending_ids_collapse() {
        let placement = plan_placement(&[], &["x".to_string(), "x".to_string()]);
        assert_eq!(placement.created.len(), 1);
        assert_eq!(placement.created[0], vec!["x"]);
    }

    #[test]
    fn test_unchanged_bucket_not_persisted() {
        let existing = bucket("b1", &["a"]);
        let placement = plan_placement(&[existing], &["a".to_string()]);
        assert!(placement.updated.is_empty());
        assert!(placement.created.is_empty());
    }
}
