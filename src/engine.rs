//! Identity-engine wiring and high-level operations.
//!
//! [`Engine`] composes the archive, directory index, resolver, and scanner
//! over one record store and one blob store, and exposes the operations the
//! CLI and HTTP server call: batch import, imported-state queries, resolved
//! directory listings, and reconciliation scans. The stores are explicit
//! dependencies — the engine holds no ambient state of its own.

use anyhow::Result;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::archive::Archive;
use crate::blob::BlobStore;
use crate::dirindex::DirectoryIndex;
use crate::models::{DocumentRecord, ImportRequest};
use crate::resolver::resolve_latest;
use crate::scan::{ScanResult, Scanner};
use crate::store::RecordStore;

/// Per-request result of an `is_imported` batch query.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportState {
    pub request: ImportRequest,
    pub is_imported: bool,
}

#[derive(Clone)]
pub struct Engine {
    pub archive: Archive,
    pub index: DirectoryIndex,
    pub scanner: Scanner,
}

impl Engine {
    pub fn new(store: Arc<dyn RecordStore>, blobs: Arc<BlobStore>) -> Self {
        Self {
            archive: Archive::new(store.clone(), blobs.clone()),
            index: DirectoryIndex::new(store),
            scanner: Scanner::new(blobs),
        }
    }

    /// Archive every request, then index the resulting ids under their
    /// requests' directories (one bucket pass per distinct directory).
    pub async fn import(&self, requests: &[ImportRequest]) -> Result<Vec<DocumentRecord>> {
        let mut records = Vec::with_capacity(requests.len());
        let mut by_directory: HashMap<String, Vec<String>> = HashMap::new();
        let mut directory_order: Vec<String> = Vec::new();

        for request in requests {
            let record = self.archive.archive(request).await?;
            if let Some(directory) = request.directory.as_deref() {
                let key = directory.to_lowercase();
                if !by_directory.contains_key(&key) {
                    directory_order.push(key.clone());
                }
                by_directory.entry(key).or_default().push(record.id.clone());
            }
            records.push(record);
        }

        for directory in directory_order {
            let ids = &by_directory[&directory];
            self.index.add_to_directory(&directory, ids).await?;
        }

        Ok(records)
    }

    /// Imported-state of each request, without any write.
    pub async fn is_imported(&self, requests: &[ImportRequest]) -> Result<Vec<ImportState>> {
        let mut states = Vec::with_capacity(requests.len());
        for request in requests {
            let is_imported = self.archive.is_archived(request).await?;
            states.push(ImportState {
                request: request.clone(),
                is_imported,
            });
        }
        Ok(states)
    }

    /// The directory's tracked set reduced to one representative per logical
    /// identity.
    pub async fn documents_by_directory(&self, path: &str) -> Result<Vec<DocumentRecord>> {
        let records = self.index.documents_of(path).await?;
        Ok(resolve_latest(&records))
    }

    /// Reconcile a directory against the filesystem.
    pub async fn scan_directory(&self, path: &Path) -> Result<ScanResult> {
        let tracked = self
            .documents_by_directory(&path.to_string_lossy())
            .await?;
        self.scanner.scan(path, tracked).await
    }
}
