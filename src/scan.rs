//! Filesystem reconciliation scanning.
//!
//! Compares a directory's tracked document set against the files physically
//! present, classifying every tracked document into exactly one of
//! unchanged / modified / missing and every unmatched file as untracked.
//! Sequential revisions (`part.0001`, `part.0002`, …) collapse to the
//! greatest-numbered file first; the discarded revisions participate in
//! nothing. Side documents are attached concurrently at the end, one task
//! per document, with failures isolated per document.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::debug;

use crate::blob::BlobStore;
use crate::fingerprint::{strip_version_suffix, system_time_millis, trailing_version};
use crate::models::DocumentRecord;

/// A tracked document in a scan result, with its side document attached when
/// one could be loaded from the blob store.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannedDocument {
    #[serde(flatten)]
    pub document: DocumentRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side_document: Option<serde_json::Value>,
}

impl ScannedDocument {
    fn new(document: DocumentRecord) -> Self {
        Self {
            document,
            side_document: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub unchanged: Vec<ScannedDocument>,
    pub modified: Vec<ScannedDocument>,
    pub missing: Vec<ScannedDocument>,
    pub untracked_files: Vec<String>,
}

/// A directory entry surviving into classification.
#[derive(Debug, Clone)]
struct FileEntry {
    name: String,
    path: PathBuf,
    modified_millis: i64,
    length: i64,
}

#[derive(Clone)]
pub struct Scanner {
    blobs: Arc<BlobStore>,
}

impl Scanner {
    pub fn new(blobs: Arc<BlobStore>) -> Self {
        Self { blobs }
    }

    /// Reconcile `tracked` against the files under `path`.
    ///
    /// A listing failure fails the whole scan; side-document attachment
    /// failures only leave the affected entry without content.
    pub async fn scan(&self, path: &Path, tracked: Vec<DocumentRecord>) -> Result<ScanResult> {
        let files = list_files(path).await?;
        let survivors = collapse_versions(files);
        let mut result = classify(&tracked, &survivors);
        self.attach_side_documents(&mut result).await;
        Ok(result)
    }

    async fn attach_side_documents(&self, result: &mut ScanResult) {
        let mut tasks: JoinSet<(usize, usize, Option<serde_json::Value>)> = JoinSet::new();
        let groups = [&result.unchanged, &result.modified, &result.missing];
        for (group, entries) in groups.iter().enumerate() {
            for (index, entry) in entries.iter().enumerate() {
                let blobs = self.blobs.clone();
                let hash = entry.document.side_document_hash.clone();
                tasks.spawn(async move {
                    let value = load_side_document(&blobs, &hash).await;
                    (group, index, value)
                });
            }
        }

        while let Some(joined) = tasks.join_next().await {
            // A panicked attachment task is isolated like any other failure
            let Ok((group, index, value)) = joined else {
                continue;
            };
            if value.is_none() {
                continue;
            }
            let entries = match group {
                0 => &mut result.unchanged,
                1 => &mut result.modified,
                _ => &mut result.missing,
            };
            entries[index].side_document = value;
        }
    }
}

/// Load and parse a side document by hash; any failure yields `None`.
async fn load_side_document(blobs: &BlobStore, hash: &str) -> Option<serde_json::Value> {
    match blobs.read_string(hash).await {
        Ok(Some(text)) => match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(err) => {
                debug!(%hash, %err, "cached side document is not valid JSON");
                None
            }
        },
        Ok(None) => None,
        Err(err) => {
            debug!(%hash, %err, "failed to read side document blob");
            None
        }
    }
}

/// Non-recursive file listing, sorted by name for deterministic output.
async fn list_files(path: &Path) -> Result<Vec<FileEntry>> {
    let mut dir = tokio::fs::read_dir(path)
        .await
        .with_context(|| format!("Failed to list directory: {}", path.display()))?;
    let mut files = Vec::new();
    while let Some(entry) = dir
        .next_entry()
        .await
        .with_context(|| format!("Failed to read directory entry under {}", path.display()))?
    {
        let metadata = match entry.metadata().await {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => continue,
        };
        let modified_millis = metadata
            .modified()
            .map(system_time_millis)
            .unwrap_or_default();
        files.push(FileEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            path: entry.path(),
            modified_millis,
            length: metadata.len() as i64,
        });
    }
    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

/// Keep only the numerically greatest revision per case-folded stem among
/// files carrying a trailing `.<digits>` suffix. Ties keep the first seen.
/// Files without such a suffix always survive.
fn collapse_versions(files: Vec<FileEntry>) -> Vec<FileEntry> {
    let mut best: HashMap<String, (u64, usize)> = HashMap::new();
    let mut dropped = vec![false; files.len()];
    for (index, file) in files.iter().enumerate() {
        let Some(version) = trailing_version(&file.name) else {
            continue;
        };
        let stem = Path::new(&file.name)
            .file_stem()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match best.get_mut(&stem) {
            Some((current, holder)) => {
                if version > *current {
                    dropped[*holder] = true;
                    *current = version;
                    *holder = index;
                } else {
                    dropped[index] = true;
                }
            }
            None => {
                best.insert(stem, (version, index));
            }
        }
    }
    files
        .into_iter()
        .enumerate()
        .filter(|(index, _)| !dropped[*index])
        .map(|(_, file)| file)
        .collect()
}

/// Pure classification of surviving files against the tracked set.
fn classify(tracked: &[DocumentRecord], files: &[FileEntry]) -> ScanResult {
    let mut result = ScanResult::default();
    let mut classified: HashSet<&str> = HashSet::new();

    for file in files {
        let lower_name = strip_version_suffix(&file.name).to_lowercase();
        let document = tracked
            .iter()
            .find(|d| d.lower_format_file_name == lower_name);
        match document {
            None => result.untracked_files.push(file.path.display().to_string()),
            Some(document) => {
                if !classified.insert(document.id.as_str()) {
                    // Another surviving file already accounted for this one
                    continue;
                }
                let modified = document.file_last_write_time != file.modified_millis
                    || document.file_length != file.length;
                let entry = ScannedDocument::new(document.clone());
                if modified {
                    result.modified.push(entry);
                } else {
                    result.unchanged.push(entry);
                }
            }
        }
    }

    for document in tracked {
        if !classified.contains(document.id.as_str()) {
            result.missing.push(ScannedDocument::new(document.clone()));
        }
    }

    result
}
