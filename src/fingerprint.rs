//! Deterministic fingerprinting of import requests.
//!
//! An import is reduced to its canonical *abstract* — the subset of fields
//! that define document identity — and the identity key is the SHA-256 of the
//! abstract's compact JSON serialization. Paths, path casing, and annotation
//! fields (remote ids, display name) never participate, so re-imports of the
//! same logical document always land on the same key.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::path::Path;
use std::time::SystemTime;

use crate::blob::{empty_hash, hash_bytes};
use crate::models::ImportRequest;

/// A version segment is a `.<digits>` token at the end of a file name,
/// optionally followed by the final extension: `part.0002` and
/// `part.001.step` both carry one, `report.2024.final.txt` does not.
static VERSION_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.\d+(\.[^.]+)?$").expect("valid version-segment regex"));

/// Strictly trailing `.<digits>` suffix, used by the reconciliation scanner
/// to collapse sequential revisions of the same file.
static TRAILING_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.(\d+)$").expect("valid trailing-version regex"));

/// Remove the version segment from a file name, keeping the extension:
/// `part.001.step` → `part.step`, `part.0002` → `part`.
pub fn strip_version_suffix(file_name: &str) -> String {
    VERSION_SEGMENT.replace(file_name, "$1").into_owned()
}

/// The numeric value of a strictly trailing `.<digits>` suffix, if any.
pub fn trailing_version(file_name: &str) -> Option<u64> {
    TRAILING_VERSION
        .captures(file_name)
        .and_then(|caps| caps[1].parse().ok())
}

/// Case-folded, version-suffix-stripped form of a path's file name — the
/// filename-level identity documents and disk files are matched on.
pub fn lower_format_file_name(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    strip_version_suffix(&name).to_lowercase()
}

/// The canonical subset of an import's fields that defines its identity.
///
/// Serialization order is fixed by field order; classifiers that were not
/// supplied are omitted entirely (not serialized as empty), so "absent" and
/// "empty string" are distinct identities, matching the upstream clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentAbstract {
    pub lower_format_file_name: String,
    pub content_hash: String,
    pub side_document_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_number0: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_number1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_number2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_number0: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_number1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_number2: Option<String>,
}

/// Everything the fingerprinter derives from a single import request.
#[derive(Debug, Clone)]
pub struct Fingerprint {
    pub identity: DocumentAbstract,
    /// SHA-256 of the abstract's canonical serialization.
    pub key: String,
    pub origin_file_name: String,
    pub format_file_name: String,
    /// Unix millis of the file's last write, 0 when the file is absent.
    pub file_last_write_time: i64,
    /// File length in bytes, 0 when the file is absent.
    pub file_length: i64,
}

/// Unix-milli form of a filesystem timestamp.
pub fn system_time_millis(time: SystemTime) -> i64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Fingerprint an import request.
///
/// Reads the file's bytes and metadata when the path exists; a missing or
/// pathless import hashes to the empty-content sentinel instead. No writes,
/// deterministic for a given filesystem state.
pub async fn fingerprint(request: &ImportRequest) -> Result<Fingerprint> {
    let origin_file_name = request
        .file_path
        .as_deref()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let format_file_name = if origin_file_name.is_empty() {
        String::new()
    } else {
        strip_version_suffix(&origin_file_name)
    };

    let mut content_hash = empty_hash();
    let mut file_last_write_time = 0i64;
    let mut file_length = 0i64;
    if let Some(path) = request.file_path.as_deref() {
        if let Ok(metadata) = tokio::fs::metadata(path).await {
            if metadata.is_file() {
                let bytes = tokio::fs::read(path)
                    .await
                    .with_context(|| format!("Failed to read import file: {}", path.display()))?;
                content_hash = hash_bytes(&bytes);
                file_last_write_time = metadata
                    .modified()
                    .map(system_time_millis)
                    .unwrap_or_default();
                file_length = metadata.len() as i64;
            }
        }
    }

    let side_document_hash = match &request.side_document {
        Some(document) => hash_bytes(serde_json::to_string(document)?.as_bytes()),
        None => empty_hash(),
    };

    let identity = DocumentAbstract {
        lower_format_file_name: format_file_name.to_lowercase(),
        content_hash,
        side_document_hash,
        document_number0: request.document_number0.clone(),
        document_number1: request.document_number1.clone(),
        document_number2: request.document_number2.clone(),
        part_number0: request.part_number0.clone(),
        part_number1: request.part_number1.clone(),
        part_number2: request.part_number2.clone(),
    };
    let key = hash_bytes(serde_json::to_string(&identity)?.as_bytes());

    Ok(Fingerprint {
        identity,
        key,
        origin_file_name,
        format_file_name,
        file_last_write_time,
        file_length,
    })
}
