//! Canonical zone: immutable, content-addressed snapshot publishing.
//!
//! Snapshots are staged into `canonical/.staging/` and moved into place
//! with a single rename, so readers never observe a partial snapshot.
//! Part files are JSON-lines of canonical record payloads; the content
//! hash covers part filenames and bytes in sorted filename order.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::core::records::CanonicalRecord;
use crate::store::errors::StorageError;
use crate::store::layout::{
    canonical_staging_dir, canonical_version_dir, CANONICAL_METADATA_FILE,
};

fn io_error(path: &Path, err: impl std::fmt::Display) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        detail: err.to_string(),
    }
}

/// Serialize canonical records as a JSON-lines part.
///
/// One canonical-JSON object per line; deterministic bytes so the snapshot
/// content hash is reproducible from the records alone.
pub fn serialize_canonical_records(
    records: &[CanonicalRecord],
) -> Result<Vec<u8>, StorageError> {
    let mut bytes = Vec::new();
    for record in records {
        let value = crate::core::canonical::to_canonical_value(record)?;
        bytes.extend_from_slice(crate::core::canonical::canonical_json(&value).as_bytes());
        bytes.push(b'\n');
    }
    Ok(bytes)
}

pub fn deserialize_canonical_records(bytes: &[u8]) -> Result<Vec<CanonicalRecord>, StorageError> {
    let text = std::str::from_utf8(bytes).map_err(|err| StorageError::MetadataInvalid {
        path: "part".to_string(),
        detail: err.to_string(),
    })?;
    let mut records = Vec::new();
    for (line_number, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: CanonicalRecord =
            serde_json::from_str(line).map_err(|err| StorageError::RegistryCorrupt {
                path: "part".to_string(),
                line: line_number + 1,
                detail: err.to_string(),
            })?;
        records.push(record);
    }
    Ok(records)
}

/// Hash part files: sorted by filename, `name \0 bytes` per part.
fn hash_parts(parts: &BTreeMap<String, Vec<u8>>) -> String {
    let mut hasher = Sha256::new();
    for (name, bytes) in parts {
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(bytes);
    }
    format!("{:x}", hasher.finalize())
}

/// A staged, not-yet-visible snapshot.
#[derive(Debug, Clone)]
pub struct StagedSnapshot {
    pub dataset_id: String,
    pub dataset_version: String,
    pub staging_dir: PathBuf,
    pub version_dir: PathBuf,
    pub content_hash: String,
    pub row_count: usize,
}

/// A published, immutable snapshot.
#[derive(Debug, Clone)]
pub struct PublishedSnapshot {
    pub dataset_id: String,
    pub dataset_version: String,
    pub version_dir: PathBuf,
    pub content_hash: String,
    pub row_count: usize,
}

/// Write parts and metadata into the staging area and compute the content
/// hash. Publishing an already-published version is rejected up front.
pub fn stage_canonical_snapshot(
    canonical_root: &Path,
    dataset_id: &str,
    dataset_version: &str,
    parts: &BTreeMap<String, Vec<u8>>,
    metadata: &Value,
    row_count: usize,
) -> Result<StagedSnapshot, StorageError> {
    let version_dir = canonical_version_dir(canonical_root, dataset_id, dataset_version);
    if version_dir.exists() {
        return Err(StorageError::SnapshotExists {
            dataset_id: dataset_id.to_string(),
            dataset_version: dataset_version.to_string(),
        });
    }
    let staging_dir = canonical_staging_dir(canonical_root, dataset_id, dataset_version);
    if staging_dir.exists() {
        fs::remove_dir_all(&staging_dir).map_err(|err| io_error(&staging_dir, err))?;
    }
    fs::create_dir_all(&staging_dir).map_err(|err| io_error(&staging_dir, err))?;
    for (name, bytes) in parts {
        let part_path = staging_dir.join(name);
        fs::write(&part_path, bytes).map_err(|err| io_error(&part_path, err))?;
    }
    let metadata_path = staging_dir.join(CANONICAL_METADATA_FILE);
    fs::write(
        &metadata_path,
        crate::core::canonical::canonical_json(metadata),
    )
    .map_err(|err| io_error(&metadata_path, err))?;
    Ok(StagedSnapshot {
        dataset_id: dataset_id.to_string(),
        dataset_version: dataset_version.to_string(),
        staging_dir,
        version_dir,
        content_hash: hash_parts(parts),
        row_count,
    })
}

/// Atomically move a staged snapshot into the canonical zone.
pub fn publish_canonical_snapshot(
    staged: StagedSnapshot,
) -> Result<PublishedSnapshot, StorageError> {
    if staged.version_dir.exists() {
        return Err(StorageError::SnapshotExists {
            dataset_id: staged.dataset_id,
            dataset_version: staged.dataset_version,
        });
    }
    if let Some(parent) = staged.version_dir.parent() {
        fs::create_dir_all(parent).map_err(|err| io_error(parent, err))?;
    }
    fs::rename(&staged.staging_dir, &staged.version_dir)
        .map_err(|err| io_error(&staged.version_dir, err))?;
    info!(
        dataset_id = staged.dataset_id.as_str(),
        dataset_version = staged.dataset_version.as_str(),
        content_hash = staged.content_hash.as_str(),
        row_count = staged.row_count,
        "store.snapshot_published"
    );
    Ok(PublishedSnapshot {
        dataset_id: staged.dataset_id,
        dataset_version: staged.dataset_version,
        version_dir: staged.version_dir,
        content_hash: staged.content_hash,
        row_count: staged.row_count,
    })
}

/// Recompute a published snapshot's content hash from disk.
pub fn compute_snapshot_content_hash(
    canonical_root: &Path,
    dataset_id: &str,
    dataset_version: &str,
) -> Result<String, StorageError> {
    let version_dir = canonical_version_dir(canonical_root, dataset_id, dataset_version);
    if !version_dir.is_dir() {
        return Err(StorageError::SnapshotMissing {
            dataset_id: dataset_id.to_string(),
            dataset_version: dataset_version.to_string(),
            path: version_dir.display().to_string(),
        });
    }
    let mut parts: BTreeMap<String, Vec<u8>> = BTreeMap::new();
    let entries = fs::read_dir(&version_dir).map_err(|err| io_error(&version_dir, err))?;
    for entry in entries {
        let entry = entry.map_err(|err| io_error(&version_dir, err))?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with("part-") {
            let bytes = fs::read(entry.path()).map_err(|err| io_error(&entry.path(), err))?;
            parts.insert(name, bytes);
        }
    }
    if parts.is_empty() {
        return Err(StorageError::SnapshotMissing {
            dataset_id: dataset_id.to_string(),
            dataset_version: dataset_version.to_string(),
            path: version_dir.display().to_string(),
        });
    }
    Ok(hash_parts(&parts))
}

/// Load the records and metadata of a published snapshot.
pub fn read_canonical_snapshot(
    canonical_root: &Path,
    dataset_id: &str,
    dataset_version: &str,
) -> Result<(Vec<CanonicalRecord>, Value), StorageError> {
    let version_dir = canonical_version_dir(canonical_root, dataset_id, dataset_version);
    let metadata_path = version_dir.join(CANONICAL_METADATA_FILE);
    let metadata_raw =
        fs::read_to_string(&metadata_path).map_err(|err| io_error(&metadata_path, err))?;
    let metadata: Value =
        serde_json::from_str(&metadata_raw).map_err(|err| StorageError::MetadataInvalid {
            path: metadata_path.display().to_string(),
            detail: err.to_string(),
        })?;
    let mut records = Vec::new();
    let mut part_names: Vec<PathBuf> = fs::read_dir(&version_dir)
        .map_err(|err| io_error(&version_dir, err))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .map(|name| name.to_string_lossy().starts_with("part-"))
                .unwrap_or(false)
        })
        .collect();
    part_names.sort();
    for part in part_names {
        let bytes = fs::read(&part).map_err(|err| io_error(&part, err))?;
        records.extend(deserialize_canonical_records(&bytes)?);
    }
    Ok((records, metadata))
}
