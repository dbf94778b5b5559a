//! Append-only dataset registry.
//!
//! A JSON-lines journal keyed by `(dataset_id, dataset_version)` with
//! single-writer discipline. An entry is appended only after the snapshot
//! is on disk with a matching content hash, so any reader that sees an
//! entry is guaranteed to find the snapshot.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::store::canonical_zone::compute_snapshot_content_hash;
use crate::store::errors::StorageError;

/// One immutable registry entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRegistryEntry {
    pub dataset_id: String,
    pub dataset_version: String,
    pub schema_version: String,
    pub created_at_ts: DateTime<Utc>,
    pub ingest_run_id: String,
    pub universe_hash: String,
    pub calendar_version: String,
    pub sessionrules_version: String,
    pub source_set: Vec<String>,
    pub row_count: usize,
    pub content_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl DatasetRegistryEntry {
    pub fn validate(&self) -> Result<(), StorageError> {
        let required = [
            ("dataset_id", &self.dataset_id),
            ("dataset_version", &self.dataset_version),
            ("schema_version", &self.schema_version),
            ("ingest_run_id", &self.ingest_run_id),
            ("universe_hash", &self.universe_hash),
            ("calendar_version", &self.calendar_version),
            ("sessionrules_version", &self.sessionrules_version),
            ("content_hash", &self.content_hash),
        ];
        for (field, value) in required {
            if value.is_empty() {
                return Err(StorageError::MetadataInvalid {
                    path: "registry entry".to_string(),
                    detail: format!("{field} must be non-empty"),
                });
            }
        }
        if self.source_set.is_empty() {
            return Err(StorageError::MetadataInvalid {
                path: "registry entry".to_string(),
                detail: "source_set must not be empty".to_string(),
            });
        }
        let unique: BTreeSet<&String> = self.source_set.iter().collect();
        if unique.len() != self.source_set.len() {
            return Err(StorageError::MetadataInvalid {
                path: "registry entry".to_string(),
                detail: "source_set must not contain duplicates".to_string(),
            });
        }
        Ok(())
    }
}

/// Append-only journal over a JSON-lines file.
pub struct DatasetRegistry {
    registry_path: PathBuf,
    canonical_root: PathBuf,
    writer: Mutex<()>,
}

impl DatasetRegistry {
    pub fn new(registry_path: impl Into<PathBuf>, canonical_root: impl Into<PathBuf>) -> Self {
        Self {
            registry_path: registry_path.into(),
            canonical_root: canonical_root.into(),
            writer: Mutex::new(()),
        }
    }

    pub fn registry_path(&self) -> &Path {
        &self.registry_path
    }

    /// Load every entry in journal order.
    pub fn entries(&self) -> Result<Vec<DatasetRegistryEntry>, StorageError> {
        if !self.registry_path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.registry_path).map_err(|err| StorageError::Io {
            path: self.registry_path.display().to_string(),
            detail: err.to_string(),
        })?;
        let mut entries = Vec::new();
        for (line_number, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let entry: DatasetRegistryEntry =
                serde_json::from_str(line).map_err(|err| StorageError::RegistryCorrupt {
                    path: self.registry_path.display().to_string(),
                    line: line_number + 1,
                    detail: err.to_string(),
                })?;
            entry.validate()?;
            entries.push(entry);
        }
        Ok(entries)
    }

    pub fn find(
        &self,
        dataset_id: &str,
        dataset_version: &str,
    ) -> Result<Option<DatasetRegistryEntry>, StorageError> {
        Ok(self.entries()?.into_iter().find(|entry| {
            entry.dataset_id == dataset_id && entry.dataset_version == dataset_version
        }))
    }

    /// Append one entry after verifying the snapshot it points at.
    ///
    /// Duplicate `(dataset_id, dataset_version)` keys are a conflict; a
    /// missing snapshot or a hash mismatch blocks the append.
    pub fn append(&self, entry: DatasetRegistryEntry) -> Result<(), StorageError> {
        entry.validate()?;
        let _guard = self.writer.lock();
        if self.find(&entry.dataset_id, &entry.dataset_version)?.is_some() {
            return Err(StorageError::RegistryConflict {
                dataset_id: entry.dataset_id,
                dataset_version: entry.dataset_version,
            });
        }
        let actual = compute_snapshot_content_hash(
            &self.canonical_root,
            &entry.dataset_id,
            &entry.dataset_version,
        )?;
        if actual != entry.content_hash {
            return Err(StorageError::ContentHashMismatch {
                dataset_id: entry.dataset_id,
                dataset_version: entry.dataset_version,
                expected: entry.content_hash,
                actual,
            });
        }
        if let Some(parent) = self.registry_path.parent() {
            fs::create_dir_all(parent).map_err(|err| StorageError::Io {
                path: parent.display().to_string(),
                detail: err.to_string(),
            })?;
        }
        let value = crate::core::canonical::to_canonical_value(&entry)?;
        let line = crate::core::canonical::canonical_json(&value);
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.registry_path)
            .map_err(|err| StorageError::Io {
                path: self.registry_path.display().to_string(),
                detail: err.to_string(),
            })?;
        writeln!(file, "{line}").map_err(|err| StorageError::Io {
            path: self.registry_path.display().to_string(),
            detail: err.to_string(),
        })?;
        info!(
            dataset_id = entry.dataset_id.as_str(),
            dataset_version = entry.dataset_version.as_str(),
            content_hash = entry.content_hash.as_str(),
            "store.registry_appended"
        );
        Ok(())
    }

    /// Verify every entry still matches its snapshot on disk.
    pub fn verify_integrity(&self) -> Result<usize, StorageError> {
        let entries = self.entries()?;
        for entry in &entries {
            let actual = compute_snapshot_content_hash(
                &self.canonical_root,
                &entry.dataset_id,
                &entry.dataset_version,
            )?;
            if actual != entry.content_hash {
                return Err(StorageError::ContentHashMismatch {
                    dataset_id: entry.dataset_id.clone(),
                    dataset_version: entry.dataset_version.clone(),
                    expected: entry.content_hash.clone(),
                    actual,
                });
            }
        }
        Ok(entries.len())
    }
}
