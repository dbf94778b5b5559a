//! Raw zone: write-once provider payloads, byte-identical to what the
//! adapter returned.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::errors::StorageError;
use crate::store::layout;

fn io_error(path: &Path, err: impl std::fmt::Display) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        detail: err.to_string(),
    }
}

/// Paths produced by one raw payload write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPaths {
    pub payload_path: PathBuf,
    pub metadata_path: PathBuf,
}

/// Persist the raw payload and its metadata sidecar.
///
/// The payload is owned by the ingestion run that produced it; a second
/// write for the same `(ingest_run_id, request_fingerprint)` is an error,
/// never an overwrite.
pub fn store_raw_payload(
    raw_root: &Path,
    ingest_run_id: &str,
    request_fingerprint: &str,
    payload: &[u8],
    metadata: &Value,
    ext: &str,
) -> Result<RawPaths, StorageError> {
    let payload_path = layout::raw_payload_path(raw_root, ingest_run_id, request_fingerprint, ext);
    let metadata_path = layout::raw_metadata_path(raw_root, ingest_run_id, request_fingerprint);
    if payload_path.exists() || metadata_path.exists() {
        return Err(StorageError::RawPayloadExists {
            ingest_run_id: ingest_run_id.to_string(),
            request_fingerprint: request_fingerprint.to_string(),
        });
    }
    let request_dir = layout::raw_request_dir(raw_root, ingest_run_id, request_fingerprint);
    fs::create_dir_all(&request_dir).map_err(|err| io_error(&request_dir, err))?;
    fs::write(&payload_path, payload).map_err(|err| io_error(&payload_path, err))?;
    fs::write(
        &metadata_path,
        crate::core::canonical::canonical_json(metadata),
    )
    .map_err(|err| io_error(&metadata_path, err))?;
    Ok(RawPaths {
        payload_path,
        metadata_path,
    })
}

/// Summary of one ingestion execution, written once per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestRunMeta {
    pub ingest_run_id: String,
    pub started_at_ts: DateTime<Utc>,
    pub finished_at_ts: DateTime<Utc>,
    pub config_fingerprint: String,
}

pub fn write_ingest_run_meta(raw_root: &Path, meta: &IngestRunMeta) -> Result<PathBuf, StorageError> {
    let path = layout::ingest_run_meta_path(raw_root, &meta.ingest_run_id);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| io_error(parent, err))?;
    }
    let value = crate::core::canonical::to_canonical_value(meta)?;
    fs::write(&path, crate::core::canonical::canonical_json(&value))
        .map_err(|err| io_error(&path, err))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn payload_bytes_are_stored_verbatim_and_write_once() {
        let dir = tempfile::tempdir().unwrap();
        let payload = b"{\"records\":[{\"close\":1.5}]}";
        let metadata = serde_json::json!({"payload_format": "json"});
        let paths =
            store_raw_payload(dir.path(), "ing_1", "fprint", payload, &metadata, "json").unwrap();
        assert_eq!(fs::read(&paths.payload_path).unwrap(), payload);

        let again = store_raw_payload(dir.path(), "ing_1", "fprint", payload, &metadata, "json");
        assert!(matches!(again, Err(StorageError::RawPayloadExists { .. })));
    }

    #[test]
    fn run_meta_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let meta = IngestRunMeta {
            ingest_run_id: "ing_20260106_210000Z_0001".to_string(),
            started_at_ts: Utc.with_ymd_and_hms(2026, 1, 6, 21, 0, 0).unwrap(),
            finished_at_ts: Utc.with_ymd_and_hms(2026, 1, 6, 21, 0, 7).unwrap(),
            config_fingerprint: "deadbeef".to_string(),
        };
        let path = write_ingest_run_meta(dir.path(), &meta).unwrap();
        let raw = fs::read_to_string(path).unwrap();
        let back: IngestRunMeta = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, meta);
    }
}
