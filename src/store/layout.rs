//! Path builders for the raw and canonical zones.
//!
//! Raw: `raw/ingest_run_id=<ID>/request=<FPRINT>/{payload.<ext>, metadata.json}`
//!      plus `raw/ingest_run_id=<ID>/ingest_run.json`.
//! Canonical: `canonical/dataset_id=<DID>/dataset_version=<DV>/{part-*, _metadata.json}`,
//!            staged under `canonical/.staging/<DID>__<DV>/`.

use std::path::{Path, PathBuf};

pub const CANONICAL_METADATA_FILE: &str = "_metadata.json";
pub const INGEST_RUN_META_FILE: &str = "ingest_run.json";

pub fn raw_run_dir(raw_root: &Path, ingest_run_id: &str) -> PathBuf {
    raw_root.join(format!("ingest_run_id={ingest_run_id}"))
}

pub fn raw_request_dir(raw_root: &Path, ingest_run_id: &str, request_fingerprint: &str) -> PathBuf {
    raw_run_dir(raw_root, ingest_run_id).join(format!("request={request_fingerprint}"))
}

pub fn raw_payload_path(
    raw_root: &Path,
    ingest_run_id: &str,
    request_fingerprint: &str,
    ext: &str,
) -> PathBuf {
    raw_request_dir(raw_root, ingest_run_id, request_fingerprint).join(format!("payload.{ext}"))
}

pub fn raw_metadata_path(
    raw_root: &Path,
    ingest_run_id: &str,
    request_fingerprint: &str,
) -> PathBuf {
    raw_request_dir(raw_root, ingest_run_id, request_fingerprint).join("metadata.json")
}

pub fn ingest_run_meta_path(raw_root: &Path, ingest_run_id: &str) -> PathBuf {
    raw_run_dir(raw_root, ingest_run_id).join(INGEST_RUN_META_FILE)
}

pub fn canonical_version_dir(
    canonical_root: &Path,
    dataset_id: &str,
    dataset_version: &str,
) -> PathBuf {
    canonical_root
        .join(format!("dataset_id={dataset_id}"))
        .join(format!("dataset_version={dataset_version}"))
}

pub fn canonical_staging_dir(
    canonical_root: &Path,
    dataset_id: &str,
    dataset_version: &str,
) -> PathBuf {
    canonical_root
        .join(".staging")
        .join(format!("{dataset_id}__{dataset_version}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_the_zone_contract() {
        let root = Path::new("/data");
        assert_eq!(
            raw_payload_path(root, "ing_1", "abcd", "json"),
            PathBuf::from("/data/ingest_run_id=ing_1/request=abcd/payload.json")
        );
        assert_eq!(
            canonical_version_dir(root, "md.equity.eod.bars", "2026-01-06"),
            PathBuf::from("/data/dataset_id=md.equity.eod.bars/dataset_version=2026-01-06")
        );
        assert_eq!(
            ingest_run_meta_path(root, "ing_1"),
            PathBuf::from("/data/ingest_run_id=ing_1/ingest_run.json")
        );
    }
}
