//! Registry behavior: append-only journal, conflicts, integrity.

use std::collections::BTreeMap;

use chrono::TimeZone;

use crate::store::canonical_zone::{publish_canonical_snapshot, stage_canonical_snapshot};
use crate::store::errors::StorageError;
use crate::store::registry::{DatasetRegistry, DatasetRegistryEntry};

fn entry(dataset_id: &str, dataset_version: &str, content_hash: &str) -> DatasetRegistryEntry {
    DatasetRegistryEntry {
        dataset_id: dataset_id.to_string(),
        dataset_version: dataset_version.to_string(),
        schema_version: "1.0.0".to_string(),
        created_at_ts: chrono::Utc.with_ymd_and_hms(2026, 1, 6, 22, 0, 0).unwrap(),
        ingest_run_id: "ing_20260106_220000Z_0001".to_string(),
        universe_hash: "universehash".to_string(),
        calendar_version: "quantlab-baseline:2026.1".to_string(),
        sessionrules_version: "sessionruleshash".to_string(),
        source_set: vec!["fixture".to_string()],
        row_count: 1,
        content_hash: content_hash.to_string(),
        notes: None,
    }
}

fn publish(dir: &std::path::Path, dataset_id: &str, dataset_version: &str) -> String {
    let parts = BTreeMap::from([(
        "part-0001.jsonl".to_string(),
        format!("{{\"ds\":\"{dataset_id}\"}}\n").into_bytes(),
    )]);
    let staged = stage_canonical_snapshot(
        dir,
        dataset_id,
        dataset_version,
        &parts,
        &serde_json::json!({"dataset_id": dataset_id}),
        1,
    )
    .unwrap();
    publish_canonical_snapshot(staged).unwrap().content_hash
}

#[test]
fn append_then_read_back() {
    let dir = tempfile::tempdir().unwrap();
    let canonical_root = dir.path().join("canonical");
    let registry = DatasetRegistry::new(dir.path().join("registry.jsonl"), &canonical_root);
    let hash = publish(&canonical_root, "ds", "v1");
    registry.append(entry("ds", "v1", &hash)).unwrap();

    let entries = registry.entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].content_hash, hash);
    assert!(registry.find("ds", "v1").unwrap().is_some());
    assert!(registry.find("ds", "v2").unwrap().is_none());
}

#[test]
fn duplicate_key_is_a_registry_conflict() {
    let dir = tempfile::tempdir().unwrap();
    let canonical_root = dir.path().join("canonical");
    let registry = DatasetRegistry::new(dir.path().join("registry.jsonl"), &canonical_root);
    let hash = publish(&canonical_root, "ds", "v1");
    registry.append(entry("ds", "v1", &hash)).unwrap();
    let err = registry.append(entry("ds", "v1", &hash)).unwrap_err();
    assert!(matches!(err, StorageError::RegistryConflict { .. }));
}

#[test]
fn append_requires_snapshot_on_disk_with_matching_hash() {
    let dir = tempfile::tempdir().unwrap();
    let canonical_root = dir.path().join("canonical");
    let registry = DatasetRegistry::new(dir.path().join("registry.jsonl"), &canonical_root);

    let missing = registry.append(entry("ds", "v1", "whatever")).unwrap_err();
    assert!(matches!(missing, StorageError::SnapshotMissing { .. }));

    let _hash = publish(&canonical_root, "ds", "v1");
    let mismatch = registry.append(entry("ds", "v1", "wronghash")).unwrap_err();
    assert!(matches!(mismatch, StorageError::ContentHashMismatch { .. }));
}

#[test]
fn integrity_check_covers_every_entry() {
    let dir = tempfile::tempdir().unwrap();
    let canonical_root = dir.path().join("canonical");
    let registry = DatasetRegistry::new(dir.path().join("registry.jsonl"), &canonical_root);
    let hash_v1 = publish(&canonical_root, "ds", "v1");
    let hash_v2 = publish(&canonical_root, "other", "v1");
    registry.append(entry("ds", "v1", &hash_v1)).unwrap();
    registry.append(entry("other", "v1", &hash_v2)).unwrap();
    assert_eq!(registry.verify_integrity().unwrap(), 2);

    // Tamper with a published part; integrity must fail.
    let part = canonical_root
        .join("dataset_id=ds")
        .join("dataset_version=v1")
        .join("part-0001.jsonl");
    std::fs::write(&part, b"{\"ds\":\"tampered\"}\n").unwrap();
    assert!(matches!(
        registry.verify_integrity().unwrap_err(),
        StorageError::ContentHashMismatch { .. }
    ));
}
