//! Storage zones and the dataset registry.
//!
//! Write-once raw payloads, atomically published canonical snapshots, and
//! an append-only registry journal with content-hash integrity.

pub mod canonical_zone;
pub mod errors;
pub mod layout;
pub mod raw;
pub mod registry;

#[cfg(test)]
mod registry_tests;

pub use canonical_zone::{
    compute_snapshot_content_hash, deserialize_canonical_records, publish_canonical_snapshot,
    read_canonical_snapshot, serialize_canonical_records, stage_canonical_snapshot,
    PublishedSnapshot, StagedSnapshot,
};
pub use errors::StorageError;
pub use raw::{store_raw_payload, write_ingest_run_meta, IngestRunMeta, RawPaths};
pub use registry::{DatasetRegistry, DatasetRegistryEntry};
