//! Storage-zone and registry errors.

#[derive(Debug)]
pub enum StorageError {
    Io { path: String, detail: String },
    RawPayloadExists { ingest_run_id: String, request_fingerprint: String },
    SnapshotExists { dataset_id: String, dataset_version: String },
    SnapshotMissing { dataset_id: String, dataset_version: String, path: String },
    MetadataInvalid { path: String, detail: String },
    RegistryConflict { dataset_id: String, dataset_version: String },
    RegistryCorrupt { path: String, line: usize, detail: String },
    ContentHashMismatch {
        dataset_id: String,
        dataset_version: String,
        expected: String,
        actual: String,
    },
    Schema(crate::core::errors::SchemaError),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, detail } => write!(f, "storage I/O failure at {path}: {detail}"),
            Self::RawPayloadExists {
                ingest_run_id,
                request_fingerprint,
            } => write!(
                f,
                "raw payload already stored for run {ingest_run_id} request {request_fingerprint}"
            ),
            Self::SnapshotExists {
                dataset_id,
                dataset_version,
            } => write!(
                f,
                "canonical snapshot {dataset_id}/{dataset_version} already published; overwrite forbidden"
            ),
            Self::SnapshotMissing {
                dataset_id,
                dataset_version,
                path,
            } => write!(f, "canonical snapshot {dataset_id}/{dataset_version} missing at {path}"),
            Self::MetadataInvalid { path, detail } => {
                write!(f, "snapshot metadata invalid at {path}: {detail}")
            }
            Self::RegistryConflict {
                dataset_id,
                dataset_version,
            } => write!(f, "registry already holds {dataset_id}/{dataset_version}"),
            Self::RegistryCorrupt { path, line, detail } => {
                write!(f, "invalid registry entry at {path}:{line}: {detail}")
            }
            Self::ContentHashMismatch {
                dataset_id,
                dataset_version,
                expected,
                actual,
            } => write!(
                f,
                "content hash mismatch for {dataset_id}/{dataset_version}: entry {expected}, snapshot {actual}"
            ),
            Self::Schema(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<crate::core::errors::SchemaError> for StorageError {
    fn from(err: crate::core::errors::SchemaError) -> Self {
        Self::Schema(err)
    }
}
