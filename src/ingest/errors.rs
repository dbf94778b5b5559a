//! Ingestion pipeline errors.

use crate::calendar::errors::CalendarError;
use crate::core::errors::SchemaError;
use crate::core::quality::ValidationReport;
use crate::store::errors::StorageError;

#[derive(Debug)]
pub enum IngestError {
    /// Transport, auth, or missing-fixture failure at the provider.
    ProviderFetch { detail: String },
    /// Adapter response does not match the request it claims to answer.
    ResponseMismatch { expected: String, actual: String },
    /// Payload shape or instrument resolution failure in the normalizer.
    Normalization { detail: String },
    /// Hard validator failures; the report carries the specifics.
    Validation { report: Box<ValidationReport> },
    /// The run's cancel token fired; staged work was discarded.
    Cancelled { stage: &'static str },
    Storage(StorageError),
    Calendar(CalendarError),
    Schema(SchemaError),
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ProviderFetch { detail } => write!(f, "provider fetch failed: {detail}"),
            Self::ResponseMismatch { expected, actual } => write!(
                f,
                "request_fingerprint mismatch: expected {expected}, got {actual}"
            ),
            Self::Normalization { detail } => write!(f, "normalization failed: {detail}"),
            Self::Validation { report } => write!(
                f,
                "validation failed with {} hard errors (first: {})",
                report.hard_errors.len(),
                report.hard_errors.first().map(String::as_str).unwrap_or("none")
            ),
            Self::Cancelled { stage } => write!(f, "ingestion cancelled before {stage}"),
            Self::Storage(err) => write!(f, "{err}"),
            Self::Calendar(err) => write!(f, "{err}"),
            Self::Schema(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for IngestError {}

impl From<StorageError> for IngestError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

impl From<CalendarError> for IngestError {
    fn from(err: CalendarError) -> Self {
        Self::Calendar(err)
    }
}

impl From<SchemaError> for IngestError {
    fn from(err: SchemaError) -> Self {
        Self::Schema(err)
    }
}
