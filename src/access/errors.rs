//! Access-service errors.

use crate::calendar::errors::CalendarError;
use crate::core::errors::SchemaError;

#[derive(Debug)]
pub enum AccessError {
    /// No provider symbol is mapped for an asset id.
    MissingSymbolMapping { asset_id: String },
    /// Provider fetch or payload-shape failure.
    ProviderFetch { detail: String },
    /// Request construction or policy violation.
    InvalidRequest { detail: String },
    /// Aligned-data validation failure (hard).
    DataValidation { detail: String },
    /// Non-positive price rejected by policy.
    NonpositivePrice { asset_id: String, count: usize },
    /// Duplicate dates with `deduplicate = ERROR`.
    DuplicateDates { asset_id: String, dates: Vec<String> },
    /// Missing data with `missing = ERROR`.
    MissingData { missing_count: usize, example_dates: Vec<String> },
    /// Coverage below `min_coverage` with `asset_drop_policy = ERROR`.
    InsufficientCoverage { asset_id: String, coverage: f64, min_coverage: f64 },
    /// Cache or manifest I/O failure.
    Storage { path: String, detail: String },
    Calendar(CalendarError),
    Schema(SchemaError),
}

impl std::fmt::Display for AccessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingSymbolMapping { asset_id } => {
                write!(f, "missing provider symbol mapping for asset '{asset_id}'")
            }
            Self::ProviderFetch { detail } => write!(f, "provider fetch failed: {detail}"),
            Self::InvalidRequest { detail } => write!(f, "invalid request: {detail}"),
            Self::DataValidation { detail } => write!(f, "data validation failed: {detail}"),
            Self::NonpositivePrice { asset_id, count } => {
                write!(f, "nonpositive price detected for '{asset_id}' ({count} rows)")
            }
            Self::DuplicateDates { asset_id, dates } => {
                write!(f, "duplicate dates for '{asset_id}': {dates:?}")
            }
            Self::MissingData {
                missing_count,
                example_dates,
            } => write!(
                f,
                "aligned frame has {missing_count} missing values (e.g. {example_dates:?})"
            ),
            Self::InsufficientCoverage {
                asset_id,
                coverage,
                min_coverage,
            } => write!(
                f,
                "coverage {coverage:.4} for '{asset_id}' below minimum {min_coverage:.4}"
            ),
            Self::Storage { path, detail } => write!(f, "storage failure at {path}: {detail}"),
            Self::Calendar(err) => write!(f, "{err}"),
            Self::Schema(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for AccessError {}

impl From<CalendarError> for AccessError {
    fn from(err: CalendarError) -> Self {
        Self::Calendar(err)
    }
}

impl From<SchemaError> for AccessError {
    fn from(err: SchemaError) -> Self {
        Self::Schema(err)
    }
}
