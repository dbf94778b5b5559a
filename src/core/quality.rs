//! Quality-flag vocabulary and the ingestion validation report.
//!
//! Flags are soft, structured annotations: they ride on records and
//! reports without ever changing a stored value. The vocabulary is stable;
//! serialized strings are part of the data contract.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::errors::SchemaError;

/// Stable quality-flag vocabulary.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityFlag {
    MissingValue,
    DuplicateResolved,
    OutlierReturn,
    SuspectCorpAction,
    NonpositivePrice,
    NonmonotonicIndex,
    Stale,
    ProviderTimestampUsed,
    AdjustedPricePresent,
    Imputed,
    CalendarConflict,
}

impl QualityFlag {
    /// The stable wire string for this flag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingValue => "MISSING_VALUE",
            Self::DuplicateResolved => "DUPLICATE_RESOLVED",
            Self::OutlierReturn => "OUTLIER_RETURN",
            Self::SuspectCorpAction => "SUSPECT_CORP_ACTION",
            Self::NonpositivePrice => "NONPOSITIVE_PRICE",
            Self::NonmonotonicIndex => "NONMONOTONIC_INDEX",
            Self::Stale => "STALE",
            Self::ProviderTimestampUsed => "PROVIDER_TIMESTAMP_USED",
            Self::AdjustedPricePresent => "ADJUSTED_PRICE_PRESENT",
            Self::Imputed => "IMPUTED",
            Self::CalendarConflict => "CALENDAR_CONFLICT",
        }
    }
}

impl std::fmt::Display for QualityFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured validation report emitted for each dataset build.
///
/// `hard_errors` block publishing; `flag_counts` summarize the soft flags
/// carried on the validated records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub dataset_id: String,
    pub dataset_version: String,
    pub ingest_run_id: String,
    pub generated_ts: DateTime<Utc>,
    pub total_records: usize,
    pub hard_errors: Vec<String>,
    pub flag_counts: BTreeMap<QualityFlag, usize>,
}

impl ValidationReport {
    pub fn new(
        dataset_id: impl Into<String>,
        dataset_version: impl Into<String>,
        ingest_run_id: impl Into<String>,
        generated_ts: DateTime<Utc>,
    ) -> Result<Self, SchemaError> {
        let dataset_id = dataset_id.into();
        let dataset_version = dataset_version.into();
        let ingest_run_id = ingest_run_id.into();
        if dataset_id.is_empty() {
            return Err(SchemaError::EmptyField {
                field: "dataset_id",
            });
        }
        if dataset_version.is_empty() {
            return Err(SchemaError::EmptyField {
                field: "dataset_version",
            });
        }
        if ingest_run_id.is_empty() {
            return Err(SchemaError::EmptyField {
                field: "ingest_run_id",
            });
        }
        Ok(Self {
            dataset_id,
            dataset_version,
            ingest_run_id,
            generated_ts,
            total_records: 0,
            hard_errors: Vec::new(),
            flag_counts: BTreeMap::new(),
        })
    }

    pub fn is_publishable(&self) -> bool {
        self.hard_errors.is_empty()
    }

    pub fn record_flag(&mut self, flag: QualityFlag) {
        *self.flag_counts.entry(flag).or_insert(0) += 1;
    }
}
