//! Ingestion: provider boundary, normalizers, validators, and the runner.

pub mod errors;
pub mod normalize;
pub mod provider;
pub mod runner;
pub mod universe;
pub mod validate;

#[cfg(test)]
mod runner_tests;

pub use errors::IngestError;
pub use normalize::{
    normalize_equity_eod, normalize_fx_daily, NormalizationContext, TimeContext,
    EQUITY_EOD_DATASET_ID, FX_DAILY_DATASET_ID, SCHEMA_VERSION,
};
pub use provider::{FetchRequest, FixtureAdapter, ProviderAdapter, RawResponse};
pub use runner::{IngestionConfig, IngestionResult, IngestionRunner};
pub use universe::{seed_universe, UniverseInstrumentType, UniverseRecord, UniverseSnapshot};
pub use validate::{ConflictScope, RecordValidator, ValidationContext};
