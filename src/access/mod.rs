//! Access service: aligned, validated, cache-first time-series bundles.

pub mod align;
pub mod bundle;
pub mod cache;
pub mod errors;
pub mod frame;
pub mod provider;
pub mod request;
pub mod service;
pub mod validate;


pub use align::{align_frame, build_target_index};
pub use bundle::{AssetMeta, TimeSeriesBundle};
pub use cache::{LineageMeta, ParquetMarketDataStore};
pub use errors::AccessError;
pub use frame::{ColumnKey, DataFrame};
pub use provider::{EodProvider, ProviderRow, ProviderSeries, SymbolMapper};
pub use request::{
    AssetDropPolicy, CalendarSpec, DeduplicatePolicy, Field, MissingDataPolicy,
    MissingPolicyKind, TimeSeriesRequest, ValidationPolicy,
};
pub use service::MarketDataService;
pub use validate::{deduplicate_series, validate_and_flag, QualityReport};
