//! The access service: deterministic, cache-first aligned bundles.
//!
//! `get_timeseries` computes the request hash, serves from the manifest +
//! parquet cache when present, and otherwise fetches, deduplicates, caches,
//! aligns, validates, and publishes a manifest. A replayed request is
//! cache-only: the provider is not consulted.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{info, warn};

use crate::access::align::{align_frame, build_target_index};
use crate::access::bundle::{AssetMeta, TimeSeriesBundle};
use crate::access::cache::{LineageMeta, ParquetMarketDataStore};
use crate::access::errors::AccessError;
use crate::access::frame::DataFrame;
use crate::access::provider::{EodProvider, ProviderRow, SymbolMapper};
use crate::access::request::{AssetDropPolicy, TimeSeriesRequest};
use crate::access::validate::{deduplicate_series, validate_and_flag, QualityReport};
use crate::calendar::baseline::CalendarBaseline;
use crate::core::identity::MarketDataId;

/// Aligned market-data service over one provider and one cache root.
pub struct MarketDataService<P: EodProvider> {
    provider: P,
    store: ParquetMarketDataStore,
    baseline: CalendarBaseline,
    symbol_mapper: SymbolMapper,
    dataset_version: Option<String>,
    code_version: Option<String>,
    clock: fn() -> DateTime<Utc>,
}

impl<P: EodProvider> MarketDataService<P> {
    pub fn new(
        provider: P,
        store: ParquetMarketDataStore,
        baseline: CalendarBaseline,
        symbol_mapper: SymbolMapper,
    ) -> Self {
        Self {
            provider,
            store,
            baseline,
            symbol_mapper,
            dataset_version: None,
            code_version: None,
            clock: Utc::now,
        }
    }

    pub fn with_dataset_version(mut self, dataset_version: impl Into<String>) -> Self {
        self.dataset_version = Some(dataset_version.into());
        self
    }

    pub fn with_code_version(mut self, code_version: impl Into<String>) -> Self {
        self.code_version = Some(code_version.into());
        self
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn get_timeseries(
        &self,
        request: &TimeSeriesRequest,
    ) -> Result<TimeSeriesBundle, AccessError> {
        let request_hash = request.request_hash();
        let provider_name = self.provider.name().to_string();
        if provider_name.is_empty() {
            return Err(AccessError::ProviderFetch {
                detail: "provider name must be set".to_string(),
            });
        }
        let symbols = self.symbol_mapper.resolve_many(&request.assets)?;
        let target = build_target_index(request, &self.baseline)?;

        let mut duplicates_removed: BTreeMap<MarketDataId, usize> = BTreeMap::new();
        let cache_hit = self.store.manifest_exists(&request_hash)?;
        let lineage = if cache_hit {
            info!(request_hash = request_hash.as_str(), provider = provider_name.as_str(), "access.cache_hit");
            LineageMeta::from_manifest(&self.store.read_manifest(&request_hash)?)?
        } else {
            info!(request_hash = request_hash.as_str(), provider = provider_name.as_str(), "access.cache_miss");
            let ingestion_ts = (self.clock)();
            let mut fetched = self.provider.fetch_eod(
                &symbols.iter().map(|(_, symbol)| symbol.clone()).collect::<Vec<_>>(),
                request.start,
                request.end,
                &request.sorted_fields(),
            )?;
            let mut storage_paths = Vec::new();
            for (asset, symbol) in &symbols {
                let series = fetched.remove(symbol).ok_or_else(|| {
                    AccessError::ProviderFetch {
                        detail: format!(
                            "provider data missing symbol '{symbol}' for asset '{asset}'"
                        ),
                    }
                })?;
                let (rows, removed) =
                    deduplicate_series(asset, &series, request.validate.deduplicate)?;
                if removed > 0 {
                    duplicates_removed.insert(asset.clone(), removed);
                }
                let paths = self.store.write_asset_rows(&provider_name, asset, &rows)?;
                storage_paths.extend(paths);
            }
            self.build_lineage(request, &request_hash, &provider_name, ingestion_ts, storage_paths)
        };

        let assets: Vec<MarketDataId> = request.assets.clone();
        let cached =
            self.store
                .read_assets(&provider_name, &assets, request.start, request.end)?;
        let raw = frame_from_rows(&cached, request)?;
        let mut aligned = align_frame(&raw, &target, &request.missing)?;
        let quality = validate_and_flag(
            &aligned,
            &request.validate,
            &duplicates_removed,
            &request_hash,
        )?;
        self.enforce_coverage(request, &quality, &mut aligned)?;

        if !cache_hit {
            let payload = lineage.manifest_payload(&quality)?;
            self.store.write_manifest(&request_hash, &payload)?;
        }

        let assets_meta: BTreeMap<MarketDataId, AssetMeta> = symbols
            .into_iter()
            .map(|(asset, provider_symbol)| {
                (
                    asset,
                    AssetMeta {
                        provider: provider_name.clone(),
                        provider_symbol,
                    },
                )
            })
            .collect();

        Ok(TimeSeriesBundle {
            data: aligned,
            assets_meta,
            quality,
            lineage,
        })
    }

    fn enforce_coverage(
        &self,
        request: &TimeSeriesRequest,
        quality: &QualityReport,
        aligned: &mut DataFrame,
    ) -> Result<(), AccessError> {
        let min_coverage = request.missing.min_coverage;
        for (asset, coverage) in &quality.coverage {
            if *coverage >= min_coverage {
                continue;
            }
            match request.missing.asset_drop_policy {
                AssetDropPolicy::Error => {
                    return Err(AccessError::InsufficientCoverage {
                        asset_id: asset.as_str().to_string(),
                        coverage: *coverage,
                        min_coverage,
                    });
                }
                AssetDropPolicy::DropAsset => {
                    warn!(
                        asset_id = asset.as_str(),
                        coverage = *coverage,
                        min_coverage,
                        "access.asset_dropped"
                    );
                    aligned.drop_asset(asset);
                }
            }
        }
        Ok(())
    }

    fn build_lineage(
        &self,
        request: &TimeSeriesRequest,
        request_hash: &str,
        provider_name: &str,
        ingestion_ts: DateTime<Utc>,
        storage_paths: Vec<std::path::PathBuf>,
    ) -> LineageMeta {
        let dataset_version = self.dataset_version.clone().unwrap_or_else(|| {
            request
                .as_of
                .map(|as_of| as_of.date_naive().to_string())
                .unwrap_or_else(|| ingestion_ts.date_naive().to_string())
        });
        let root = self.store.root_path();
        let mut normalized: Vec<String> = storage_paths
            .iter()
            .map(|path| {
                path.strip_prefix(root)
                    .unwrap_or(path)
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        normalized.sort();
        normalized.dedup();
        LineageMeta {
            request_hash: request_hash.to_string(),
            request_json: request.to_canonical_value(),
            provider: provider_name.to_string(),
            ingestion_ts_utc: ingestion_ts.to_rfc3339(),
            as_of_utc: request.as_of.map(|as_of| as_of.to_rfc3339()),
            dataset_version,
            code_version: self.code_version.clone(),
            storage_paths: normalized,
        }
    }
}

/// Combine cached per-asset rows into one raw frame over the union of
/// observed dates, in request asset order for error reporting but canonical
/// column order in the frame itself.
fn frame_from_rows(
    rows_by_asset: &BTreeMap<MarketDataId, Vec<ProviderRow>>,
    request: &TimeSeriesRequest,
) -> Result<DataFrame, AccessError> {
    let mut dates: Vec<NaiveDate> = rows_by_asset
        .values()
        .flat_map(|rows| rows.iter().map(|row| row.date))
        .collect();
    dates.sort_unstable();
    dates.dedup();
    let mut frame = DataFrame::new(dates.clone())?;
    for (asset, rows) in rows_by_asset {
        let by_date: BTreeMap<NaiveDate, &ProviderRow> =
            rows.iter().map(|row| (row.date, row)).collect();
        for field in request.sorted_fields() {
            let values = dates
                .iter()
                .map(|date| by_date.get(date).and_then(|row| row.values.get(&field)).copied())
                .collect();
            frame.insert_column((asset.clone(), field), values)?;
        }
    }
    Ok(frame)
}
