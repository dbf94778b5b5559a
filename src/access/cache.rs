//! Per-asset parquet cache and request manifests.
//!
//! Cache layout: `<root>/market/<provider>/<asset>/1D/part-<YYYY>.parquet`,
//! one file per calendar year, plus `<root>/manifests/<request_hash>.json`.
//! Writes stage to a temporary sibling and rename into place, so concurrent
//! readers only ever observe complete files.

use std::collections::BTreeMap;
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Float64Builder, StringArray, StringBuilder};
use arrow::datatypes::{DataType, Field as ArrowField, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{Datelike, NaiveDate};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use serde_json::Value;

use crate::access::errors::AccessError;
use crate::access::provider::ProviderRow;
use crate::access::request::Field;
use crate::access::validate::QualityReport;
use crate::core::identity::MarketDataId;

const ALL_FIELDS: [Field; 5] = [
    Field::Close,
    Field::High,
    Field::Low,
    Field::Open,
    Field::Volume,
];

fn storage_error(path: &Path, err: impl std::fmt::Display) -> AccessError {
    AccessError::Storage {
        path: path.display().to_string(),
        detail: err.to_string(),
    }
}

fn sanitize_component(value: &str, name: &str) -> Result<String, AccessError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AccessError::InvalidRequest {
            detail: format!("{name} must be non-empty"),
        });
    }
    let sanitized: String = trimmed
        .chars()
        .map(|ch| if matches!(ch, '/' | '\\' | ':') { '_' } else { ch })
        .collect();
    if sanitized == "." || sanitized == ".." {
        return Err(AccessError::InvalidRequest {
            detail: format!("{name} must not be a path traversal value"),
        });
    }
    Ok(sanitized)
}

/// Parquet-backed market-data cache rooted at a directory.
#[derive(Debug, Clone)]
pub struct ParquetMarketDataStore {
    root: PathBuf,
}

impl ParquetMarketDataStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    pub fn asset_dir(
        &self,
        provider: &str,
        asset: &MarketDataId,
    ) -> Result<PathBuf, AccessError> {
        Ok(self
            .root
            .join("market")
            .join(sanitize_component(provider, "provider")?)
            .join(sanitize_component(asset.as_str(), "asset_id")?)
            .join("1D"))
    }

    pub fn part_path(
        &self,
        provider: &str,
        asset: &MarketDataId,
        year: i32,
    ) -> Result<PathBuf, AccessError> {
        Ok(self
            .asset_dir(provider, asset)?
            .join(format!("part-{year}.parquet")))
    }

    pub fn manifest_path(&self, request_hash: &str) -> Result<PathBuf, AccessError> {
        Ok(self
            .root
            .join("manifests")
            .join(format!("{}.json", sanitize_component(request_hash, "request_hash")?)))
    }

    /// Persist date-sorted unique rows for one asset, merging with any rows
    /// already cached for the touched years. Returns the written paths.
    pub fn write_asset_rows(
        &self,
        provider: &str,
        asset: &MarketDataId,
        rows: &[ProviderRow],
    ) -> Result<Vec<PathBuf>, AccessError> {
        let mut by_year: BTreeMap<i32, Vec<ProviderRow>> = BTreeMap::new();
        for row in rows {
            by_year.entry(row.date.year()).or_default().push(row.clone());
        }
        let mut written = Vec::new();
        for (year, year_rows) in by_year {
            let path = self.part_path(provider, asset, year)?;
            let mut merged: BTreeMap<NaiveDate, ProviderRow> = BTreeMap::new();
            if path.exists() {
                for row in read_part(&path)? {
                    merged.insert(row.date, row);
                }
            }
            for row in year_rows {
                merged.insert(row.date, row);
            }
            let rows: Vec<ProviderRow> = merged.into_values().collect();
            write_part(&path, &rows)?;
            written.push(path);
        }
        Ok(written)
    }

    /// Read cached rows for several assets over an inclusive date range.
    pub fn read_assets(
        &self,
        provider: &str,
        assets: &[MarketDataId],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeMap<MarketDataId, Vec<ProviderRow>>, AccessError> {
        let mut result = BTreeMap::new();
        for asset in assets {
            let mut rows: Vec<ProviderRow> = Vec::new();
            for year in start.year()..=end.year() {
                let path = self.part_path(provider, asset, year)?;
                if !path.exists() {
                    continue;
                }
                rows.extend(
                    read_part(&path)?
                        .into_iter()
                        .filter(|row| row.date >= start && row.date <= end),
                );
            }
            rows.sort_by_key(|row| row.date);
            result.insert(asset.clone(), rows);
        }
        Ok(result)
    }

    /// Write the request manifest; staged and renamed atomically.
    pub fn write_manifest(
        &self,
        request_hash: &str,
        payload: &Value,
    ) -> Result<PathBuf, AccessError> {
        let path = self.manifest_path(request_hash)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| storage_error(parent, err))?;
        }
        let staged = path.with_extension("json.tmp");
        fs::write(&staged, crate::core::canonical::canonical_json(payload))
            .map_err(|err| storage_error(&staged, err))?;
        fs::rename(&staged, &path).map_err(|err| storage_error(&path, err))?;
        Ok(path)
    }

    pub fn manifest_exists(&self, request_hash: &str) -> Result<bool, AccessError> {
        Ok(self.manifest_path(request_hash)?.exists())
    }

    pub fn read_manifest(&self, request_hash: &str) -> Result<Value, AccessError> {
        let path = self.manifest_path(request_hash)?;
        let raw = fs::read_to_string(&path).map_err(|err| storage_error(&path, err))?;
        serde_json::from_str(&raw).map_err(|err| storage_error(&path, err))
    }
}

fn part_schema() -> Schema {
    let mut fields = vec![ArrowField::new("date", DataType::Utf8, false)];
    for field in ALL_FIELDS {
        fields.push(ArrowField::new(field.as_str(), DataType::Float64, true));
    }
    Schema::new(fields)
}

fn write_part(path: &Path, rows: &[ProviderRow]) -> Result<(), AccessError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| storage_error(parent, err))?;
    }
    let schema = Arc::new(part_schema());

    let mut date_builder = StringBuilder::new();
    let mut field_builders: BTreeMap<Field, Float64Builder> = ALL_FIELDS
        .iter()
        .map(|field| (*field, Float64Builder::new()))
        .collect();
    for row in rows {
        date_builder.append_value(row.date.to_string());
        for (field, builder) in field_builders.iter_mut() {
            match row.values.get(field) {
                Some(value) => builder.append_value(*value),
                None => builder.append_null(),
            }
        }
    }
    let mut arrays: Vec<ArrayRef> = vec![Arc::new(date_builder.finish())];
    for field in ALL_FIELDS {
        if let Some(builder) = field_builders.get_mut(&field) {
            arrays.push(Arc::new(builder.finish()));
        }
    }
    let batch = RecordBatch::try_new(schema.clone(), arrays)
        .map_err(|err| storage_error(path, err))?;

    let staged = path.with_extension("parquet.tmp");
    let file = File::create(&staged).map_err(|err| storage_error(&staged, err))?;
    let props = WriterProperties::builder().build();
    let mut writer = ArrowWriter::try_new(file, schema, Some(props))
        .map_err(|err| storage_error(&staged, err))?;
    writer.write(&batch).map_err(|err| storage_error(&staged, err))?;
    writer.close().map_err(|err| storage_error(&staged, err))?;
    fs::rename(&staged, path).map_err(|err| storage_error(path, err))?;
    Ok(())
}

fn read_part(path: &Path) -> Result<Vec<ProviderRow>, AccessError> {
    let file = File::open(path).map_err(|err| storage_error(path, err))?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).map_err(|err| storage_error(path, err))?;
    let reader = builder.build().map_err(|err| storage_error(path, err))?;

    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|err| storage_error(path, err))?;
        let dates = batch
            .column_by_name("date")
            .and_then(|column| column.as_any().downcast_ref::<StringArray>())
            .ok_or_else(|| storage_error(path, "part missing date column"))?;
        let mut field_arrays: Vec<(Field, &Float64Array)> = Vec::new();
        for field in ALL_FIELDS {
            if let Some(column) = batch.column_by_name(field.as_str()) {
                if let Some(array) = column.as_any().downcast_ref::<Float64Array>() {
                    field_arrays.push((field, array));
                }
            }
        }
        for row in 0..batch.num_rows() {
            let date = dates
                .value(row)
                .parse::<NaiveDate>()
                .map_err(|err| storage_error(path, err))?;
            let mut values = BTreeMap::new();
            for (field, array) in &field_arrays {
                if !array.is_null(row) {
                    values.insert(*field, array.value(row));
                }
            }
            rows.push(ProviderRow { date, values });
        }
    }
    Ok(rows)
}

/// Lineage block of an access manifest.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LineageMeta {
    pub request_hash: String,
    pub request_json: Value,
    pub provider: String,
    pub ingestion_ts_utc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub as_of_utc: Option<String>,
    pub dataset_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_version: Option<String>,
    pub storage_paths: Vec<String>,
}

impl LineageMeta {
    /// Manifest payload: lineage plus the quality summary.
    pub fn manifest_payload(&self, quality: &QualityReport) -> Result<Value, AccessError> {
        let mut payload = crate::core::canonical::to_canonical_value(self)?;
        let quality_value = crate::core::canonical::to_canonical_value(quality)?;
        if let Value::Object(ref mut map) = payload {
            map.insert("quality_summary".to_string(), quality_value);
        }
        Ok(payload)
    }

    pub fn from_manifest(payload: &Value) -> Result<Self, AccessError> {
        serde_json::from_value(payload.clone()).map_err(|err| AccessError::DataValidation {
            detail: format!("manifest payload invalid: {err}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn row(date: NaiveDate, close: f64) -> ProviderRow {
        ProviderRow {
            date,
            values: BTreeMap::from([(Field::Close, close)]),
        }
    }

    #[test]
    fn parquet_round_trip_preserves_rows_and_gaps() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetMarketDataStore::new(dir.path());
        let asset = MarketDataId::new("EQ:SPY").unwrap();
        let mut sparse = row(d(2024, 1, 3), 471.5);
        sparse.values.insert(Field::Volume, 1_000_000.0);
        let paths = store
            .write_asset_rows("fixture", &asset, &[row(d(2024, 1, 2), 470.0), sparse])
            .unwrap();
        assert_eq!(paths.len(), 1);
        assert!(paths[0].ends_with("market/fixture/EQ_SPY/1D/part-2024.parquet"));

        let cached = store
            .read_assets("fixture", &[asset.clone()], d(2024, 1, 1), d(2024, 1, 31))
            .unwrap();
        let rows = &cached[&asset];
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].values[&Field::Close], 470.0);
        assert!(!rows[0].values.contains_key(&Field::Volume));
        assert_eq!(rows[1].values[&Field::Volume], 1_000_000.0);
    }

    #[test]
    fn rewrite_merges_by_date() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetMarketDataStore::new(dir.path());
        let asset = MarketDataId::new("EQ:SPY").unwrap();
        store
            .write_asset_rows("fixture", &asset, &[row(d(2024, 1, 2), 470.0)])
            .unwrap();
        store
            .write_asset_rows(
                "fixture",
                &asset,
                &[row(d(2024, 1, 2), 471.0), row(d(2024, 1, 3), 472.0)],
            )
            .unwrap();
        let cached = store
            .read_assets("fixture", &[asset.clone()], d(2024, 1, 1), d(2024, 1, 31))
            .unwrap();
        let rows = &cached[&asset];
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].values[&Field::Close], 471.0);
    }

    #[test]
    fn parts_split_by_year() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetMarketDataStore::new(dir.path());
        let asset = MarketDataId::new("EQ:SPY").unwrap();
        let paths = store
            .write_asset_rows(
                "fixture",
                &asset,
                &[row(d(2023, 12, 29), 468.0), row(d(2024, 1, 2), 470.0)],
            )
            .unwrap();
        assert_eq!(paths.len(), 2);
    }

    #[test]
    fn manifest_round_trip_is_byte_stable() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetMarketDataStore::new(dir.path());
        let lineage = LineageMeta {
            request_hash: "abc123".to_string(),
            request_json: serde_json::json!({"assets": ["EQ:SPY"]}),
            provider: "fixture".to_string(),
            ingestion_ts_utc: "2024-01-05T00:00:00+00:00".to_string(),
            as_of_utc: None,
            dataset_version: "2024-01-05".to_string(),
            code_version: None,
            storage_paths: vec!["market/fixture/EQ_SPY/1D/part-2024.parquet".to_string()],
        };
        let payload = lineage.manifest_payload(&QualityReport::default()).unwrap();
        store.write_manifest("abc123", &payload).unwrap();
        assert!(store.manifest_exists("abc123").unwrap());
        let read_back = store.read_manifest("abc123").unwrap();
        assert_eq!(read_back, payload);
        let lineage_back = LineageMeta::from_manifest(&read_back).unwrap();
        assert_eq!(lineage_back, lineage);
    }
}
