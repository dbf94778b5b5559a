//! Minimal columnar frame for aligned daily data.
//!
//! A frame is a sorted unique date index plus `(asset_id, field)` columns of
//! optional floats. Column length always equals index length. This is the
//! whole dataframe surface the engines consume; parquet appears only at the
//! storage boundary.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::access::errors::AccessError;
use crate::access::request::Field;
use crate::core::identity::MarketDataId;

pub type ColumnKey = (MarketDataId, Field);

#[derive(Debug, Clone, PartialEq)]
pub struct DataFrame {
    index: Vec<NaiveDate>,
    columns: BTreeMap<ColumnKey, Vec<Option<f64>>>,
}

impl DataFrame {
    /// Build an empty frame over an index, validating uniqueness and order.
    pub fn new(index: Vec<NaiveDate>) -> Result<Self, AccessError> {
        for pair in index.windows(2) {
            if pair[0] >= pair[1] {
                return Err(AccessError::DataValidation {
                    detail: format!(
                        "date index must be strictly increasing: {} then {}",
                        pair[0], pair[1]
                    ),
                });
            }
        }
        Ok(Self {
            index,
            columns: BTreeMap::new(),
        })
    }

    pub fn index(&self) -> &[NaiveDate] {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Column keys in canonical `(asset, field)` order.
    pub fn column_keys(&self) -> impl Iterator<Item = &ColumnKey> {
        self.columns.keys()
    }

    /// Distinct assets present, in canonical order.
    pub fn assets(&self) -> Vec<MarketDataId> {
        let mut assets: Vec<MarketDataId> = Vec::new();
        for (asset, _) in self.columns.keys() {
            if assets.last() != Some(asset) {
                assets.push(asset.clone());
            }
        }
        assets
    }

    pub fn insert_column(
        &mut self,
        key: ColumnKey,
        values: Vec<Option<f64>>,
    ) -> Result<(), AccessError> {
        if values.len() != self.index.len() {
            return Err(AccessError::DataValidation {
                detail: format!(
                    "column {}/{} length {} != index length {}",
                    key.0,
                    key.1,
                    values.len(),
                    self.index.len()
                ),
            });
        }
        self.columns.insert(key, values);
        Ok(())
    }

    pub fn column(&self, key: &ColumnKey) -> Option<&[Option<f64>]> {
        self.columns.get(key).map(Vec::as_slice)
    }

    pub fn value_at(&self, key: &ColumnKey, date: NaiveDate) -> Option<f64> {
        let row = self.index.binary_search(&date).ok()?;
        self.columns.get(key).and_then(|column| column[row])
    }

    /// Reindex every column onto a new target index; positions absent from
    /// the current index become `None`.
    pub fn reindex(&self, target: &[NaiveDate]) -> Result<Self, AccessError> {
        let mut reindexed = Self::new(target.to_vec())?;
        for (key, column) in &self.columns {
            let values = target
                .iter()
                .map(|date| {
                    self.index
                        .binary_search(date)
                        .ok()
                        .and_then(|row| column[row])
                })
                .collect();
            reindexed.insert_column(key.clone(), values)?;
        }
        Ok(reindexed)
    }

    /// Rows where any column is missing.
    pub fn rows_with_missing(&self) -> Vec<usize> {
        (0..self.index.len())
            .filter(|row| self.columns.values().any(|column| column[*row].is_none()))
            .collect()
    }

    /// Drop the given row positions, keeping index/column alignment.
    pub fn drop_rows(&self, rows: &[usize]) -> Result<Self, AccessError> {
        let drop: std::collections::BTreeSet<usize> = rows.iter().copied().collect();
        let index = self
            .index
            .iter()
            .enumerate()
            .filter(|(row, _)| !drop.contains(row))
            .map(|(_, date)| *date)
            .collect();
        let mut kept = Self::new(index)?;
        for (key, column) in &self.columns {
            let values = column
                .iter()
                .enumerate()
                .filter(|(row, _)| !drop.contains(row))
                .map(|(_, value)| *value)
                .collect();
            kept.insert_column(key.clone(), values)?;
        }
        Ok(kept)
    }

    /// Remove every column of one asset.
    pub fn drop_asset(&mut self, asset: &MarketDataId) {
        self.columns.retain(|(column_asset, _), _| column_asset != asset);
    }

    /// Columns restricted to one asset, keyed by field.
    pub fn asset_columns(&self, asset: &MarketDataId) -> BTreeMap<Field, &[Option<f64>]> {
        self.columns
            .iter()
            .filter(|((column_asset, _), _)| column_asset == asset)
            .map(|((_, field), column)| (*field, column.as_slice()))
            .collect()
    }

    /// Total missing cells per asset.
    pub fn missing_rows_for_asset(&self, asset: &MarketDataId) -> Vec<usize> {
        let columns = self.asset_columns(asset);
        (0..self.index.len())
            .filter(|row| columns.values().any(|column| column[*row].is_none()))
            .collect()
    }

    /// Serialize for bundle JSON: index strings, column tuples, row-major
    /// values (null for missing).
    pub fn to_canonical_value(&self) -> serde_json::Value {
        let index: Vec<String> = self.index.iter().map(NaiveDate::to_string).collect();
        let columns: Vec<serde_json::Value> = self
            .columns
            .keys()
            .map(|(asset, field)| serde_json::json!([asset.as_str(), field.as_str()]))
            .collect();
        let data: Vec<Vec<serde_json::Value>> = (0..self.index.len())
            .map(|row| {
                self.columns
                    .values()
                    .map(|column| match column[row] {
                        Some(value) => serde_json::json!(value),
                        None => serde_json::Value::Null,
                    })
                    .collect()
            })
            .collect();
        serde_json::json!({"index": index, "columns": columns, "data": data})
    }
}
