//! Aligned-data validation and guardrails.
//!
//! Duplicates are resolved per the request discipline before alignment;
//! after alignment the frame is checked for non-positive prices and swept
//! with the corporate-action / outlier guardrails. Guardrails only flag;
//! no value is ever corrected.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::access::errors::AccessError;
use crate::access::frame::DataFrame;
use crate::access::provider::{ProviderRow, ProviderSeries};
use crate::access::request::{DeduplicatePolicy, Field, ValidationPolicy};
use crate::core::identity::MarketDataId;
use crate::core::quality::QualityFlag;

const MAX_EXAMPLE_DATES: usize = 5;
const PRICE_FIELDS: [Field; 4] = [Field::Close, Field::Open, Field::High, Field::Low];

/// Per-asset quality metrics for an aligned bundle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub coverage: BTreeMap<MarketDataId, f64>,
    pub flag_counts: BTreeMap<MarketDataId, BTreeMap<QualityFlag, usize>>,
    pub flag_examples: BTreeMap<MarketDataId, BTreeMap<QualityFlag, Vec<String>>>,
    pub actions: BTreeMap<String, String>,
}

impl QualityReport {
    fn record(
        &mut self,
        asset: &MarketDataId,
        flag: QualityFlag,
        count: usize,
        examples: Vec<String>,
    ) {
        if count == 0 {
            return;
        }
        *self
            .flag_counts
            .entry(asset.clone())
            .or_default()
            .entry(flag)
            .or_insert(0) += count;
        if !examples.is_empty() {
            self.flag_examples
                .entry(asset.clone())
                .or_default()
                .entry(flag)
                .or_insert_with(Vec::new)
                .extend(examples.into_iter().take(MAX_EXAMPLE_DATES));
        }
    }

    /// Total count of one flag across assets.
    pub fn flag_total(&self, flag: QualityFlag) -> usize {
        self.flag_counts
            .values()
            .filter_map(|counts| counts.get(&flag))
            .sum()
    }
}

/// Resolve duplicate dates in provider rows per the request discipline.
///
/// Returns date-sorted unique rows plus the number of rows removed.
pub fn deduplicate_series(
    asset: &MarketDataId,
    series: &ProviderSeries,
    policy: DeduplicatePolicy,
) -> Result<(Vec<ProviderRow>, usize), AccessError> {
    let mut rows = series.rows.clone();
    // Stable sort keeps provider order within a date so FIRST/LAST are
    // well defined.
    rows.sort_by_key(|row| row.date);
    let mut resolved: Vec<ProviderRow> = Vec::with_capacity(rows.len());
    let mut removed = 0usize;
    let mut duplicate_dates: Vec<String> = Vec::new();
    for row in rows {
        match resolved.last_mut() {
            Some(last) if last.date == row.date => {
                if duplicate_dates.len() < MAX_EXAMPLE_DATES {
                    duplicate_dates.push(row.date.to_string());
                }
                removed += 1;
                match policy {
                    DeduplicatePolicy::Last => *last = row,
                    DeduplicatePolicy::First => {}
                    DeduplicatePolicy::Error => {}
                }
            }
            _ => resolved.push(row),
        }
    }
    if removed > 0 && policy == DeduplicatePolicy::Error {
        return Err(AccessError::DuplicateDates {
            asset_id: asset.as_str().to_string(),
            dates: duplicate_dates,
        });
    }
    Ok((resolved, removed))
}

/// Validate an aligned frame and emit the quality report.
pub fn validate_and_flag(
    aligned: &DataFrame,
    policy: &ValidationPolicy,
    duplicates_removed: &BTreeMap<MarketDataId, usize>,
    request_hash: &str,
) -> Result<QualityReport, AccessError> {
    let mut report = QualityReport::default();
    let total_rows = aligned.len();
    let total_removed: usize = duplicates_removed.values().sum();
    if total_removed > 0 {
        report
            .actions
            .insert("deduplicate".to_string(), policy.deduplicate.as_str().to_string());
        info!(request_hash, duplicate_count = total_removed, "access.deduplicated");
    }

    for asset in aligned.assets() {
        let columns = aligned.asset_columns(&asset);

        let missing_rows = aligned.missing_rows_for_asset(&asset);
        let coverage = if total_rows > 0 {
            (total_rows - missing_rows.len()) as f64 / total_rows as f64
        } else {
            0.0
        };
        report.coverage.insert(asset.clone(), coverage);
        report.record(
            &asset,
            QualityFlag::MissingValue,
            missing_rows.len(),
            missing_rows
                .iter()
                .take(MAX_EXAMPLE_DATES)
                .map(|row| aligned.index()[*row].to_string())
                .collect(),
        );

        let mut nonpositive_rows: Vec<usize> = Vec::new();
        for field in PRICE_FIELDS {
            if let Some(column) = columns.get(&field) {
                for (row, value) in column.iter().enumerate() {
                    if matches!(value, Some(price) if *price <= 0.0) {
                        nonpositive_rows.push(row);
                    }
                }
            }
        }
        nonpositive_rows.sort_unstable();
        nonpositive_rows.dedup();
        if !nonpositive_rows.is_empty() {
            if policy.no_nonpositive_prices {
                warn!(
                    request_hash,
                    asset_id = asset.as_str(),
                    count = nonpositive_rows.len(),
                    "access.nonpositive_price"
                );
                return Err(AccessError::NonpositivePrice {
                    asset_id: asset.as_str().to_string(),
                    count: nonpositive_rows.len(),
                });
            }
            report.record(
                &asset,
                QualityFlag::NonpositivePrice,
                nonpositive_rows.len(),
                nonpositive_rows
                    .iter()
                    .take(MAX_EXAMPLE_DATES)
                    .map(|row| aligned.index()[*row].to_string())
                    .collect(),
            );
        }

        if let Some(close) = columns.get(&Field::Close) {
            let returns = simple_returns(close);
            let mut suspect: Vec<usize> = Vec::new();
            let mut outliers: Vec<usize> = Vec::new();
            for (row, value) in returns.iter().enumerate() {
                if let Some(ret) = value {
                    if ret.abs() >= policy.corp_action_jump_threshold {
                        suspect.push(row);
                    }
                    if let Some(max_abs_return) = policy.max_abs_return {
                        if ret.abs() >= max_abs_return {
                            outliers.push(row);
                        }
                    }
                }
            }
            if !suspect.is_empty() {
                info!(
                    request_hash,
                    asset_id = asset.as_str(),
                    count = suspect.len(),
                    "access.suspect_corp_action"
                );
            }
            report.record(
                &asset,
                QualityFlag::SuspectCorpAction,
                suspect.len(),
                suspect
                    .iter()
                    .take(MAX_EXAMPLE_DATES)
                    .map(|row| aligned.index()[*row].to_string())
                    .collect(),
            );
            if !outliers.is_empty() {
                info!(
                    request_hash,
                    asset_id = asset.as_str(),
                    count = outliers.len(),
                    "access.outlier_return"
                );
            }
            report.record(
                &asset,
                QualityFlag::OutlierReturn,
                outliers.len(),
                outliers
                    .iter()
                    .take(MAX_EXAMPLE_DATES)
                    .map(|row| aligned.index()[*row].to_string())
                    .collect(),
            );
        }

        if let Some(removed) = duplicates_removed.get(&asset) {
            report.record(&asset, QualityFlag::DuplicateResolved, *removed, Vec::new());
        }
    }
    Ok(report)
}

/// Simple returns between consecutive observed closes; `None` when either
/// side of the pair is missing.
fn simple_returns(close: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut returns = vec![None; close.len()];
    for row in 1..close.len() {
        if let (Some(prev), Some(current)) = (close[row - 1], close[row]) {
            if prev != 0.0 {
                returns[row] = Some(current / prev - 1.0);
            }
        }
    }
    returns
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn asset(id: &str) -> MarketDataId {
        MarketDataId::new(id).unwrap()
    }

    fn close_frame(values: Vec<Option<f64>>) -> DataFrame {
        let index = (0..values.len()).map(|offset| d(2 + offset as u32)).collect();
        let mut frame = DataFrame::new(index).unwrap();
        frame.insert_column((asset("EQ:TEST"), Field::Close), values).unwrap();
        frame
    }

    #[test]
    fn naive_split_triggers_suspect_corp_action_without_correction() {
        let frame = close_frame(vec![
            Some(100.0),
            Some(100.0),
            Some(50.0),
            Some(51.0),
            Some(52.0),
        ]);
        let report = validate_and_flag(
            &frame,
            &ValidationPolicy::default(),
            &BTreeMap::new(),
            "testhash",
        )
        .unwrap();
        let counts = &report.flag_counts[&asset("EQ:TEST")];
        assert_eq!(counts[&QualityFlag::SuspectCorpAction], 1);
        let examples = &report.flag_examples[&asset("EQ:TEST")][&QualityFlag::SuspectCorpAction];
        assert_eq!(examples, &vec!["2024-01-04".to_string()]);
        // Values are untouched.
        assert_eq!(frame.value_at(&(asset("EQ:TEST"), Field::Close), d(4)), Some(50.0));
    }

    #[test]
    fn nonpositive_price_is_hard_by_default_and_soft_when_disabled() {
        let frame = close_frame(vec![Some(100.0), Some(-1.0)]);
        let err = validate_and_flag(
            &frame,
            &ValidationPolicy::default(),
            &BTreeMap::new(),
            "testhash",
        )
        .unwrap_err();
        assert!(matches!(err, AccessError::NonpositivePrice { .. }));

        let mut relaxed = ValidationPolicy::default();
        relaxed.no_nonpositive_prices = false;
        let report =
            validate_and_flag(&frame, &relaxed, &BTreeMap::new(), "testhash").unwrap();
        assert_eq!(report.flag_total(QualityFlag::NonpositivePrice), 1);
    }

    #[test]
    fn outlier_return_respects_max_abs_return() {
        let frame = close_frame(vec![Some(100.0), Some(120.0)]);
        let mut policy = ValidationPolicy::default();
        policy.max_abs_return = Some(0.15);
        let report = validate_and_flag(&frame, &policy, &BTreeMap::new(), "h").unwrap();
        assert_eq!(report.flag_total(QualityFlag::OutlierReturn), 1);
        // 20% move stays under the 40% corporate-action threshold.
        assert_eq!(report.flag_total(QualityFlag::SuspectCorpAction), 0);
    }

    #[test]
    fn dedup_last_keeps_final_observation() {
        let series = ProviderSeries {
            rows: vec![
                ProviderRow {
                    date: d(2),
                    values: BTreeMap::from([(Field::Close, 100.0)]),
                },
                ProviderRow {
                    date: d(2),
                    values: BTreeMap::from([(Field::Close, 101.0)]),
                },
                ProviderRow {
                    date: d(3),
                    values: BTreeMap::from([(Field::Close, 102.0)]),
                },
            ],
        };
        let (rows, removed) =
            deduplicate_series(&asset("EQ:TEST"), &series, DeduplicatePolicy::Last).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(rows[0].values[&Field::Close], 101.0);

        let (first_rows, _) =
            deduplicate_series(&asset("EQ:TEST"), &series, DeduplicatePolicy::First).unwrap();
        assert_eq!(first_rows[0].values[&Field::Close], 100.0);

        let err =
            deduplicate_series(&asset("EQ:TEST"), &series, DeduplicatePolicy::Error).unwrap_err();
        assert!(matches!(err, AccessError::DuplicateDates { .. }));
    }

    #[test]
    fn coverage_counts_missing_rows() {
        let frame = close_frame(vec![Some(100.0), None, Some(101.0), None]);
        let report = validate_and_flag(
            &frame,
            &ValidationPolicy::default(),
            &BTreeMap::new(),
            "h",
        )
        .unwrap();
        assert!((report.coverage[&asset("EQ:TEST")] - 0.5).abs() < 1e-12);
        assert_eq!(report.flag_total(QualityFlag::MissingValue), 2);
    }
}
