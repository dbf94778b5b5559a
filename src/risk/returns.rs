//! Return-series construction with explicit missing-data policies.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::access::bundle::TimeSeriesBundle;
use crate::access::request::Field;
use crate::core::identity::MarketDataId;
use crate::risk::errors::RiskError;
use crate::risk::report::RiskWarning;
use crate::risk::request::{ReturnDefinition, RiskMissingPolicy};

/// Dates plus one optional-valued column per asset; every column has the
/// index length.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedSeries {
    pub dates: Vec<NaiveDate>,
    pub columns: BTreeMap<MarketDataId, Vec<Option<f64>>>,
}

impl AlignedSeries {
    pub fn new(dates: Vec<NaiveDate>) -> Self {
        Self {
            dates,
            columns: BTreeMap::new(),
        }
    }

    /// Extract one field per asset from an access bundle.
    pub fn from_bundle(bundle: &TimeSeriesBundle, field: Field) -> Self {
        let dates = bundle.data.index().to_vec();
        let mut columns = BTreeMap::new();
        for asset in bundle.data.assets() {
            if let Some(column) = bundle.data.column(&(asset.clone(), field)) {
                columns.insert(asset, column.to_vec());
            }
        }
        Self { dates, columns }
    }

    pub fn assets(&self) -> Vec<MarketDataId> {
        self.columns.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Count of missing cells across all columns.
    pub fn missing_count(&self) -> usize {
        self.columns
            .values()
            .map(|column| column.iter().filter(|value| value.is_none()).count())
            .sum()
    }

    /// Restrict to dates `<= cutoff`.
    pub fn truncate_after(&self, cutoff: NaiveDate) -> Self {
        let keep: Vec<usize> = self
            .dates
            .iter()
            .enumerate()
            .filter(|(_, date)| **date <= cutoff)
            .map(|(row, _)| row)
            .collect();
        self.select_rows(&keep)
    }

    /// Restrict to the trailing `rows` observations.
    pub fn tail(&self, rows: usize) -> Self {
        let start = self.dates.len().saturating_sub(rows);
        let keep: Vec<usize> = (start..self.dates.len()).collect();
        self.select_rows(&keep)
    }

    /// Restrict to dates within `[start, end]`.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> Self {
        let keep: Vec<usize> = self
            .dates
            .iter()
            .enumerate()
            .filter(|(_, date)| **date >= start && **date <= end)
            .map(|(row, _)| row)
            .collect();
        self.select_rows(&keep)
    }

    fn select_rows(&self, rows: &[usize]) -> Self {
        let dates = rows.iter().map(|row| self.dates[*row]).collect();
        let columns = self
            .columns
            .iter()
            .map(|(asset, column)| {
                (
                    asset.clone(),
                    rows.iter().map(|row| column[*row]).collect(),
                )
            })
            .collect();
        Self { dates, columns }
    }

    /// Drop rows where any column is missing.
    pub fn drop_incomplete_rows(&self) -> Self {
        let keep: Vec<usize> = (0..self.dates.len())
            .filter(|row| self.columns.values().all(|column| column[*row].is_some()))
            .collect();
        self.select_rows(&keep)
    }

    /// Dense matrix over complete rows, with the surviving dates.
    pub fn dense(&self) -> (Vec<NaiveDate>, Vec<MarketDataId>, Vec<Vec<f64>>) {
        let complete = self.drop_incomplete_rows();
        let assets = complete.assets();
        let matrix = (0..complete.dates.len())
            .map(|row| {
                assets
                    .iter()
                    .map(|asset| complete.columns[asset][row].unwrap_or(f64::NAN))
                    .collect()
            })
            .collect();
        (complete.dates, assets, matrix)
    }
}

/// Build per-asset returns from aligned prices.
///
/// The first price row defines no return and is not part of the result:
/// returns cover `dates[1..]`. Policies then apply to genuine gaps only.
pub fn build_returns(
    prices: &AlignedSeries,
    return_definition: ReturnDefinition,
    missing_data_policy: RiskMissingPolicy,
) -> Result<(AlignedSeries, Vec<RiskWarning>), RiskError> {
    if prices.dates.len() < 2 {
        return Err(RiskError::InsufficientSample {
            rows: prices.dates.len(),
            required: 2,
            context: "returns".to_string(),
        });
    }
    let mut warnings = Vec::new();
    let mut price_columns = prices.columns.clone();

    if return_definition == ReturnDefinition::Log {
        for column in price_columns.values() {
            if column.iter().flatten().any(|price| *price <= 0.0) {
                return Err(RiskError::InvalidRequest {
                    detail: "log returns require strictly positive prices".to_string(),
                });
            }
        }
    }

    if missing_data_policy == RiskMissingPolicy::ForwardFill {
        let missing_before = prices.missing_count();
        if missing_before > 0 {
            warnings.push(RiskWarning::new(
                "MISSING_DATA_FORWARD_FILL",
                "Forward-filled missing prices before returns; results may be biased.",
                [("missing_count", missing_before.to_string())],
            ));
        }
        for column in price_columns.values_mut() {
            let mut last: Option<f64> = None;
            for value in column.iter_mut() {
                match value {
                    Some(price) => last = Some(*price),
                    None => *value = last,
                }
            }
        }
    }

    let mut returns = AlignedSeries::new(prices.dates[1..].to_vec());
    for (asset, column) in &price_columns {
        let mut series = Vec::with_capacity(column.len() - 1);
        for row in 1..column.len() {
            let value = match (column[row - 1], column[row]) {
                (Some(prev), Some(current)) => {
                    let ret = match return_definition {
                        ReturnDefinition::Simple => current / prev - 1.0,
                        ReturnDefinition::Log => (current / prev).ln(),
                    };
                    if ret.is_infinite() {
                        return Err(RiskError::NonFinite {
                            label: format!("returns[{asset}]"),
                        });
                    }
                    Some(ret)
                }
                _ => None,
            };
            series.push(value);
        }
        returns.columns.insert(asset.clone(), series);
    }

    let missing_after = returns.missing_count();
    match missing_data_policy {
        RiskMissingPolicy::Error | RiskMissingPolicy::ForwardFill => {
            if missing_after > 0 {
                return Err(RiskError::MissingValues {
                    missing_count: missing_after,
                    context: "returns".to_string(),
                });
            }
        }
        RiskMissingPolicy::DropDates => {
            returns = returns.drop_incomplete_rows();
        }
        RiskMissingPolicy::Partial => {
            if missing_after > 0 {
                warnings.push(RiskWarning::new(
                    "MISSING_DATA_PARTIAL",
                    "Partial missing data retained in returns; downstream metrics align on intersections.",
                    [("missing_count", missing_after.to_string())],
                ));
            }
        }
    }

    for column in returns.columns.values() {
        if column.iter().flatten().any(|value| !value.is_finite()) {
            return Err(RiskError::NonFinite {
                label: "returns".to_string(),
            });
        }
    }
    Ok((returns, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, day).unwrap()
    }

    fn asset(id: &str) -> MarketDataId {
        MarketDataId::new(id).unwrap()
    }

    fn prices(values: Vec<Option<f64>>) -> AlignedSeries {
        let mut series = AlignedSeries::new((0..values.len()).map(|i| d(2 + i as u32)).collect());
        series.columns.insert(asset("EQ:SPY"), values);
        series
    }

    #[test]
    fn simple_and_log_returns_match_definitions() {
        let series = prices(vec![Some(100.0), Some(110.0), Some(99.0)]);
        let (simple, _) =
            build_returns(&series, ReturnDefinition::Simple, RiskMissingPolicy::Error).unwrap();
        let column = &simple.columns[&asset("EQ:SPY")];
        assert!((column[0].unwrap() - 0.10).abs() < 1e-12);
        assert!((column[1].unwrap() + 0.10).abs() < 1e-12);

        let (log, _) =
            build_returns(&series, ReturnDefinition::Log, RiskMissingPolicy::Error).unwrap();
        let log_column = &log.columns[&asset("EQ:SPY")];
        assert!((log_column[0].unwrap() - (1.1f64).ln()).abs() < 1e-12);
    }

    #[test]
    fn error_policy_rejects_gaps_and_drop_removes_them() {
        let gappy = prices(vec![Some(100.0), None, Some(99.0)]);
        assert!(matches!(
            build_returns(&gappy, ReturnDefinition::Simple, RiskMissingPolicy::Error),
            Err(RiskError::MissingValues { .. })
        ));
        let (dropped, _) =
            build_returns(&gappy, ReturnDefinition::Simple, RiskMissingPolicy::DropDates)
                .unwrap();
        assert!(dropped.columns[&asset("EQ:SPY")].is_empty());
    }

    #[test]
    fn forward_fill_warns_and_fills() {
        let gappy = prices(vec![Some(100.0), None, Some(99.0)]);
        let (filled, warnings) =
            build_returns(&gappy, ReturnDefinition::Simple, RiskMissingPolicy::ForwardFill)
                .unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, "MISSING_DATA_FORWARD_FILL");
        let column = &filled.columns[&asset("EQ:SPY")];
        // Day 2 return is 0 (filled at 100), day 3 is 99/100 - 1.
        assert!((column[0].unwrap() - 0.0).abs() < 1e-12);
        assert!((column[1].unwrap() + 0.01).abs() < 1e-12);
    }

    #[test]
    fn log_returns_reject_nonpositive_prices() {
        let series = prices(vec![Some(100.0), Some(-1.0)]);
        assert!(build_returns(&series, ReturnDefinition::Log, RiskMissingPolicy::Error).is_err());
    }
}
