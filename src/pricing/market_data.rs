//! Read-only market-data protocol consumed by pricing.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::access::bundle::TimeSeriesBundle;
use crate::access::request::Field;
use crate::core::identity::MarketDataId;
use crate::core::quality::QualityFlag;

/// Annotations riding on a market value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketDataMeta {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quality_flags: Vec<QualityFlag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aligned_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lineage_ids: Vec<String>,
}

/// A value plus optional annotations.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketPoint {
    pub value: f64,
    pub meta: Option<MarketDataMeta>,
}

/// Read-only view over aligned market data.
///
/// Pricing depends only on this protocol; any aligned store can stand
/// behind it.
pub trait MarketDataView {
    fn get_value(&self, asset_id: &MarketDataId, field: &str, as_of: NaiveDate) -> Option<f64>;

    fn has_value(&self, asset_id: &MarketDataId, field: &str, as_of: NaiveDate) -> bool {
        self.get_value(asset_id, field, as_of).is_some()
    }

    fn get_point(
        &self,
        asset_id: &MarketDataId,
        field: &str,
        as_of: NaiveDate,
    ) -> Option<MarketPoint> {
        self.get_value(asset_id, field, as_of).map(|value| MarketPoint {
            value,
            meta: None,
        })
    }
}

fn parse_field(field: &str) -> Option<Field> {
    match field {
        "close" => Some(Field::Close),
        "open" => Some(Field::Open),
        "high" => Some(Field::High),
        "low" => Some(Field::Low),
        "volume" => Some(Field::Volume),
        _ => None,
    }
}

/// Adapter exposing a time-series bundle through the pricing protocol.
/// Quality flags recorded on the bundle surface in `MarketPoint.meta`.
pub struct BundleMarketDataView<'a> {
    bundle: &'a TimeSeriesBundle,
}

impl<'a> BundleMarketDataView<'a> {
    pub fn new(bundle: &'a TimeSeriesBundle) -> Self {
        Self { bundle }
    }
}

impl MarketDataView for BundleMarketDataView<'_> {
    fn get_value(&self, asset_id: &MarketDataId, field: &str, as_of: NaiveDate) -> Option<f64> {
        let field = parse_field(field)?;
        self.bundle.data.value_at(&(asset_id.clone(), field), as_of)
    }

    fn get_point(
        &self,
        asset_id: &MarketDataId,
        field: &str,
        as_of: NaiveDate,
    ) -> Option<MarketPoint> {
        let value = self.get_value(asset_id, field, as_of)?;
        let quality_flags: Vec<QualityFlag> = self
            .bundle
            .quality
            .flag_examples
            .get(asset_id)
            .map(|examples| {
                examples
                    .iter()
                    .filter(|(_, dates)| dates.iter().any(|date| date == &as_of.to_string()))
                    .map(|(flag, _)| *flag)
                    .collect()
            })
            .unwrap_or_default();
        let meta = MarketDataMeta {
            quality_flags,
            source_date: Some(as_of),
            aligned_date: Some(as_of),
            lineage_ids: vec![self.bundle.lineage.request_hash.clone()],
        };
        Some(MarketPoint {
            value,
            meta: Some(meta),
        })
    }
}

/// In-memory view for tests and stress market states.
#[derive(Debug, Clone, Default)]
pub struct StaticMarketDataView {
    values: std::collections::BTreeMap<(MarketDataId, String, NaiveDate), f64>,
}

impl StaticMarketDataView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(
        mut self,
        asset_id: MarketDataId,
        field: impl Into<String>,
        as_of: NaiveDate,
        value: f64,
    ) -> Self {
        self.values.insert((asset_id, field.into(), as_of), value);
        self
    }
}

impl MarketDataView for StaticMarketDataView {
    fn get_value(&self, asset_id: &MarketDataId, field: &str, as_of: NaiveDate) -> Option<f64> {
        self.values
            .get(&(asset_id.clone(), field.to_string(), as_of))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::bundle::{AssetMeta, TimeSeriesBundle};
    use crate::access::cache::LineageMeta;
    use crate::access::frame::DataFrame;
    use crate::access::validate::QualityReport;
    use std::collections::BTreeMap;

    fn flagged_bundle() -> TimeSeriesBundle {
        let asset = MarketDataId::new("EQ.TEST").unwrap();
        let dates = vec![
            NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 6).unwrap(),
        ];
        let mut frame = DataFrame::new(dates).unwrap();
        frame
            .insert_column((asset.clone(), Field::Close), vec![Some(100.0), Some(50.0)])
            .unwrap();
        let mut quality = QualityReport::default();
        quality.flag_examples.insert(
            asset.clone(),
            BTreeMap::from([(
                QualityFlag::SuspectCorpAction,
                vec!["2026-01-06".to_string()],
            )]),
        );
        TimeSeriesBundle {
            data: frame,
            assets_meta: BTreeMap::from([(
                asset,
                AssetMeta {
                    provider: "fixture".to_string(),
                    provider_symbol: "TEST".to_string(),
                },
            )]),
            quality,
            lineage: LineageMeta {
                request_hash: "hash".to_string(),
                request_json: serde_json::json!({}),
                provider: "fixture".to_string(),
                ingestion_ts_utc: "2026-01-06T22:00:00+00:00".to_string(),
                as_of_utc: None,
                dataset_version: "2026-01-06".to_string(),
                code_version: None,
                storage_paths: Vec::new(),
            },
        }
    }

    #[test]
    fn bundle_view_surfaces_quality_flags_on_the_flagged_date() {
        let bundle = flagged_bundle();
        let view = BundleMarketDataView::new(&bundle);
        let asset = MarketDataId::new("EQ.TEST").unwrap();

        let flagged = view
            .get_point(&asset, "close", NaiveDate::from_ymd_opt(2026, 1, 6).unwrap())
            .unwrap();
        assert_eq!(flagged.value, 50.0);
        let meta = flagged.meta.unwrap();
        assert_eq!(meta.quality_flags, vec![QualityFlag::SuspectCorpAction]);
        assert_eq!(meta.lineage_ids, vec!["hash".to_string()]);

        let clean = view
            .get_point(&asset, "close", NaiveDate::from_ymd_opt(2026, 1, 5).unwrap())
            .unwrap();
        assert!(clean.meta.unwrap().quality_flags.is_empty());
    }

    #[test]
    fn unknown_fields_and_dates_are_absent() {
        let bundle = flagged_bundle();
        let view = BundleMarketDataView::new(&bundle);
        let asset = MarketDataId::new("EQ.TEST").unwrap();
        assert!(!view.has_value(&asset, "volume", NaiveDate::from_ymd_opt(2026, 1, 6).unwrap()));
        assert!(view
            .get_value(&asset, "close", NaiveDate::from_ymd_opt(2026, 1, 7).unwrap())
            .is_none());
    }
}
