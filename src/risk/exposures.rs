//! Asset and currency exposure views.

use std::collections::BTreeMap;

use crate::core::identity::{Currency, MarketDataId};
use crate::pricing::valuation::PortfolioValuation;
use crate::risk::errors::RiskError;
use crate::risk::report::{AssetExposure, CurrencyExposure, RiskExposures};

/// Build exposure views from a valuation snapshot.
///
/// Weights normalize by gross base notional when it is non-zero; otherwise
/// raw notionals are reported and the convention records it. Currency
/// exposure is a pure decomposition; no cross-currency aggregation beyond
/// the base-currency notionals already implied by the valuation's FX
/// policy.
pub fn exposures_from_valuation(
    valuation: &PortfolioValuation,
) -> Result<RiskExposures, RiskError> {
    let mut by_asset_totals: BTreeMap<MarketDataId, f64> = BTreeMap::new();
    let mut by_currency_totals: BTreeMap<Currency, f64> = BTreeMap::new();
    for position in &valuation.positions {
        if !position.notional_base.is_finite() {
            return Err(RiskError::NonFinite {
                label: format!("notional_base[{}]", position.instrument_id),
            });
        }
        if let Some(ref market_data_id) = position.market_data_id {
            *by_asset_totals.entry(market_data_id.clone()).or_insert(0.0) +=
                position.notional_base;
        }
        *by_currency_totals
            .entry(position.instrument_currency.clone())
            .or_insert(0.0) += position.notional_base;
    }

    let gross: f64 = by_currency_totals.values().map(|notional| notional.abs()).sum();
    let normalized = gross > 0.0;
    let scale = |notional: f64| if normalized { notional / gross } else { notional };

    let by_asset = by_asset_totals
        .into_iter()
        .map(|(asset_id, notional_base)| AssetExposure {
            asset_id,
            weight: scale(notional_base),
            notional_base,
        })
        .collect();
    let by_currency = by_currency_totals
        .into_iter()
        .map(|(currency, notional_base)| CurrencyExposure {
            currency,
            weight: scale(notional_base),
            notional_base,
        })
        .collect();

    Ok(RiskExposures {
        by_asset,
        by_currency,
        weight_convention: if normalized {
            "NORMALIZED".to_string()
        } else {
            "RAW_NOTIONAL".to_string()
        },
    })
}

/// Asset weights for attribution: base notionals normalized over the
/// assets that carry market data.
pub fn attribution_weights(
    valuation: &PortfolioValuation,
) -> Result<BTreeMap<MarketDataId, f64>, RiskError> {
    let mut totals: BTreeMap<MarketDataId, f64> = BTreeMap::new();
    for position in &valuation.positions {
        if let Some(ref market_data_id) = position.market_data_id {
            *totals.entry(market_data_id.clone()).or_insert(0.0) += position.notional_base;
        }
    }
    let gross: f64 = totals.values().map(|notional| notional.abs()).sum();
    if gross <= 0.0 {
        return Err(RiskError::Attribution {
            detail: "no market-data-bearing positions to weight".to_string(),
        });
    }
    Ok(totals
        .into_iter()
        .map(|(asset, notional)| (asset, notional / gross))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::InstrumentId;
    use crate::pricing::valuation::{PositionValuation, VALUATION_SCHEMA_VERSION};
    use chrono::NaiveDate;

    fn position(
        id: &str,
        market_data_id: Option<&str>,
        currency: &str,
        notional_base: f64,
    ) -> PositionValuation {
        PositionValuation {
            schema_version: VALUATION_SCHEMA_VERSION.to_string(),
            as_of: NaiveDate::from_ymd_opt(2026, 1, 6).unwrap(),
            instrument_id: InstrumentId::new(id).unwrap(),
            market_data_id: market_data_id.map(|md| MarketDataId::new(md).unwrap()),
            instrument_kind: "equity".to_string(),
            quantity: 1.0,
            instrument_currency: Currency::new(currency).unwrap(),
            unit_price: Some(notional_base),
            notional_native: notional_base,
            base_currency: Currency::new("EUR").unwrap(),
            fx_asset_id_used: None,
            fx_inverted: false,
            fx_rate_effective: 1.0,
            notional_base,
            inputs: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn valuation(positions: Vec<PositionValuation>) -> PortfolioValuation {
        PortfolioValuation {
            schema_version: VALUATION_SCHEMA_VERSION.to_string(),
            as_of: NaiveDate::from_ymd_opt(2026, 1, 6).unwrap(),
            base_currency: Currency::new("EUR").unwrap(),
            nav_base: positions.iter().map(|p| p.notional_base).sum(),
            positions,
            breakdown_by_currency: BTreeMap::new(),
            warnings: Vec::new(),
            lineage: None,
        }
    }

    #[test]
    fn weights_normalize_to_one_over_gross() {
        let valuation = valuation(vec![
            position("EQ.AAPL", Some("EQ.AAPL"), "USD", 1800.0),
            position("EQ.SAP", Some("EQ.SAP"), "EUR", 1200.0),
            position("CASH.EUR", None, "EUR", 1000.0),
        ]);
        let exposures = exposures_from_valuation(&valuation).unwrap();
        assert_eq!(exposures.weight_convention, "NORMALIZED");
        let total_weight: f64 = exposures
            .by_currency
            .iter()
            .map(|exposure| exposure.weight)
            .sum();
        assert!((total_weight - 1.0).abs() < 1e-12);
        // Sorted by stable key.
        assert_eq!(exposures.by_asset[0].asset_id.as_str(), "EQ.AAPL");
        assert_eq!(exposures.by_currency[0].currency.as_str(), "EUR");
    }

    #[test]
    fn attribution_weights_cover_market_assets_only() {
        let valuation = valuation(vec![
            position("EQ.AAPL", Some("EQ.AAPL"), "USD", 3000.0),
            position("CASH.EUR", None, "EUR", 1000.0),
            position("EQ.SAP", Some("EQ.SAP"), "EUR", 1000.0),
        ]);
        let weights = attribution_weights(&valuation).unwrap();
        assert_eq!(weights.len(), 2);
        assert!((weights[&MarketDataId::new("EQ.AAPL").unwrap()] - 0.75).abs() < 1e-12);
        assert!((weights[&MarketDataId::new("EQ.SAP").unwrap()] - 0.25).abs() < 1e-12);
    }
}
