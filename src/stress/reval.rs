//! Linear revaluation of positions under shocked prices.

use std::collections::BTreeMap;

use crate::core::identity::MarketDataId;
use crate::instruments::instrument::Instrument;
use crate::instruments::portfolio::Position;
use crate::instruments::spec::InstrumentSpec;
use crate::stress::errors::StressError;

fn lookup(
    prices: &BTreeMap<MarketDataId, f64>,
    asset: &MarketDataId,
    label: &str,
) -> Result<f64, StressError> {
    let price = prices
        .get(asset)
        .ok_or_else(|| StressError::MissingMarketState {
            asset_id: asset.as_str().to_string(),
        })?;
    if !price.is_finite() {
        return Err(StressError::NonFinite {
            label: format!("{label}[{asset}]"),
        });
    }
    Ok(*price)
}

/// P&L of one position under shocked prices.
///
/// Equity/index: `q * (P' - P)`. Future: `q * multiplier * (P' - P)`.
/// Cash: zero in its own currency; no FX revaluation without an explicit
/// base policy.
pub fn linear_position_pnl(
    position: &Position,
    instrument: &Instrument,
    base_prices: &BTreeMap<MarketDataId, f64>,
    shocked_prices: &BTreeMap<MarketDataId, f64>,
) -> Result<f64, StressError> {
    if !position.quantity.is_finite() {
        return Err(StressError::NonFinite {
            label: format!("quantity[{}]", position.instrument_id),
        });
    }
    match &instrument.spec {
        InstrumentSpec::Cash {} => Ok(0.0),
        InstrumentSpec::Equity { .. } | InstrumentSpec::Index { .. } => {
            let asset = required_market_data(instrument)?;
            let base = lookup(base_prices, asset, "base_prices")?;
            let shocked = lookup(shocked_prices, asset, "shocked_prices")?;
            Ok(position.quantity * (shocked - base))
        }
        InstrumentSpec::Future { multiplier, .. } => {
            let asset = required_market_data(instrument)?;
            let base = lookup(base_prices, asset, "base_prices")?;
            let shocked = lookup(shocked_prices, asset, "shocked_prices")?;
            Ok(position.quantity * multiplier * (shocked - base))
        }
        InstrumentSpec::Bond { .. } => Err(StressError::Input {
            detail: format!(
                "instrument '{}' kind 'bond' is outside linear revaluation",
                instrument.instrument_id
            ),
        }),
    }
}

fn required_market_data(instrument: &Instrument) -> Result<&MarketDataId, StressError> {
    instrument
        .market_data_id
        .as_ref()
        .ok_or_else(|| StressError::Input {
            detail: format!(
                "instrument '{}' has no market_data_id for revaluation",
                instrument.instrument_id
            ),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::{Currency, InstrumentId};
    use crate::instruments::spec::InstrumentType;
    use chrono::NaiveDate;

    fn usd() -> Currency {
        Currency::new("USD").unwrap()
    }

    fn equity() -> Instrument {
        Instrument::new(
            InstrumentId::new("EQ.AAPL").unwrap(),
            InstrumentType::Equity,
            Some(MarketDataId::new("EQ.AAPL").unwrap()),
            Some(usd()),
            InstrumentSpec::Equity {
                exchange: None,
                country: None,
            },
        )
        .unwrap()
    }

    fn es_future() -> Instrument {
        Instrument::new(
            InstrumentId::new("FUT.ES").unwrap(),
            InstrumentType::Future,
            Some(MarketDataId::new("FUT.ES").unwrap()),
            Some(usd()),
            InstrumentSpec::Future {
                expiry: NaiveDate::from_ymd_opt(2026, 3, 20).unwrap(),
                multiplier: 50.0,
                root: None,
                exchange: None,
            },
        )
        .unwrap()
    }

    fn prices(entries: &[(&str, f64)]) -> BTreeMap<MarketDataId, f64> {
        entries
            .iter()
            .map(|(asset, price)| (MarketDataId::new(*asset).unwrap(), *price))
            .collect()
    }

    #[test]
    fn equity_and_future_pnl_follow_the_linear_rule() {
        let base = prices(&[("EQ.AAPL", 200.0), ("FUT.ES", 4500.0)]);
        let shocked = prices(&[("EQ.AAPL", 180.0), ("FUT.ES", 4275.0)]);

        let aapl = Position::new(InstrumentId::new("EQ.AAPL").unwrap(), 10.0).unwrap();
        let pnl = linear_position_pnl(&aapl, &equity(), &base, &shocked).unwrap();
        assert!((pnl + 200.0).abs() < 1e-9);

        let es = Position::new(InstrumentId::new("FUT.ES").unwrap(), 2.0).unwrap();
        let es_pnl = linear_position_pnl(&es, &es_future(), &base, &shocked).unwrap();
        assert!((es_pnl + 22_500.0).abs() < 1e-9);
    }

    #[test]
    fn cash_has_zero_pnl_in_its_own_currency() {
        let cash = Instrument::cash(usd()).unwrap();
        let position = Position::new(cash.instrument_id.clone(), 1000.0).unwrap();
        let pnl = linear_position_pnl(
            &position,
            &cash,
            &BTreeMap::new(),
            &BTreeMap::new(),
        )
        .unwrap();
        assert_eq!(pnl, 0.0);
    }

    #[test]
    fn missing_state_price_is_a_typed_error() {
        let aapl = Position::new(InstrumentId::new("EQ.AAPL").unwrap(), 10.0).unwrap();
        let err = linear_position_pnl(
            &aapl,
            &equity(),
            &BTreeMap::new(),
            &prices(&[("EQ.AAPL", 180.0)]),
        )
        .unwrap_err();
        assert!(matches!(err, StressError::MissingMarketState { .. }));
    }
}
