//! The valuation engine: portfolio NAV with per-currency reconciliation.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::core::identity::Currency;
use crate::instruments::instrument::Instrument;
use crate::instruments::portfolio::{Portfolio, Position};
use crate::pricing::errors::PricingError;
use crate::pricing::fx::{FxConverter, FxRateResolver};
use crate::pricing::market_data::MarketDataView;
use crate::pricing::pricers::{PricerRegistry, PricingContext};
use crate::pricing::valuation::{
    CurrencyBreakdown, PortfolioValuation, PositionValuation, VALUATION_SCHEMA_VERSION,
};
use crate::report::lineage::InputLineage;

/// Aggregate position valuations into a portfolio NAV.
pub struct ValuationEngine {
    registry: PricerRegistry,
    price_field: String,
}

impl ValuationEngine {
    pub fn new(registry: PricerRegistry) -> Self {
        Self {
            registry,
            price_field: "close".to_string(),
        }
    }

    pub fn value_portfolio(
        &self,
        portfolio: &Portfolio,
        instruments: &BTreeMap<String, Instrument>,
        market_data: &dyn MarketDataView,
        base_currency: Currency,
        as_of: Option<NaiveDate>,
        lineage: Option<InputLineage>,
    ) -> Result<PortfolioValuation, PricingError> {
        let as_of = as_of.unwrap_or_else(|| portfolio.as_of.date_naive());
        let resolver = FxRateResolver::new(market_data);
        let converter = FxConverter::new(resolver);
        let context = PricingContext {
            as_of,
            base_currency: base_currency.clone(),
            price_field: self.price_field.clone(),
            fx: &converter,
        };

        let positions = collect_positions(portfolio, instruments, as_of)?;
        let mut valuations: Vec<PositionValuation> = Vec::with_capacity(positions.len());
        let mut warnings: Vec<String> = Vec::new();
        let mut breakdown_totals: BTreeMap<Currency, (f64, f64)> = BTreeMap::new();
        for (position, instrument) in &positions {
            let pricer = self.registry.resolve(instrument.spec.kind().as_str())?;
            let valuation = pricer.price(position, instrument, market_data, &context)?;
            warnings.extend(valuation.warnings.iter().cloned());
            let totals = breakdown_totals
                .entry(valuation.instrument_currency.clone())
                .or_insert((0.0, 0.0));
            totals.0 += valuation.notional_native;
            totals.1 += valuation.notional_base;
            valuations.push(valuation);
        }

        let nav_base: f64 = valuations.iter().map(|valuation| valuation.notional_base).sum();
        let breakdown_by_currency = breakdown_totals
            .into_iter()
            .map(|(currency, (notional_native, notional_base))| {
                (
                    currency,
                    CurrencyBreakdown {
                        notional_native,
                        notional_base,
                    },
                )
            })
            .collect();
        warnings.sort();
        warnings.dedup();

        Ok(PortfolioValuation {
            schema_version: VALUATION_SCHEMA_VERSION.to_string(),
            as_of,
            base_currency,
            nav_base,
            positions: valuations,
            breakdown_by_currency,
            warnings,
            lineage,
        })
    }
}

/// Synthesize cash positions from the cash map and resolve instruments for
/// the held positions, in canonical instrument-id order.
fn collect_positions(
    portfolio: &Portfolio,
    instruments: &BTreeMap<String, Instrument>,
    as_of: NaiveDate,
) -> Result<Vec<(Position, Instrument)>, PricingError> {
    let mut positions: Vec<(Position, Instrument)> = Vec::new();
    for (currency, amount) in &portfolio.cash {
        if !amount.is_finite() {
            return Err(PricingError::NonFiniteInput {
                field: "cash_amount".to_string(),
                value: *amount,
                as_of,
                instrument_id: Some(format!("CASH.{currency}")),
            });
        }
        let instrument =
            Instrument::cash(currency.clone()).map_err(|_| PricingError::MissingBinding {
                instrument_id: format!("CASH.{currency}"),
                field: "currency",
            })?;
        // Cash is long-or-short; bypass the long-only position constructor
        // by carrying the signed amount directly.
        let position = Position {
            instrument_id: instrument.instrument_id.clone(),
            quantity: *amount,
            meta: None,
        };
        positions.push((position, instrument));
    }
    for position in &portfolio.positions {
        let instrument_id = position.instrument_id.as_str();
        let instrument =
            instruments
                .get(instrument_id)
                .cloned()
                .ok_or_else(|| PricingError::MissingInstrument {
                    instrument_id: instrument_id.to_string(),
                })?;
        positions.push((position.clone(), instrument));
    }
    positions.sort_by(|a, b| a.0.instrument_id.cmp(&b.0.instrument_id));
    Ok(positions)
}
