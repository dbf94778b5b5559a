//! Pricer components and the registry mapping spec kinds to them.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::core::identity::Currency;
use crate::instruments::instrument::Instrument;
use crate::instruments::portfolio::Position;
use crate::instruments::spec::InstrumentSpec;
use crate::pricing::errors::PricingError;
use crate::pricing::fx::FxConverter;
use crate::pricing::market_data::MarketDataView;
use crate::pricing::valuation::{PositionValuation, ValuationInput, VALUATION_SCHEMA_VERSION};

/// Shared inputs of one valuation pass.
pub struct PricingContext<'a> {
    pub as_of: NaiveDate,
    pub base_currency: Currency,
    pub price_field: String,
    pub fx: &'a FxConverter<'a>,
}

/// Deterministic per-position pricer.
pub trait Pricer {
    fn required_fields(&self) -> Vec<String>;

    fn price(
        &self,
        position: &Position,
        instrument: &Instrument,
        market_data: &dyn MarketDataView,
        context: &PricingContext<'_>,
    ) -> Result<PositionValuation, PricingError>;
}

fn instrument_currency(instrument: &Instrument) -> Result<Currency, PricingError> {
    instrument
        .currency
        .clone()
        .ok_or_else(|| PricingError::MissingBinding {
            instrument_id: instrument.instrument_id.as_str().to_string(),
            field: "currency",
        })
}

/// Look up a unit price and capture the audit input plus any quality
/// warnings attached to the point.
fn lookup_unit_price(
    instrument: &Instrument,
    market_data: &dyn MarketDataView,
    context: &PricingContext<'_>,
) -> Result<(f64, ValuationInput, Vec<String>), PricingError> {
    let market_data_id =
        instrument
            .market_data_id
            .clone()
            .ok_or_else(|| PricingError::MissingBinding {
                instrument_id: instrument.instrument_id.as_str().to_string(),
                field: "market_data_id",
            })?;
    let instrument_id = instrument.instrument_id.as_str().to_string();
    let point = market_data
        .get_point(&market_data_id, &context.price_field, context.as_of)
        .ok_or_else(|| PricingError::MissingPrice {
            asset_id: market_data_id.as_str().to_string(),
            field: context.price_field.clone(),
            as_of: context.as_of,
            instrument_id: Some(instrument_id.clone()),
        })?;
    if !point.value.is_finite() {
        return Err(PricingError::NonFiniteInput {
            field: context.price_field.clone(),
            value: point.value,
            as_of: context.as_of,
            instrument_id: Some(instrument_id),
        });
    }
    let warnings = point
        .meta
        .as_ref()
        .map(|meta| {
            meta.quality_flags
                .iter()
                .map(|flag| flag.as_str().to_string())
                .collect()
        })
        .unwrap_or_default();
    let input = ValuationInput {
        asset_id: market_data_id.as_str().to_string(),
        field: context.price_field.clone(),
        date: context.as_of,
        value: point.value,
    };
    Ok((point.value, input, warnings))
}

#[allow(clippy::too_many_arguments)]
fn build_valuation(
    position: &Position,
    instrument: &Instrument,
    context: &PricingContext<'_>,
    currency: Currency,
    unit_price: Option<f64>,
    notional_native: f64,
    inputs: Vec<ValuationInput>,
    mut warnings: Vec<String>,
) -> Result<PositionValuation, PricingError> {
    let conversion = context.fx.convert(
        notional_native,
        &currency,
        &context.base_currency,
        context.as_of,
        Some(instrument.instrument_id.as_str()),
    )?;
    warnings.extend(conversion.warnings.iter().cloned());
    warnings.sort();
    warnings.dedup();
    Ok(PositionValuation {
        schema_version: VALUATION_SCHEMA_VERSION.to_string(),
        as_of: context.as_of,
        instrument_id: instrument.instrument_id.clone(),
        market_data_id: instrument.market_data_id.clone(),
        instrument_kind: instrument.spec.kind().as_str().to_string(),
        quantity: position.quantity,
        instrument_currency: currency,
        unit_price,
        notional_native: conversion.notional_native,
        base_currency: context.base_currency.clone(),
        fx_asset_id_used: conversion.fx_asset_id_used,
        fx_inverted: conversion.fx_inverted,
        fx_rate_effective: conversion.fx_rate_effective,
        notional_base: conversion.notional_base,
        inputs,
        warnings,
    })
}

/// Cash: notional is the quantity itself, no market-data lookup.
pub struct CashPricer;

impl Pricer for CashPricer {
    fn required_fields(&self) -> Vec<String> {
        Vec::new()
    }

    fn price(
        &self,
        position: &Position,
        instrument: &Instrument,
        _market_data: &dyn MarketDataView,
        context: &PricingContext<'_>,
    ) -> Result<PositionValuation, PricingError> {
        let currency = instrument_currency(instrument)?;
        build_valuation(
            position,
            instrument,
            context,
            currency,
            Some(1.0),
            position.quantity,
            Vec::new(),
            Vec::new(),
        )
    }
}

/// Equities: `quantity * close`.
pub struct EquityPricer;

impl Pricer for EquityPricer {
    fn required_fields(&self) -> Vec<String> {
        vec!["close".to_string()]
    }

    fn price(
        &self,
        position: &Position,
        instrument: &Instrument,
        market_data: &dyn MarketDataView,
        context: &PricingContext<'_>,
    ) -> Result<PositionValuation, PricingError> {
        let currency = instrument_currency(instrument)?;
        let (unit_price, input, warnings) = lookup_unit_price(instrument, market_data, context)?;
        build_valuation(
            position,
            instrument,
            context,
            currency,
            Some(unit_price),
            position.quantity * unit_price,
            vec![input],
            warnings,
        )
    }
}

/// Tradable indices price like equities; non-tradable ones cannot be held.
pub struct IndexPricer;

impl Pricer for IndexPricer {
    fn required_fields(&self) -> Vec<String> {
        vec!["close".to_string()]
    }

    fn price(
        &self,
        position: &Position,
        instrument: &Instrument,
        market_data: &dyn MarketDataView,
        context: &PricingContext<'_>,
    ) -> Result<PositionValuation, PricingError> {
        if let InstrumentSpec::Index { is_tradable } = instrument.spec {
            if !is_tradable {
                return Err(PricingError::MissingBinding {
                    instrument_id: instrument.instrument_id.as_str().to_string(),
                    field: "is_tradable",
                });
            }
        }
        EquityPricer.price(position, instrument, market_data, context)
    }
}

/// Futures: linear mark-to-market `quantity * price * multiplier`; no
/// margining or roll.
pub struct FuturePricer;

impl Pricer for FuturePricer {
    fn required_fields(&self) -> Vec<String> {
        vec!["close".to_string()]
    }

    fn price(
        &self,
        position: &Position,
        instrument: &Instrument,
        market_data: &dyn MarketDataView,
        context: &PricingContext<'_>,
    ) -> Result<PositionValuation, PricingError> {
        let currency = instrument_currency(instrument)?;
        let multiplier = match instrument.spec {
            InstrumentSpec::Future { multiplier, .. } => multiplier,
            _ => {
                return Err(PricingError::MissingBinding {
                    instrument_id: instrument.instrument_id.as_str().to_string(),
                    field: "multiplier",
                })
            }
        };
        let (unit_price, input, warnings) = lookup_unit_price(instrument, market_data, context)?;
        build_valuation(
            position,
            instrument,
            context,
            currency,
            Some(unit_price),
            position.quantity * unit_price * multiplier,
            vec![input],
            warnings,
        )
    }
}

/// Registry mapping `spec.kind` to a pricer; passed as explicit
/// configuration, never process-wide state.
#[derive(Clone)]
pub struct PricerRegistry {
    pricers: BTreeMap<String, Arc<dyn Pricer + Send + Sync>>,
}

impl PricerRegistry {
    pub fn empty() -> Self {
        Self {
            pricers: BTreeMap::new(),
        }
    }

    /// The MVP registry: cash, equity, index, future.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register("cash", Arc::new(CashPricer));
        registry.register("equity", Arc::new(EquityPricer));
        registry.register("index", Arc::new(IndexPricer));
        registry.register("future", Arc::new(FuturePricer));
        registry
    }

    pub fn register(&mut self, kind: &str, pricer: Arc<dyn Pricer + Send + Sync>) {
        self.pricers.insert(kind.to_string(), pricer);
    }

    pub fn resolve(&self, kind: &str) -> Result<&(dyn Pricer + Send + Sync), PricingError> {
        self.pricers
            .get(kind)
            .map(Arc::as_ref)
            .ok_or_else(|| PricingError::MissingPricer {
                instrument_kind: kind.to_string(),
            })
    }

    pub fn registered_kinds(&self) -> Vec<&str> {
        self.pricers.keys().map(String::as_str).collect()
    }
}
