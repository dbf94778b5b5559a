//! Valuation report schema.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::core::canonical::{content_hash, to_canonical_value};
use crate::core::errors::SchemaError;
use crate::core::identity::{Currency, InstrumentId, MarketDataId};
use crate::report::lineage::InputLineage;

pub const VALUATION_SCHEMA_VERSION: &str = "0.1";

/// One market-data lookup a valuation depended on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationInput {
    pub asset_id: String,
    pub field: String,
    pub date: NaiveDate,
    pub value: f64,
}

/// Native/base notionals aggregated per currency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurrencyBreakdown {
    pub notional_native: f64,
    pub notional_base: f64,
}

/// Valuation of a single position, with full FX audit fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionValuation {
    pub schema_version: String,
    pub as_of: NaiveDate,
    pub instrument_id: InstrumentId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_data_id: Option<MarketDataId>,
    pub instrument_kind: String,
    pub quantity: f64,
    pub instrument_currency: Currency,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
    pub notional_native: f64,
    pub base_currency: Currency,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fx_asset_id_used: Option<String>,
    pub fx_inverted: bool,
    pub fx_rate_effective: f64,
    pub notional_base: f64,
    pub inputs: Vec<ValuationInput>,
    pub warnings: Vec<String>,
}

/// Portfolio mark-to-market with per-currency reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioValuation {
    pub schema_version: String,
    pub as_of: NaiveDate,
    pub base_currency: Currency,
    pub nav_base: f64,
    pub positions: Vec<PositionValuation>,
    pub breakdown_by_currency: BTreeMap<Currency, CurrencyBreakdown>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lineage: Option<InputLineage>,
}

impl PortfolioValuation {
    pub fn to_canonical_value(&self) -> Result<serde_json::Value, SchemaError> {
        to_canonical_value(self)
    }

    pub fn report_hash(&self) -> Result<String, SchemaError> {
        Ok(content_hash(&self.to_canonical_value()?))
    }
}
