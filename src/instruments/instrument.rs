//! Instrument: typed spec plus market-data and currency bindings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::identity::{Currency, InstrumentId, MarketDataId};
use crate::instruments::errors::InstrumentError;
use crate::instruments::spec::{InstrumentSpec, InstrumentType};

pub const INSTRUMENTS_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub schema_version: u32,
    pub instrument_id: InstrumentId,
    pub instrument_type: InstrumentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_data_id: Option<MarketDataId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
    pub spec: InstrumentSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<BTreeMap<String, serde_json::Value>>,
}

impl Instrument {
    pub fn new(
        instrument_id: InstrumentId,
        instrument_type: InstrumentType,
        market_data_id: Option<MarketDataId>,
        currency: Option<Currency>,
        spec: InstrumentSpec,
    ) -> Result<Self, InstrumentError> {
        let id = instrument_id.as_str().to_string();
        if spec.kind() != instrument_type {
            return Err(InstrumentError::TypeSpecMismatch {
                instrument_id: id,
                instrument_type: instrument_type.as_str().to_string(),
                spec_kind: spec.kind().as_str().to_string(),
            });
        }
        spec.validate(&id)?;
        if spec.requires_market_data() && market_data_id.is_none() {
            return Err(InstrumentError::MissingMarketDataBinding { instrument_id: id });
        }
        if matches!(spec, InstrumentSpec::Cash {}) {
            if let Some(ref binding) = market_data_id {
                return Err(InstrumentError::ForbiddenMarketDataBinding {
                    instrument_id: id,
                    market_data_id: binding.as_str().to_string(),
                });
            }
        }
        let needs_currency = match &spec {
            InstrumentSpec::Index { is_tradable } => *is_tradable,
            InstrumentSpec::Equity { .. }
            | InstrumentSpec::Cash {}
            | InstrumentSpec::Future { .. }
            | InstrumentSpec::Bond { .. } => true,
        };
        if needs_currency && currency.is_none() {
            return Err(InstrumentError::MissingCurrency {
                instrument_id: id,
                instrument_type: instrument_type.as_str().to_string(),
            });
        }
        Ok(Self {
            schema_version: INSTRUMENTS_SCHEMA_VERSION,
            instrument_id,
            instrument_type,
            market_data_id,
            currency,
            spec,
            meta: None,
        })
    }

    /// Synthesize the implicit cash instrument for a currency bucket.
    pub fn cash(currency: Currency) -> Result<Self, InstrumentError> {
        let id = InstrumentId::new(format!("CASH.{currency}"))?;
        Self::new(
            id,
            InstrumentType::Cash,
            None,
            Some(currency),
            InstrumentSpec::Cash {},
        )
    }
}
