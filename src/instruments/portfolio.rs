//! Positions and portfolio snapshots with canonical ordering.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::canonical::{content_hash, to_canonical_value};
use crate::core::identity::{Currency, InstrumentId};
use crate::instruments::errors::InstrumentError;
use crate::instruments::instrument::INSTRUMENTS_SCHEMA_VERSION;

/// Long-only position: `(instrument_id, quantity ≥ 0)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub instrument_id: InstrumentId,
    pub quantity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<BTreeMap<String, Value>>,
}

impl Position {
    pub fn new(instrument_id: InstrumentId, quantity: f64) -> Result<Self, InstrumentError> {
        if !quantity.is_finite() {
            return Err(InstrumentError::InvalidQuantity {
                instrument_id: instrument_id.as_str().to_string(),
                quantity,
                reason: "must be finite",
            });
        }
        if quantity < 0.0 {
            return Err(InstrumentError::InvalidQuantity {
                instrument_id: instrument_id.as_str().to_string(),
                quantity,
                reason: "must be >= 0 (long-only)",
            });
        }
        Ok(Self {
            instrument_id,
            quantity,
            meta: None,
        })
    }
}

/// Immutable portfolio snapshot.
///
/// Canonical form: positions sorted by instrument id (duplicates rejected,
/// never merged), cash keys uppercased and sorted, `as_of` with an explicit
/// offset. Two logically equal portfolios produce byte-identical canonical
/// JSON regardless of input ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub schema_version: u32,
    pub as_of: DateTime<FixedOffset>,
    pub positions: Vec<Position>,
    pub cash: BTreeMap<Currency, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<BTreeMap<String, Value>>,
}

impl Portfolio {
    pub fn new(
        as_of: DateTime<FixedOffset>,
        mut positions: Vec<Position>,
        cash: Vec<(String, f64)>,
    ) -> Result<Self, InstrumentError> {
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        for position in &positions {
            if !seen.insert(position.instrument_id.as_str()) {
                return Err(InstrumentError::DuplicatePosition {
                    instrument_id: position.instrument_id.as_str().to_string(),
                });
            }
        }
        positions.sort_by(|a, b| a.instrument_id.cmp(&b.instrument_id));

        let mut normalized: BTreeMap<Currency, f64> = BTreeMap::new();
        for (raw_currency, amount) in cash {
            let currency = Currency::parse_normalized(&raw_currency)?;
            if !amount.is_finite() {
                return Err(InstrumentError::NonFiniteCash {
                    currency: currency.as_str().to_string(),
                    amount,
                });
            }
            // Negative balances are allowed (borrow/overdraft); duplicates
            // after normalization are not.
            if normalized.insert(currency.clone(), amount).is_some() {
                return Err(InstrumentError::DuplicateCashCurrency {
                    currency: currency.as_str().to_string(),
                });
            }
        }

        Ok(Self {
            schema_version: INSTRUMENTS_SCHEMA_VERSION,
            as_of,
            positions,
            cash: normalized,
            meta: None,
        })
    }

    /// Canonical dict used for hashing and golden serialization.
    pub fn to_canonical_value(&self) -> Result<Value, InstrumentError> {
        Ok(to_canonical_value(self)?)
    }

    /// Content hash identifying this snapshot in report lineage.
    pub fn snapshot_hash(&self) -> Result<String, InstrumentError> {
        Ok(content_hash(&self.to_canonical_value()?))
    }
}
