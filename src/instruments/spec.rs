//! Typed instrument specs, discriminated by `kind`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::instruments::errors::InstrumentError;

/// Instrument type, mirrored by the spec discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentType {
    Equity,
    Index,
    Cash,
    Future,
    Bond,
}

impl InstrumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equity => "equity",
            Self::Index => "index",
            Self::Cash => "cash",
            Self::Future => "future",
            Self::Bond => "bond",
        }
    }
}

impl std::fmt::Display for InstrumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tagged spec variants. The serialized form is discriminated by `kind`
/// with lowercase values matching `InstrumentType`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum InstrumentSpec {
    Equity {
        #[serde(skip_serializing_if = "Option::is_none")]
        exchange: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        country: Option<String>,
    },
    Index {
        is_tradable: bool,
    },
    Cash {},
    Future {
        expiry: NaiveDate,
        multiplier: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        root: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        exchange: Option<String>,
    },
    Bond {
        maturity: NaiveDate,
        #[serde(skip_serializing_if = "Option::is_none")]
        issuer: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        coupon_rate: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        coupon_frequency: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        day_count: Option<String>,
    },
}

impl InstrumentSpec {
    pub fn kind(&self) -> InstrumentType {
        match self {
            Self::Equity { .. } => InstrumentType::Equity,
            Self::Index { .. } => InstrumentType::Index,
            Self::Cash {} => InstrumentType::Cash,
            Self::Future { .. } => InstrumentType::Future,
            Self::Bond { .. } => InstrumentType::Bond,
        }
    }

    /// Spec-level invariants: finite positive future multiplier, finite
    /// coupon rate.
    pub fn validate(&self, instrument_id: &str) -> Result<(), InstrumentError> {
        match self {
            Self::Future { multiplier, .. } => {
                if !multiplier.is_finite() || *multiplier <= 0.0 {
                    return Err(InstrumentError::InvalidMultiplier {
                        instrument_id: instrument_id.to_string(),
                        multiplier: *multiplier,
                    });
                }
            }
            Self::Bond { coupon_rate, .. } => {
                if let Some(rate) = coupon_rate {
                    if !rate.is_finite() {
                        return Err(InstrumentError::NonFiniteField {
                            instrument_id: instrument_id.to_string(),
                            field: "coupon_rate",
                        });
                    }
                }
            }
            Self::Equity { .. } | Self::Index { .. } | Self::Cash {} => {}
        }
        Ok(())
    }

    /// Tradable instruments must bind to a market-data series.
    pub fn requires_market_data(&self) -> bool {
        match self {
            Self::Equity { .. } | Self::Future { .. } => true,
            Self::Index { is_tradable } => *is_tradable,
            Self::Cash {} | Self::Bond { .. } => false,
        }
    }
}
