//! Pricing errors, tagged per failure mode.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub enum PricingError {
    MissingPrice {
        asset_id: String,
        field: String,
        as_of: NaiveDate,
        instrument_id: Option<String>,
    },
    MissingFxRate {
        asset_id: String,
        field: String,
        as_of: NaiveDate,
        instrument_id: Option<String>,
    },
    InvalidFxRate {
        asset_id: String,
        field: String,
        as_of: NaiveDate,
        rate: f64,
        instrument_id: Option<String>,
    },
    UnsupportedCurrency {
        currency: String,
        base_currency: String,
        as_of: NaiveDate,
        instrument_id: Option<String>,
    },
    NonFiniteInput {
        field: String,
        value: f64,
        as_of: NaiveDate,
        instrument_id: Option<String>,
    },
    MissingPricer {
        instrument_kind: String,
    },
    MissingInstrument {
        instrument_id: String,
    },
    MissingBinding {
        instrument_id: String,
        field: &'static str,
    },
}

impl std::fmt::Display for PricingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingPrice {
                asset_id,
                field,
                as_of,
                instrument_id,
            } => write!(
                f,
                "missing price for {asset_id}/{field} as of {as_of} (instrument {instrument_id:?})"
            ),
            Self::MissingFxRate {
                asset_id,
                field,
                as_of,
                instrument_id,
            } => write!(
                f,
                "missing FX rate {asset_id}/{field} as of {as_of} (instrument {instrument_id:?})"
            ),
            Self::InvalidFxRate {
                asset_id,
                as_of,
                rate,
                ..
            } => write!(f, "invalid FX rate {rate} for {asset_id} as of {as_of}"),
            Self::UnsupportedCurrency {
                currency,
                base_currency,
                ..
            } => write!(
                f,
                "unsupported currency pair {currency}->{base_currency} under the EUR/USD policy"
            ),
            Self::NonFiniteInput {
                field,
                value,
                as_of,
                instrument_id,
            } => write!(
                f,
                "non-finite {field} = {value} as of {as_of} (instrument {instrument_id:?})"
            ),
            Self::MissingPricer { instrument_kind } => {
                write!(f, "no pricer registered for instrument kind '{instrument_kind}'")
            }
            Self::MissingInstrument { instrument_id } => {
                write!(f, "missing instrument for instrument_id={instrument_id}")
            }
            Self::MissingBinding {
                instrument_id,
                field,
            } => write!(f, "{instrument_id}: {field} is required for pricing"),
        }
    }
}

impl std::error::Error for PricingError {}
