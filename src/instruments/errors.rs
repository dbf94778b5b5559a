//! Instrument and portfolio construction errors.

#[derive(Debug, Clone, PartialEq)]
pub enum InstrumentError {
    TypeSpecMismatch {
        instrument_id: String,
        instrument_type: String,
        spec_kind: String,
    },
    MissingMarketDataBinding {
        instrument_id: String,
    },
    ForbiddenMarketDataBinding {
        instrument_id: String,
        market_data_id: String,
    },
    MissingCurrency {
        instrument_id: String,
        instrument_type: String,
    },
    InvalidMultiplier {
        instrument_id: String,
        multiplier: f64,
    },
    NonFiniteField {
        instrument_id: String,
        field: &'static str,
    },
    InvalidQuantity {
        instrument_id: String,
        quantity: f64,
        reason: &'static str,
    },
    DuplicatePosition {
        instrument_id: String,
    },
    DuplicateCashCurrency {
        currency: String,
    },
    NonFiniteCash {
        currency: String,
        amount: f64,
    },
    Schema(crate::core::errors::SchemaError),
}

impl std::fmt::Display for InstrumentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TypeSpecMismatch {
                instrument_id,
                instrument_type,
                spec_kind,
            } => write!(
                f,
                "{instrument_id}: instrument_type '{instrument_type}' does not match spec kind '{spec_kind}'"
            ),
            Self::MissingMarketDataBinding { instrument_id } => {
                write!(f, "{instrument_id}: market_data_id is required for tradable instruments")
            }
            Self::ForbiddenMarketDataBinding {
                instrument_id,
                market_data_id,
            } => write!(
                f,
                "{instrument_id}: market_data_id '{market_data_id}' is not permitted for this kind"
            ),
            Self::MissingCurrency {
                instrument_id,
                instrument_type,
            } => write!(f, "{instrument_id}: {instrument_type} instruments require a currency"),
            Self::InvalidMultiplier {
                instrument_id,
                multiplier,
            } => write!(f, "{instrument_id}: multiplier must be finite and > 0, got {multiplier}"),
            Self::NonFiniteField {
                instrument_id,
                field,
            } => write!(f, "{instrument_id}: {field} must be finite"),
            Self::InvalidQuantity {
                instrument_id,
                quantity,
                reason,
            } => write!(f, "{instrument_id}: quantity {quantity} invalid: {reason}"),
            Self::DuplicatePosition { instrument_id } => {
                write!(f, "duplicate position for instrument '{instrument_id}'")
            }
            Self::DuplicateCashCurrency { currency } => {
                write!(f, "duplicate cash currency '{currency}'")
            }
            Self::NonFiniteCash { currency, amount } => {
                write!(f, "cash[{currency}] must be finite, got {amount}")
            }
            Self::Schema(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for InstrumentError {}

impl From<crate::core::errors::SchemaError> for InstrumentError {
    fn from(err: crate::core::errors::SchemaError) -> Self {
        Self::Schema(err)
    }
}
