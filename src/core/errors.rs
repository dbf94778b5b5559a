//! Schema-level errors shared by the canonical data contracts.

/// Validation failure raised while constructing a canonical value.
///
/// Every variant names the offending field so callers can surface
/// actionable context without string parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaError {
    EmptyField { field: &'static str },
    InvalidInstrumentId { value: String, reason: &'static str },
    InvalidCurrency { value: String },
    NonFiniteValue { field: &'static str, value: f64 },
    NegativeValue { field: &'static str, value: f64 },
    NonPositiveValue { field: &'static str, value: f64 },
    NaiveTimestamp { field: &'static str },
    BarRangeViolation { detail: String },
    AsofBeforeSource { asof_ts: String, ts: String },
    InvalidEnumValue { field: &'static str, value: String },
    Serialization { detail: String },
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyField { field } => write!(f, "{field} must be non-empty"),
            Self::InvalidInstrumentId { value, reason } => {
                write!(f, "invalid instrument id '{value}': {reason}")
            }
            Self::InvalidCurrency { value } => {
                write!(f, "currency must be three uppercase letters: '{value}'")
            }
            Self::NonFiniteValue { field, value } => {
                write!(f, "{field} must be finite, got {value}")
            }
            Self::NegativeValue { field, value } => {
                write!(f, "{field} must be >= 0, got {value}")
            }
            Self::NonPositiveValue { field, value } => {
                write!(f, "{field} must be > 0, got {value}")
            }
            Self::NaiveTimestamp { field } => {
                write!(f, "{field} must carry an explicit UTC offset")
            }
            Self::BarRangeViolation { detail } => write!(f, "bar range violation: {detail}"),
            Self::AsofBeforeSource { asof_ts, ts } => {
                write!(f, "asof_ts {asof_ts} precedes source ts {ts}")
            }
            Self::InvalidEnumValue { field, value } => {
                write!(f, "invalid {field} value '{value}'")
            }
            Self::Serialization { detail } => write!(f, "serialization failed: {detail}"),
        }
    }
}

impl std::error::Error for SchemaError {}
