//! Identifier newtypes with constructor-side validation.

use serde::{Deserialize, Serialize};

use crate::core::errors::SchemaError;

/// Internal instrument identifier: 1..=64 chars, no whitespace.
///
/// Namespaces are conventional (`EQ.*`, `IDX.*`, `CASH.*`, `FUT.*`,
/// `BOND.*`) and not enforced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstrumentId(String);

impl InstrumentId {
    pub fn new(value: impl Into<String>) -> Result<Self, SchemaError> {
        let value = value.into();
        if value.is_empty() {
            return Err(SchemaError::InvalidInstrumentId {
                value,
                reason: "must be non-empty",
            });
        }
        if value.len() > 64 {
            return Err(SchemaError::InvalidInstrumentId {
                value,
                reason: "must be at most 64 characters",
            });
        }
        if value.chars().any(char::is_whitespace) {
            return Err(SchemaError::InvalidInstrumentId {
                value,
                reason: "must not contain whitespace",
            });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for InstrumentId {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<InstrumentId> for String {
    fn from(id: InstrumentId) -> Self {
        id.0
    }
}

impl std::fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque market-data identifier resolved by the access layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MarketDataId(String);

impl MarketDataId {
    pub fn new(value: impl Into<String>) -> Result<Self, SchemaError> {
        let value = value.into();
        if value.is_empty() {
            return Err(SchemaError::EmptyField {
                field: "market_data_id",
            });
        }
        if value.chars().any(char::is_whitespace) {
            return Err(SchemaError::InvalidInstrumentId {
                value,
                reason: "market_data_id must not contain whitespace",
            });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for MarketDataId {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MarketDataId> for String {
    fn from(id: MarketDataId) -> Self {
        id.0
    }
}

impl std::fmt::Display for MarketDataId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// ISO-4217 currency code: exactly three uppercase ASCII letters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    pub fn new(value: impl Into<String>) -> Result<Self, SchemaError> {
        let value = value.into();
        let valid = value.len() == 3 && value.chars().all(|ch| ch.is_ascii_uppercase());
        if !valid {
            return Err(SchemaError::InvalidCurrency { value });
        }
        Ok(Self(value))
    }

    /// Uppercase the input before validating, for caller convenience when
    /// normalizing cash maps.
    pub fn parse_normalized(value: &str) -> Result<Self, SchemaError> {
        Self::new(value.to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Currency {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Currency> for String {
    fn from(ccy: Currency) -> Self {
        ccy.0
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Deterministic ingestion run identifier: `ing_<YYYYMMDD>_<HHMMSS>Z_<seq>`.
pub fn generate_ingest_run_id(
    started_at: chrono::DateTime<chrono::Utc>,
    sequence: u32,
) -> Result<String, SchemaError> {
    if sequence == 0 {
        return Err(SchemaError::NonPositiveValue {
            field: "sequence",
            value: 0.0,
        });
    }
    Ok(format!(
        "ing_{}Z_{:04}",
        started_at.format("%Y%m%d_%H%M%S"),
        sequence
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn instrument_id_rejects_whitespace_and_length() {
        assert!(InstrumentId::new("EQ.AAPL").is_ok());
        assert!(InstrumentId::new("EQ AAPL").is_err());
        assert!(InstrumentId::new("").is_err());
        assert!(InstrumentId::new("x".repeat(65)).is_err());
    }

    #[test]
    fn currency_requires_three_uppercase_letters() {
        assert!(Currency::new("USD").is_ok());
        assert!(Currency::new("usd").is_err());
        assert!(Currency::new("USDX").is_err());
        assert_eq!(Currency::parse_normalized("eur").unwrap().as_str(), "EUR");
    }

    #[test]
    fn ingest_run_id_format_is_deterministic() {
        let ts = chrono::Utc.with_ymd_and_hms(2026, 1, 5, 21, 30, 0).unwrap();
        let id = generate_ingest_run_id(ts, 1).unwrap();
        assert_eq!(id, "ing_20260105_213000Z_0001");
    }

    #[test]
    fn serde_round_trip_validates() {
        let id: InstrumentId = serde_json::from_str("\"EQ.SPY\"").unwrap();
        assert_eq!(id.as_str(), "EQ.SPY");
        let bad: Result<Currency, _> = serde_json::from_str("\"us\"");
        assert!(bad.is_err());
    }
}
