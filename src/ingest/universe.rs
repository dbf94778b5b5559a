//! Seed universe: the instrument master the ingestion layer resolves
//! provider rows against.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::canonical::{content_hash, to_canonical_value};
use crate::core::identity::{Currency, InstrumentId};
use crate::ingest::errors::IngestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UniverseInstrumentType {
    Equity,
    FxSpot,
}

/// One instrument-master row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniverseRecord {
    pub instrument_id: InstrumentId,
    pub instrument_type: UniverseInstrumentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone_local: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_ccy: Option<Currency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_ccy: Option<Currency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pair_code: Option<String>,
}

impl UniverseRecord {
    pub fn equity(
        instrument_id: InstrumentId,
        mic: impl Into<String>,
        vendor_symbol: impl Into<String>,
        currency: Currency,
        timezone_local: impl Into<String>,
    ) -> Self {
        Self {
            instrument_id,
            instrument_type: UniverseInstrumentType::Equity,
            vendor_symbol: Some(vendor_symbol.into()),
            mic: Some(mic.into().to_ascii_uppercase()),
            currency: Some(currency),
            timezone_local: Some(timezone_local.into()),
            base_ccy: None,
            quote_ccy: None,
            pair_code: None,
        }
    }

    pub fn fx_spot(instrument_id: InstrumentId, base_ccy: Currency, quote_ccy: Currency) -> Self {
        let pair_code = format!("{base_ccy}{quote_ccy}");
        Self {
            instrument_id,
            instrument_type: UniverseInstrumentType::FxSpot,
            vendor_symbol: None,
            mic: None,
            currency: None,
            timezone_local: None,
            base_ccy: Some(base_ccy),
            quote_ccy: Some(quote_ccy),
            pair_code: Some(pair_code),
        }
    }
}

/// Versioned, hashed instrument master snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniverseSnapshot {
    pub version: String,
    pub instruments: Vec<UniverseRecord>,
    pub universe_hash: String,
}

impl UniverseSnapshot {
    pub fn new(
        version: impl Into<String>,
        mut instruments: Vec<UniverseRecord>,
    ) -> Result<Self, IngestError> {
        let version = version.into();
        if version.is_empty() || instruments.is_empty() {
            return Err(IngestError::Normalization {
                detail: "universe version and instruments must be non-empty".to_string(),
            });
        }
        instruments.sort_by(|a, b| a.instrument_id.cmp(&b.instrument_id));
        for pair in instruments.windows(2) {
            if pair[0].instrument_id == pair[1].instrument_id {
                return Err(IngestError::Normalization {
                    detail: format!(
                        "duplicate universe instrument_id '{}'",
                        pair[0].instrument_id
                    ),
                });
            }
        }
        let payload = serde_json::json!({"version": version, "instruments": instruments});
        let universe_hash = content_hash(&to_canonical_value(&payload)?);
        Ok(Self {
            version,
            instruments,
            universe_hash,
        })
    }

    /// Equities keyed by `(mic, vendor_symbol)`.
    pub fn equity_lookup(&self) -> BTreeMap<(String, String), &UniverseRecord> {
        self.instruments
            .iter()
            .filter(|record| record.instrument_type == UniverseInstrumentType::Equity)
            .filter_map(|record| {
                Some((
                    (record.mic.clone()?, record.vendor_symbol.clone()?),
                    record,
                ))
            })
            .collect()
    }

    /// FX spots keyed by `(base_ccy, quote_ccy)`.
    pub fn fx_lookup(&self) -> BTreeMap<(String, String), &UniverseRecord> {
        self.instruments
            .iter()
            .filter(|record| record.instrument_type == UniverseInstrumentType::FxSpot)
            .filter_map(|record| {
                Some((
                    (
                        record.base_ccy.as_ref()?.as_str().to_string(),
                        record.quote_ccy.as_ref()?.as_str().to_string(),
                    ),
                    record,
                ))
            })
            .collect()
    }
}

/// Small seed universe used by fixtures and tests.
pub fn seed_universe() -> Result<UniverseSnapshot, IngestError> {
    let usd = Currency::new("USD").map_err(IngestError::Schema)?;
    let eur = Currency::new("EUR").map_err(IngestError::Schema)?;
    let records = vec![
        UniverseRecord::equity(
            InstrumentId::new("EQ.AAPL").map_err(IngestError::Schema)?,
            "XNYS",
            "AAPL",
            usd.clone(),
            "America/New_York",
        ),
        UniverseRecord::equity(
            InstrumentId::new("EQ.SPY").map_err(IngestError::Schema)?,
            "XNYS",
            "SPY",
            usd.clone(),
            "America/New_York",
        ),
        UniverseRecord::equity(
            InstrumentId::new("EQ.SAP").map_err(IngestError::Schema)?,
            "XETR",
            "SAP",
            eur.clone(),
            "Europe/Berlin",
        ),
        UniverseRecord::fx_spot(
            InstrumentId::new("FX.EURUSD").map_err(IngestError::Schema)?,
            eur,
            usd,
        ),
    ];
    UniverseSnapshot::new("2026.1", records)
}
