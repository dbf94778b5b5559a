//! Canonical record schema for the data layer.
//!
//! `BarRecord` (equity EOD bars) and `PointRecord` (FX daily fixings) share
//! a common metadata block. Constructors enforce every invariant at the
//! boundary; once built, records are immutable values.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::core::errors::SchemaError;
use crate::core::identity::{Currency, InstrumentId};
use crate::core::quality::QualityFlag;

/// Provenance of a canonical record's `ts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TsProvenance {
    ExchangeClose,
    FixingTime,
    ProviderEod,
    Unknown,
}

/// Basis of a provider-supplied adjusted close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdjustmentBasis {
    SplitOnly,
    SplitAndDividend,
    ProviderDefined,
}

/// Upstream source of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub provider: String,
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_dataset: Option<String>,
}

impl Source {
    pub fn new(
        provider: impl Into<String>,
        endpoint: impl Into<String>,
        provider_dataset: Option<String>,
    ) -> Result<Self, SchemaError> {
        let provider = provider.into();
        let endpoint = endpoint.into();
        if provider.is_empty() {
            return Err(SchemaError::EmptyField { field: "provider" });
        }
        if endpoint.is_empty() {
            return Err(SchemaError::EmptyField { field: "endpoint" });
        }
        if matches!(provider_dataset.as_deref(), Some("")) {
            return Err(SchemaError::EmptyField {
                field: "provider_dataset",
            });
        }
        Ok(Self {
            provider,
            endpoint,
            provider_dataset,
        })
    }
}

/// Metadata common to every canonical record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMeta {
    pub dataset_id: String,
    pub schema_version: String,
    pub dataset_version: String,
    pub instrument_id: InstrumentId,
    pub ts: DateTime<Utc>,
    pub asof_ts: DateTime<Utc>,
    pub ts_provenance: TsProvenance,
    pub source: Source,
    pub ingest_run_id: String,
    pub quality_flags: BTreeSet<QualityFlag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trading_date_local: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone_local: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl RecordMeta {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        dataset_id: impl Into<String>,
        schema_version: impl Into<String>,
        dataset_version: impl Into<String>,
        instrument_id: InstrumentId,
        ts: DateTime<Utc>,
        asof_ts: DateTime<Utc>,
        ts_provenance: TsProvenance,
        source: Source,
        ingest_run_id: impl Into<String>,
    ) -> Result<Self, SchemaError> {
        let dataset_id = dataset_id.into();
        let schema_version = schema_version.into();
        let dataset_version = dataset_version.into();
        let ingest_run_id = ingest_run_id.into();
        for (field, value) in [
            ("dataset_id", &dataset_id),
            ("schema_version", &schema_version),
            ("dataset_version", &dataset_version),
            ("ingest_run_id", &ingest_run_id),
        ] {
            if value.is_empty() {
                return Err(SchemaError::EmptyField { field });
            }
        }
        // A record cannot be known before the business date it describes.
        if asof_ts.date_naive() < ts.date_naive() {
            return Err(SchemaError::AsofBeforeSource {
                asof_ts: asof_ts.to_rfc3339(),
                ts: ts.to_rfc3339(),
            });
        }
        Ok(Self {
            dataset_id,
            schema_version,
            dataset_version,
            instrument_id,
            ts,
            asof_ts,
            ts_provenance,
            source,
            ingest_run_id,
            quality_flags: BTreeSet::new(),
            trading_date_local: None,
            timezone_local: None,
            currency: None,
            unit: None,
        })
    }

    pub fn with_flags<I: IntoIterator<Item = QualityFlag>>(mut self, flags: I) -> Self {
        self.quality_flags.extend(flags);
        self
    }

    pub fn with_trading_date(mut self, trading_date_local: NaiveDate) -> Self {
        self.trading_date_local = Some(trading_date_local);
        self
    }

    pub fn with_timezone(mut self, timezone_local: impl Into<String>) -> Self {
        self.timezone_local = Some(timezone_local.into());
        self
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }
}

fn require_positive(field: &'static str, value: f64) -> Result<(), SchemaError> {
    if !value.is_finite() {
        return Err(SchemaError::NonFiniteValue { field, value });
    }
    if value <= 0.0 {
        return Err(SchemaError::NonPositiveValue { field, value });
    }
    Ok(())
}

/// An OHLCV bar. Optional legs missing from the provider stay `None`;
/// present legs must satisfy the range invariants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub close: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adj_close: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjustment_basis: Option<AdjustmentBasis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjustment_note: Option<String>,
}

impl Bar {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        close: f64,
        open: Option<f64>,
        high: Option<f64>,
        low: Option<f64>,
        volume: Option<f64>,
        adj_close: Option<f64>,
        adjustment_basis: Option<AdjustmentBasis>,
        adjustment_note: Option<String>,
    ) -> Result<Self, SchemaError> {
        require_positive("close", close)?;
        for (field, value) in [
            ("open", open),
            ("high", high),
            ("low", low),
            ("adj_close", adj_close),
        ] {
            if let Some(value) = value {
                require_positive(field, value)?;
            }
        }
        if let Some(volume) = volume {
            if !volume.is_finite() {
                return Err(SchemaError::NonFiniteValue {
                    field: "volume",
                    value: volume,
                });
            }
            if volume < 0.0 {
                return Err(SchemaError::NegativeValue {
                    field: "volume",
                    value: volume,
                });
            }
        }
        let mut refs = vec![close];
        if let Some(open) = open {
            refs.push(open);
        }
        let max_ref = refs.iter().cloned().fold(f64::MIN, f64::max);
        let min_ref = refs.iter().cloned().fold(f64::MAX, f64::min);
        if let Some(high) = high {
            if high < max_ref {
                return Err(SchemaError::BarRangeViolation {
                    detail: format!("high {high} < max(open, close) {max_ref}"),
                });
            }
        }
        if let Some(low) = low {
            if low > min_ref {
                return Err(SchemaError::BarRangeViolation {
                    detail: format!("low {low} > min(open, close) {min_ref}"),
                });
            }
        }
        if let (Some(high), Some(low)) = (high, low) {
            if high < low {
                return Err(SchemaError::BarRangeViolation {
                    detail: format!("high {high} < low {low}"),
                });
            }
        }
        if matches!(adjustment_note.as_deref(), Some("")) {
            return Err(SchemaError::EmptyField {
                field: "adjustment_note",
            });
        }
        Ok(Self {
            close,
            open,
            high,
            low,
            volume,
            adj_close,
            adjustment_basis,
            adjustment_note,
        })
    }

    pub fn close_only(close: f64) -> Result<Self, SchemaError> {
        Self::new(close, None, None, None, None, None, None, None)
    }

    pub fn has_adjustment(&self) -> bool {
        self.adj_close.is_some() || self.adjustment_basis.is_some()
    }
}

/// Canonical equity end-of-day bar record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarRecord {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub bar: Bar,
}

impl BarRecord {
    pub fn new(meta: RecordMeta, bar: Bar) -> Self {
        Self { meta, bar }
    }
}

/// Canonical single-value observation (FX fixings).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointRecord {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub field: String,
    pub value: f64,
    pub base_ccy: Currency,
    pub quote_ccy: Currency,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixing_convention: Option<String>,
}

impl PointRecord {
    pub fn new(
        meta: RecordMeta,
        field: impl Into<String>,
        value: f64,
        base_ccy: Currency,
        quote_ccy: Currency,
        fixing_convention: Option<String>,
    ) -> Result<Self, SchemaError> {
        let field = field.into();
        if field.is_empty() {
            return Err(SchemaError::EmptyField { field: "field" });
        }
        require_positive("value", value)?;
        if matches!(fixing_convention.as_deref(), Some("")) {
            return Err(SchemaError::EmptyField {
                field: "fixing_convention",
            });
        }
        Ok(Self {
            meta,
            field,
            value,
            base_ccy,
            quote_ccy,
            fixing_convention,
        })
    }
}

/// Either canonical record kind, as staged into a snapshot part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CanonicalRecord {
    Bar(BarRecord),
    Point(PointRecord),
}

impl CanonicalRecord {
    pub fn meta(&self) -> &RecordMeta {
        match self {
            Self::Bar(record) => &record.meta,
            Self::Point(record) => &record.meta,
        }
    }

    pub fn meta_mut(&mut self) -> &mut RecordMeta {
        match self {
            Self::Bar(record) => &mut record.meta,
            Self::Point(record) => &mut record.meta,
        }
    }
}
