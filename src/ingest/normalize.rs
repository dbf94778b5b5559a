//! Pure, deterministic payload normalizers.
//!
//! Raw provider payloads (JSON or CSV) become canonical record streams.
//! Instruments are resolved against the seed universe; `ts` is derived
//! through the session-rules hierarchy; unknown instruments and malformed
//! rows fail fast with the offending context.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use crate::calendar::baseline::CalendarBaseline;
use crate::calendar::derive::derive_close_ts;
use crate::calendar::session_rules::SessionRulesSnapshot;
use crate::core::identity::Currency;
use crate::core::quality::QualityFlag;
use crate::core::records::{
    AdjustmentBasis, Bar, BarRecord, PointRecord, RecordMeta, Source, TsProvenance,
};
use crate::ingest::errors::IngestError;
use crate::ingest::universe::UniverseSnapshot;

pub const EQUITY_EOD_DATASET_ID: &str = "md.equity.eod.bars";
pub const FX_DAILY_DATASET_ID: &str = "md.fx.spot.daily";
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Immutable inputs shared by every record of one normalization pass.
#[derive(Debug, Clone)]
pub struct NormalizationContext {
    pub dataset_id: String,
    pub schema_version: String,
    pub dataset_version: String,
    pub asof_ts: DateTime<Utc>,
    pub ingest_run_id: String,
    pub source: Source,
}

/// Calendar inputs for `ts` derivation.
pub struct TimeContext<'a> {
    pub session_rules: &'a SessionRulesSnapshot,
    pub baseline: &'a CalendarBaseline,
}

fn normalization_error(detail: impl Into<String>) -> IngestError {
    IngestError::Normalization {
        detail: detail.into(),
    }
}

/// Parse a JSON (`{"records": [...]}`) or CSV payload into row maps.
pub fn parse_payload_rows(
    payload: &[u8],
    payload_format: &str,
) -> Result<Vec<BTreeMap<String, Value>>, IngestError> {
    match payload_format {
        "json" => {
            let parsed: Value = serde_json::from_slice(payload)
                .map_err(|err| normalization_error(format!("payload is not valid JSON: {err}")))?;
            let records = parsed
                .get("records")
                .and_then(Value::as_array)
                .ok_or_else(|| normalization_error("payload must contain a 'records' array"))?;
            records
                .iter()
                .enumerate()
                .map(|(index, record)| {
                    record
                        .as_object()
                        .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                        .ok_or_else(|| {
                            normalization_error(format!("record {index} must be an object"))
                        })
                })
                .collect()
        }
        "csv" => {
            let mut reader = csv::ReaderBuilder::new()
                .has_headers(true)
                .from_reader(payload);
            let headers = reader
                .headers()
                .map_err(|err| normalization_error(format!("csv header unreadable: {err}")))?
                .clone();
            let mut rows = Vec::new();
            for (index, record) in reader.records().enumerate() {
                let record = record.map_err(|err| {
                    normalization_error(format!("csv row {index} unreadable: {err}"))
                })?;
                let mut row = BTreeMap::new();
                for (header, cell) in headers.iter().zip(record.iter()) {
                    if !cell.is_empty() {
                        row.insert(header.to_string(), Value::String(cell.to_string()));
                    }
                }
                rows.push(row);
            }
            Ok(rows)
        }
        other => Err(normalization_error(format!(
            "unsupported payload format '{other}'"
        ))),
    }
}

fn get_str<'a>(
    row: &'a BTreeMap<String, Value>,
    field: &str,
) -> Result<&'a str, IngestError> {
    row.get(field)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| normalization_error(format!("{field} must be a non-empty string")))
}

fn opt_str(row: &BTreeMap<String, Value>, field: &str) -> Option<String> {
    row.get(field)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn parse_f64(value: &Value, field: &str) -> Result<f64, IngestError> {
    match value {
        Value::Number(number) => number
            .as_f64()
            .ok_or_else(|| normalization_error(format!("{field} is not representable"))),
        Value::String(text) => text
            .parse::<f64>()
            .map_err(|_| normalization_error(format!("{field} is not numeric: '{text}'"))),
        _ => Err(normalization_error(format!("{field} must be numeric"))),
    }
}

fn get_f64(row: &BTreeMap<String, Value>, field: &str) -> Result<f64, IngestError> {
    let value = row
        .get(field)
        .ok_or_else(|| normalization_error(format!("{field} is required")))?;
    parse_f64(value, field)
}

fn opt_f64(row: &BTreeMap<String, Value>, field: &str) -> Result<Option<f64>, IngestError> {
    match row.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => parse_f64(value, field).map(Some),
    }
}

fn parse_date(raw: &str, field: &str) -> Result<NaiveDate, IngestError> {
    raw.parse::<NaiveDate>()
        .map_err(|_| normalization_error(format!("{field} must be YYYY-MM-DD, got '{raw}'")))
}

fn opt_utc_ts(
    row: &BTreeMap<String, Value>,
    field: &str,
) -> Result<Option<DateTime<Utc>>, IngestError> {
    match opt_str(row, field) {
        None => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(&raw)
            .map(|ts| Some(ts.with_timezone(&Utc)))
            .map_err(|_| {
                normalization_error(format!("{field} must be RFC3339 with offset, got '{raw}'"))
            }),
    }
}

fn parse_adjustment_basis(
    row: &BTreeMap<String, Value>,
) -> Result<Option<AdjustmentBasis>, IngestError> {
    match opt_str(row, "adjustment_basis").as_deref() {
        None => Ok(None),
        Some("SPLIT_ONLY") => Ok(Some(AdjustmentBasis::SplitOnly)),
        Some("SPLIT_AND_DIVIDEND") => Ok(Some(AdjustmentBasis::SplitAndDividend)),
        Some("PROVIDER_DEFINED") => Ok(Some(AdjustmentBasis::ProviderDefined)),
        Some(other) => Err(normalization_error(format!(
            "adjustment_basis is invalid: '{other}'"
        ))),
    }
}

/// Normalize an equity EOD payload into bar records.
pub fn normalize_equity_eod(
    payload: &[u8],
    payload_format: &str,
    context: &NormalizationContext,
    universe: &UniverseSnapshot,
    time: &TimeContext<'_>,
) -> Result<Vec<BarRecord>, IngestError> {
    if context.dataset_id != EQUITY_EOD_DATASET_ID {
        return Err(normalization_error(format!(
            "dataset_id mismatch for equity normalizer: {}",
            context.dataset_id
        )));
    }
    let lookup = universe.equity_lookup();
    let rows = parse_payload_rows(payload, payload_format)?;
    let mut records = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        let mic = get_str(row, "mic")?.trim().to_ascii_uppercase();
        let vendor_symbol = get_str(row, "vendor_symbol")?.trim().to_string();
        let instrument = lookup.get(&(mic.clone(), vendor_symbol.clone())).ok_or_else(|| {
            normalization_error(format!(
                "equity instrument not found for mic={mic} vendor_symbol={vendor_symbol} (row {index})"
            ))
        })?;
        let trading_date_raw = opt_str(row, "trading_date")
            .or_else(|| opt_str(row, "trading_date_local"))
            .ok_or_else(|| normalization_error(format!("trading_date is required (row {index})")))?;
        let trading_date = parse_date(&trading_date_raw, "trading_date")?;
        let provider_ts = opt_utc_ts(row, "ts")?;
        let derived =
            derive_close_ts(&mic, trading_date, time.session_rules, time.baseline, provider_ts)?;

        let bar = Bar::new(
            get_f64(row, "close")?,
            opt_f64(row, "open")?,
            opt_f64(row, "high")?,
            opt_f64(row, "low")?,
            opt_f64(row, "volume")?,
            opt_f64(row, "adj_close")?,
            parse_adjustment_basis(row)?,
            opt_str(row, "adjustment_note"),
        )?;
        let mut flags = derived.flags.clone();
        if bar.has_adjustment() {
            flags.push(QualityFlag::AdjustedPricePresent);
        }
        let mut meta = RecordMeta::new(
            context.dataset_id.clone(),
            context.schema_version.clone(),
            context.dataset_version.clone(),
            instrument.instrument_id.clone(),
            derived.ts,
            context.asof_ts,
            derived.provenance,
            context.source.clone(),
            context.ingest_run_id.clone(),
        )?
        .with_flags(flags)
        .with_trading_date(trading_date);
        if let Some(ref timezone) = instrument.timezone_local {
            meta = meta.with_timezone(timezone.clone());
        }
        if let Some(ref currency) = instrument.currency {
            meta = meta.with_currency(currency.clone());
        }
        records.push(BarRecord::new(meta, bar));
    }
    Ok(records)
}

/// Normalize an FX daily payload into point records.
pub fn normalize_fx_daily(
    payload: &[u8],
    payload_format: &str,
    context: &NormalizationContext,
    universe: &UniverseSnapshot,
) -> Result<Vec<PointRecord>, IngestError> {
    if context.dataset_id != FX_DAILY_DATASET_ID {
        return Err(normalization_error(format!(
            "dataset_id mismatch for fx normalizer: {}",
            context.dataset_id
        )));
    }
    let lookup = universe.fx_lookup();
    let rows = parse_payload_rows(payload, payload_format)?;
    let mut records = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        let base_ccy = Currency::parse_normalized(get_str(row, "base_ccy")?)?;
        let quote_ccy = Currency::parse_normalized(get_str(row, "quote_ccy")?)?;
        let instrument = lookup
            .get(&(
                base_ccy.as_str().to_string(),
                quote_ccy.as_str().to_string(),
            ))
            .ok_or_else(|| {
                normalization_error(format!(
                    "fx instrument not found for {base_ccy}/{quote_ccy} (row {index})"
                ))
            })?;
        let ts = opt_utc_ts(row, "ts")?
            .ok_or_else(|| normalization_error(format!("ts is required (row {index})")))?;
        let fixing_convention = opt_str(row, "fixing_convention");
        let (provenance, flags) = if fixing_convention.is_some() {
            (TsProvenance::FixingTime, Vec::new())
        } else {
            (
                TsProvenance::ProviderEod,
                vec![QualityFlag::ProviderTimestampUsed],
            )
        };
        let mut meta = RecordMeta::new(
            context.dataset_id.clone(),
            context.schema_version.clone(),
            context.dataset_version.clone(),
            instrument.instrument_id.clone(),
            ts,
            context.asof_ts,
            provenance,
            context.source.clone(),
            context.ingest_run_id.clone(),
        )?
        .with_flags(flags);
        if let Some(fixing_date) = opt_str(row, "fixing_date") {
            meta = meta.with_trading_date(parse_date(&fixing_date, "fixing_date")?);
        }
        records.push(PointRecord::new(
            meta,
            get_str(row, "field")?.trim().to_lowercase(),
            get_f64(row, "value")?,
            base_ccy,
            quote_ccy,
            fixing_convention,
        )?);
    }
    Ok(records)
}
