//! Provider adapter boundary for ingestion.
//!
//! Adapters return raw payload bytes exactly as fetched, stamped with the
//! request fingerprint and fetch time. They never mutate payloads, apply
//! FX, or perform calendar logic. The MVP adapter reads local CSV/JSON
//! fixtures; HTTP adapters conform to the same contract.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::json;

use crate::core::canonical::{content_hash, sorted_string_array};
use crate::core::identity::InstrumentId;
use crate::core::records::Source;
use crate::ingest::errors::IngestError;

/// A single provider fetch, identified by its deterministic fingerprint.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub dataset_id: String,
    pub instrument_ids: Vec<InstrumentId>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub fields: Vec<String>,
    pub granularity: String,
    pub vendor_overrides: Option<BTreeMap<String, String>>,
}

impl FetchRequest {
    pub fn new(
        dataset_id: impl Into<String>,
        instrument_ids: Vec<InstrumentId>,
        start: NaiveDate,
        end: NaiveDate,
        fields: Vec<String>,
    ) -> Result<Self, IngestError> {
        let dataset_id = dataset_id.into();
        if dataset_id.is_empty() {
            return Err(IngestError::Normalization {
                detail: "dataset_id must be non-empty".to_string(),
            });
        }
        if instrument_ids.is_empty() {
            return Err(IngestError::Normalization {
                detail: "instrument_ids must be non-empty".to_string(),
            });
        }
        if start > end {
            return Err(IngestError::Normalization {
                detail: format!("start {start} must be on or before end {end}"),
            });
        }
        Ok(Self {
            dataset_id,
            instrument_ids,
            start,
            end,
            fields,
            granularity: "1D".to_string(),
            vendor_overrides: None,
        })
    }

    /// Deterministic fingerprint: order-invariant over instruments/fields.
    pub fn fingerprint(&self) -> String {
        let payload = json!({
            "dataset_id": self.dataset_id,
            "instrument_ids": sorted_string_array(
                self.instrument_ids.iter().map(|id| id.as_str().to_string())
            ),
            "start": self.start.to_string(),
            "end": self.end.to_string(),
            "fields": sorted_string_array(self.fields.iter().cloned()),
            "granularity": self.granularity,
            "vendor_overrides": self.vendor_overrides,
        });
        content_hash(&payload)
    }
}

/// Raw bytes as returned by the provider, plus transport metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub payload: Vec<u8>,
    pub payload_format: String,
    pub source: Source,
    pub fetched_at_ts: DateTime<Utc>,
    pub request_fingerprint: String,
    pub status_code: Option<u16>,
    pub retries: u32,
    pub provider_revision: Option<String>,
}

/// The ingestion-side provider contract.
pub trait ProviderAdapter {
    fn name(&self) -> &str;

    fn fetch(&self, request: &FetchRequest) -> Result<RawResponse, IngestError>;
}

/// Fixture adapter: serves `<root>/<dataset_id>.json` or `.csv` verbatim.
pub struct FixtureAdapter {
    root: PathBuf,
    provider_name: String,
    clock: fn() -> DateTime<Utc>,
}

impl FixtureAdapter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            provider_name: "fixture".to_string(),
            clock: Utc::now,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }
}

impl ProviderAdapter for FixtureAdapter {
    fn name(&self) -> &str {
        &self.provider_name
    }

    fn fetch(&self, request: &FetchRequest) -> Result<RawResponse, IngestError> {
        let mut path = self.root.join(format!("{}.json", request.dataset_id));
        let mut payload_format = "json";
        if !path.exists() {
            path = self.root.join(format!("{}.csv", request.dataset_id));
            payload_format = "csv";
        }
        let payload = std::fs::read(&path).map_err(|err| IngestError::ProviderFetch {
            detail: format!("fixture {} unreadable: {err}", path.display()),
        })?;
        let endpoint = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| request.dataset_id.clone());
        Ok(RawResponse {
            payload,
            payload_format: payload_format.to_string(),
            source: Source::new(self.provider_name.clone(), endpoint, None)?,
            fetched_at_ts: (self.clock)(),
            request_fingerprint: request.fingerprint(),
            status_code: None,
            retries: 0,
            provider_revision: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, day).unwrap()
    }

    #[test]
    fn fingerprint_ignores_instrument_order() {
        let first = FetchRequest::new(
            "md.equity.eod.bars",
            vec![
                InstrumentId::new("EQ.AAPL").unwrap(),
                InstrumentId::new("EQ.SPY").unwrap(),
            ],
            d(2),
            d(6),
            vec!["close".to_string()],
        )
        .unwrap();
        let second = FetchRequest::new(
            "md.equity.eod.bars",
            vec![
                InstrumentId::new("EQ.SPY").unwrap(),
                InstrumentId::new("EQ.AAPL").unwrap(),
            ],
            d(2),
            d(6),
            vec!["close".to_string()],
        )
        .unwrap();
        assert_eq!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn fixture_adapter_serves_payload_bytes_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let body = br#"{"records": []}"#;
        std::fs::write(dir.path().join("md.equity.eod.bars.json"), body).unwrap();
        let adapter = FixtureAdapter::new(dir.path());
        let request = FetchRequest::new(
            "md.equity.eod.bars",
            vec![InstrumentId::new("EQ.AAPL").unwrap()],
            d(2),
            d(6),
            vec!["close".to_string()],
        )
        .unwrap();
        let response = adapter.fetch(&request).unwrap();
        assert_eq!(response.payload, body);
        assert_eq!(response.payload_format, "json");
        assert_eq!(response.request_fingerprint, request.fingerprint());
        assert_eq!(response.source.provider, "fixture");
    }

    #[test]
    fn missing_fixture_is_a_provider_error() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = FixtureAdapter::new(dir.path());
        let request = FetchRequest::new(
            "md.fx.spot.daily",
            vec![InstrumentId::new("FX.EURUSD").unwrap()],
            d(2),
            d(6),
            vec!["close".to_string()],
        )
        .unwrap();
        assert!(matches!(
            adapter.fetch(&request),
            Err(IngestError::ProviderFetch { .. })
        ));
    }
}
