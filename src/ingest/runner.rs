//! The ingestion runner: fetch → raw → normalize → validate → publish →
//! register, as one sequential pipeline per fetch request.

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::info;

use crate::calendar::baseline::CalendarBaseline;
use crate::calendar::session_rules::SessionRulesSnapshot;
use crate::core::cancel::CancelToken;
use crate::core::canonical::{content_hash, sorted_string_array, to_canonical_value};
use crate::core::quality::ValidationReport;
use crate::core::records::CanonicalRecord;
use crate::ingest::errors::IngestError;
use crate::ingest::normalize::{
    normalize_equity_eod, normalize_fx_daily, NormalizationContext, TimeContext,
    EQUITY_EOD_DATASET_ID, FX_DAILY_DATASET_ID,
};
use crate::ingest::provider::{FetchRequest, ProviderAdapter, RawResponse};
use crate::ingest::universe::UniverseSnapshot;
use crate::ingest::validate::{ConflictScope, RecordValidator, ValidationContext};
use crate::store::canonical_zone::{
    publish_canonical_snapshot, serialize_canonical_records, stage_canonical_snapshot,
    PublishedSnapshot,
};
use crate::store::raw::{store_raw_payload, write_ingest_run_meta, IngestRunMeta, RawPaths};
use crate::store::registry::{DatasetRegistry, DatasetRegistryEntry};

/// Static configuration of one ingestion execution.
#[derive(Debug, Clone)]
pub struct IngestionConfig {
    pub dataset_id: String,
    pub dataset_version: String,
    pub ingest_run_id: String,
    pub raw_root: std::path::PathBuf,
    pub canonical_root: std::path::PathBuf,
    pub registry_path: std::path::PathBuf,
    pub calendar_version: String,
    pub schema_version: String,
    pub notes: Option<String>,
}

impl IngestionConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        for (field, value) in [
            ("dataset_id", &self.dataset_id),
            ("dataset_version", &self.dataset_version),
            ("ingest_run_id", &self.ingest_run_id),
            ("calendar_version", &self.calendar_version),
            ("schema_version", &self.schema_version),
        ] {
            if value.is_empty() {
                return Err(IngestError::Normalization {
                    detail: format!("{field} must be non-empty"),
                });
            }
        }
        Ok(())
    }
}

/// Everything one successful run produced.
#[derive(Debug)]
pub struct IngestionResult {
    pub raw_paths: RawPaths,
    pub published: PublishedSnapshot,
    pub registry_entry: DatasetRegistryEntry,
    pub validation_report: ValidationReport,
    pub ingest_run_meta: IngestRunMeta,
}

/// Sequential ingestion pipeline bound to a universe, session rules, and a
/// calendar baseline. Runners share no mutable state; several may execute
/// concurrently against distinct dataset versions.
pub struct IngestionRunner<'a> {
    pub config: IngestionConfig,
    pub universe: &'a UniverseSnapshot,
    pub session_rules: &'a SessionRulesSnapshot,
    pub baseline: &'a CalendarBaseline,
    pub clock: fn() -> DateTime<Utc>,
    pub cancel: Option<CancelToken>,
}

impl<'a> IngestionRunner<'a> {
    pub fn new(
        config: IngestionConfig,
        universe: &'a UniverseSnapshot,
        session_rules: &'a SessionRulesSnapshot,
        baseline: &'a CalendarBaseline,
    ) -> Result<Self, IngestError> {
        config.validate()?;
        Ok(Self {
            config,
            universe,
            session_rules,
            baseline,
            clock: Utc::now,
            cancel: None,
        })
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn check_cancelled(&self, stage: &'static str) -> Result<(), IngestError> {
        if matches!(self.cancel, Some(ref token) if token.is_cancelled()) {
            return Err(IngestError::Cancelled { stage });
        }
        Ok(())
    }

    pub fn run(
        &self,
        request: &FetchRequest,
        adapter: &dyn ProviderAdapter,
    ) -> Result<IngestionResult, IngestError> {
        if request.dataset_id != self.config.dataset_id {
            return Err(IngestError::Normalization {
                detail: format!(
                    "request dataset_id '{}' does not match config '{}'",
                    request.dataset_id, self.config.dataset_id
                ),
            });
        }
        let started_at_ts = (self.clock)();
        info!(
            dataset_id = self.config.dataset_id.as_str(),
            ingest_run_id = self.config.ingest_run_id.as_str(),
            "ingest.run_started"
        );

        self.check_cancelled("fetch")?;
        let response = adapter.fetch(request)?;
        let expected = request.fingerprint();
        if response.request_fingerprint != expected {
            return Err(IngestError::ResponseMismatch {
                expected,
                actual: response.request_fingerprint,
            });
        }
        let asof_ts = response.fetched_at_ts;

        self.check_cancelled("raw write")?;
        let raw_metadata = self.raw_metadata(request, &response, asof_ts)?;
        let raw_paths = store_raw_payload(
            &self.config.raw_root,
            &self.config.ingest_run_id,
            &response.request_fingerprint,
            &response.payload,
            &raw_metadata,
            &response.payload_format,
        )?;

        let normalization_context = NormalizationContext {
            dataset_id: self.config.dataset_id.clone(),
            schema_version: self.config.schema_version.clone(),
            dataset_version: self.config.dataset_version.clone(),
            asof_ts,
            ingest_run_id: self.config.ingest_run_id.clone(),
            source: response.source.clone(),
        };
        let records: Vec<CanonicalRecord> = match self.config.dataset_id.as_str() {
            EQUITY_EOD_DATASET_ID => normalize_equity_eod(
                &response.payload,
                &response.payload_format,
                &normalization_context,
                self.universe,
                &TimeContext {
                    session_rules: self.session_rules,
                    baseline: self.baseline,
                },
            )?
            .into_iter()
            .map(CanonicalRecord::Bar)
            .collect(),
            FX_DAILY_DATASET_ID => normalize_fx_daily(
                &response.payload,
                &response.payload_format,
                &normalization_context,
                self.universe,
            )?
            .into_iter()
            .map(CanonicalRecord::Point)
            .collect(),
            other => {
                return Err(IngestError::Normalization {
                    detail: format!("unsupported dataset_id: {other}"),
                })
            }
        };

        let generated_ts = (self.clock)();
        let validator = RecordValidator::new(ValidationContext {
            dataset_id: self.config.dataset_id.clone(),
            dataset_version: self.config.dataset_version.clone(),
            ingest_run_id: self.config.ingest_run_id.clone(),
        })
        .with_universe(self.universe)
        .with_conflict_scope(ConflictScope {
            baseline: self.baseline,
            start: request.start,
            end: request.end,
        });
        let (validated, validation_report) = validator.validate(records, generated_ts, true)?;

        // A cancellation seen after the raw write discards the staged
        // payload so no orphaned raw data outlives the aborted run.
        if let Err(err) = self.check_cancelled("publish") {
            let request_dir = crate::store::layout::raw_request_dir(
                &self.config.raw_root,
                &self.config.ingest_run_id,
                &response.request_fingerprint,
            );
            let _ = std::fs::remove_dir_all(&request_dir);
            return Err(err);
        }

        let parts = std::collections::BTreeMap::from([(
            "part-0001.jsonl".to_string(),
            serialize_canonical_records(&validated)?,
        )]);
        let created_at_ts = generated_ts;
        let source_set = vec![response.source.provider.clone()];
        let canonical_metadata = json!({
            "dataset_id": self.config.dataset_id,
            "dataset_version": self.config.dataset_version,
            "schema_version": self.config.schema_version,
            "ingest_run_id": self.config.ingest_run_id,
            "created_at_ts": created_at_ts.to_rfc3339(),
            "asof_ts": asof_ts.to_rfc3339(),
            "universe_hash": self.universe.universe_hash,
            "calendar_version": self.config.calendar_version,
            "sessionrules_version": self.session_rules.sessionrules_hash,
            "source_set": sorted_string_array(source_set.clone()),
            "row_count": validated.len(),
            "validation_report": to_canonical_value(&validation_report)?,
        });
        let staged = stage_canonical_snapshot(
            &self.config.canonical_root,
            &self.config.dataset_id,
            &self.config.dataset_version,
            &parts,
            &canonical_metadata,
            validated.len(),
        )?;
        let published = publish_canonical_snapshot(staged)?;

        let registry = DatasetRegistry::new(&self.config.registry_path, &self.config.canonical_root);
        let registry_entry = DatasetRegistryEntry {
            dataset_id: self.config.dataset_id.clone(),
            dataset_version: self.config.dataset_version.clone(),
            schema_version: self.config.schema_version.clone(),
            created_at_ts,
            ingest_run_id: self.config.ingest_run_id.clone(),
            universe_hash: self.universe.universe_hash.clone(),
            calendar_version: self.config.calendar_version.clone(),
            sessionrules_version: self.session_rules.sessionrules_hash.clone(),
            source_set,
            row_count: published.row_count,
            content_hash: published.content_hash.clone(),
            notes: self.config.notes.clone(),
        };
        registry.append(registry_entry.clone())?;

        let finished_at_ts = (self.clock)();
        let ingest_run_meta = IngestRunMeta {
            ingest_run_id: self.config.ingest_run_id.clone(),
            started_at_ts,
            finished_at_ts,
            config_fingerprint: self.config_fingerprint(),
        };
        write_ingest_run_meta(&self.config.raw_root, &ingest_run_meta)?;
        info!(
            dataset_id = self.config.dataset_id.as_str(),
            dataset_version = self.config.dataset_version.as_str(),
            row_count = published.row_count,
            content_hash = published.content_hash.as_str(),
            "ingest.run_finished"
        );

        Ok(IngestionResult {
            raw_paths,
            published,
            registry_entry,
            validation_report,
            ingest_run_meta,
        })
    }

    fn raw_metadata(
        &self,
        request: &FetchRequest,
        response: &RawResponse,
        asof_ts: DateTime<Utc>,
    ) -> Result<serde_json::Value, IngestError> {
        Ok(json!({
            "dataset_id": request.dataset_id,
            "dataset_version": self.config.dataset_version,
            "schema_version": self.config.schema_version,
            "ingest_run_id": self.config.ingest_run_id,
            "request_payload": {
                "instrument_ids": sorted_string_array(
                    request.instrument_ids.iter().map(|id| id.as_str().to_string())
                ),
                "start": request.start.to_string(),
                "end": request.end.to_string(),
                "fields": sorted_string_array(request.fields.iter().cloned()),
                "granularity": request.granularity,
            },
            "request_fingerprint": response.request_fingerprint,
            "source": to_canonical_value(&response.source)?,
            "fetched_at_ts": response.fetched_at_ts.to_rfc3339(),
            "asof_ts": asof_ts.to_rfc3339(),
            "payload_format": response.payload_format,
            "status_code": response.status_code,
            "retries": response.retries,
        }))
    }

    fn config_fingerprint(&self) -> String {
        content_hash(&json!({
            "dataset_id": self.config.dataset_id,
            "dataset_version": self.config.dataset_version,
            "schema_version": self.config.schema_version,
            "calendar_version": self.config.calendar_version,
            "universe_hash": self.universe.universe_hash,
            "sessionrules_hash": self.session_rules.sessionrules_hash,
        }))
    }
}
