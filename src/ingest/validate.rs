//! Canonical-record validation: hard errors block publishing, soft flags
//! ride along.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};

use crate::calendar::baseline::CalendarBaseline;
use crate::calendar::derive::{detect_conflicts, CalendarConflict};
use crate::core::quality::{QualityFlag, ValidationReport};
use crate::core::records::{CanonicalRecord, TsProvenance};
use crate::ingest::errors::IngestError;
use crate::ingest::normalize::{EQUITY_EOD_DATASET_ID, FX_DAILY_DATASET_ID};
use crate::ingest::universe::UniverseSnapshot;

pub const DEFAULT_EQUITY_OUTLIER_THRESHOLD: f64 = 0.30;
pub const DEFAULT_FX_OUTLIER_THRESHOLD: f64 = 0.05;
pub const DEFAULT_STALE_WINDOW: usize = 3;

/// Identity the validated records must all share.
#[derive(Debug, Clone)]
pub struct ValidationContext {
    pub dataset_id: String,
    pub dataset_version: String,
    pub ingest_run_id: String,
}

/// Date range to compare against the venue calendar.
pub struct ConflictScope<'a> {
    pub baseline: &'a CalendarBaseline,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Record validator with dataset-specific thresholds.
pub struct RecordValidator<'a> {
    pub context: ValidationContext,
    pub equity_outlier_threshold: f64,
    pub fx_outlier_threshold: f64,
    pub stale_window: usize,
    pub universe: Option<&'a UniverseSnapshot>,
    pub conflict_scope: Option<ConflictScope<'a>>,
}

impl<'a> RecordValidator<'a> {
    pub fn new(context: ValidationContext) -> Self {
        Self {
            context,
            equity_outlier_threshold: DEFAULT_EQUITY_OUTLIER_THRESHOLD,
            fx_outlier_threshold: DEFAULT_FX_OUTLIER_THRESHOLD,
            stale_window: DEFAULT_STALE_WINDOW,
            universe: None,
            conflict_scope: None,
        }
    }

    pub fn with_universe(mut self, universe: &'a UniverseSnapshot) -> Self {
        self.universe = Some(universe);
        self
    }

    pub fn with_conflict_scope(mut self, scope: ConflictScope<'a>) -> Self {
        self.conflict_scope = Some(scope);
        self
    }

    /// Validate a record stream.
    ///
    /// Returns the flagged records and the report; hard errors produce an
    /// `IngestError::Validation` when `raise_on_hard` is set, otherwise the
    /// report carries them for the caller to decide.
    pub fn validate(
        &self,
        records: Vec<CanonicalRecord>,
        generated_ts: DateTime<Utc>,
        raise_on_hard: bool,
    ) -> Result<(Vec<CanonicalRecord>, ValidationReport), IngestError> {
        if self.stale_window < 2 {
            return Err(IngestError::Normalization {
                detail: "stale_window must be >= 2".to_string(),
            });
        }
        let mut report = ValidationReport::new(
            self.context.dataset_id.clone(),
            self.context.dataset_version.clone(),
            self.context.ingest_run_id.clone(),
            generated_ts,
        )?;
        let mut additions: Vec<BTreeSet<QualityFlag>> =
            records.iter().map(|_| BTreeSet::new()).collect();

        self.check_identity(&records, &mut report);
        self.check_values(&records, &mut report, &mut additions);
        self.check_duplicates(&records, &mut report);
        self.check_bid_ask(&records, &mut report);
        self.sweep_outliers_and_staleness(&records, &mut additions);
        self.check_calendar(&records, &mut report, &mut additions);

        for (index, record) in records.iter().enumerate() {
            if record.meta().ts_provenance == TsProvenance::ProviderEod {
                additions[index].insert(QualityFlag::ProviderTimestampUsed);
            }
        }

        let mut validated = records;
        for (record, new_flags) in validated.iter_mut().zip(additions) {
            record.meta_mut().quality_flags.extend(new_flags);
        }
        report.total_records = validated.len();
        for record in &validated {
            for flag in &record.meta().quality_flags {
                report.record_flag(*flag);
            }
        }

        if !report.hard_errors.is_empty() && raise_on_hard {
            return Err(IngestError::Validation {
                report: Box::new(report),
            });
        }
        Ok((validated, report))
    }

    fn check_identity(&self, records: &[CanonicalRecord], report: &mut ValidationReport) {
        for (index, record) in records.iter().enumerate() {
            let meta = record.meta();
            if meta.dataset_id != self.context.dataset_id {
                report
                    .hard_errors
                    .push(format!("record {index} dataset_id mismatch: {}", meta.dataset_id));
            }
            if meta.dataset_version != self.context.dataset_version {
                report.hard_errors.push(format!(
                    "record {index} dataset_version mismatch: {}",
                    meta.dataset_version
                ));
            }
            if meta.ingest_run_id != self.context.ingest_run_id {
                report.hard_errors.push(format!(
                    "record {index} ingest_run_id mismatch: {}",
                    meta.ingest_run_id
                ));
            }
        }
    }

    fn check_values(
        &self,
        records: &[CanonicalRecord],
        report: &mut ValidationReport,
        additions: &mut [BTreeSet<QualityFlag>],
    ) {
        for (index, record) in records.iter().enumerate() {
            match record {
                CanonicalRecord::Bar(bar_record) => {
                    let bar = &bar_record.bar;
                    let prices = [
                        ("close", Some(bar.close)),
                        ("open", bar.open),
                        ("high", bar.high),
                        ("low", bar.low),
                        ("adj_close", bar.adj_close),
                    ];
                    for (field, value) in prices {
                        if let Some(value) = value {
                            if !value.is_finite() || value <= 0.0 {
                                report.hard_errors.push(format!(
                                    "record {index} {field} must be finite and > 0"
                                ));
                            }
                        }
                    }
                    if let Some(volume) = bar.volume {
                        if !volume.is_finite() || volume < 0.0 {
                            report
                                .hard_errors
                                .push(format!("record {index} volume must be finite and >= 0"));
                        }
                    }
                    let mut refs = vec![bar.close];
                    refs.extend(bar.open);
                    let max_ref = refs.iter().cloned().fold(f64::MIN, f64::max);
                    let min_ref = refs.iter().cloned().fold(f64::MAX, f64::min);
                    if matches!(bar.high, Some(high) if high < max_ref) {
                        report
                            .hard_errors
                            .push(format!("record {index} high must be >= max(open, close)"));
                    }
                    if matches!(bar.low, Some(low) if low > min_ref) {
                        report
                            .hard_errors
                            .push(format!("record {index} low must be <= min(open, close)"));
                    }
                    if let (Some(high), Some(low)) = (bar.high, bar.low) {
                        if high < low {
                            report
                                .hard_errors
                                .push(format!("record {index} high must be >= low"));
                        }
                    }
                    if bar.has_adjustment() {
                        additions[index].insert(QualityFlag::AdjustedPricePresent);
                    }
                }
                CanonicalRecord::Point(point) => {
                    if !point.value.is_finite() || point.value <= 0.0 {
                        report
                            .hard_errors
                            .push(format!("record {index} value must be finite and > 0"));
                    }
                }
            }
        }
    }

    fn check_duplicates(&self, records: &[CanonicalRecord], report: &mut ValidationReport) {
        let mut seen_bars: BTreeSet<(String, DateTime<Utc>)> = BTreeSet::new();
        let mut seen_points: BTreeSet<(String, String, DateTime<Utc>)> = BTreeSet::new();
        for record in records {
            match record {
                CanonicalRecord::Bar(bar) => {
                    let key = (bar.meta.instrument_id.to_string(), bar.meta.ts);
                    if !seen_bars.insert(key) {
                        report.hard_errors.push(format!(
                            "duplicate record for {} at {}",
                            bar.meta.instrument_id,
                            bar.meta.ts.to_rfc3339()
                        ));
                    }
                }
                CanonicalRecord::Point(point) => {
                    let key = (
                        point.meta.instrument_id.to_string(),
                        point.field.clone(),
                        point.meta.ts,
                    );
                    if !seen_points.insert(key) {
                        report.hard_errors.push(format!(
                            "duplicate record for {}/{} at {}",
                            point.meta.instrument_id,
                            point.field,
                            point.meta.ts.to_rfc3339()
                        ));
                    }
                }
            }
        }
    }

    fn check_bid_ask(&self, records: &[CanonicalRecord], report: &mut ValidationReport) {
        if self.context.dataset_id != FX_DAILY_DATASET_ID {
            return;
        }
        let mut quotes: BTreeMap<(String, DateTime<Utc>), (Option<f64>, Option<f64>)> =
            BTreeMap::new();
        for record in records {
            if let CanonicalRecord::Point(point) = record {
                let slot = quotes
                    .entry((point.meta.instrument_id.to_string(), point.meta.ts))
                    .or_insert((None, None));
                match point.field.as_str() {
                    "bid" => slot.0 = Some(point.value),
                    "ask" => slot.1 = Some(point.value),
                    _ => {}
                }
            }
        }
        for ((instrument_id, ts), (bid, ask)) in quotes {
            if let (Some(bid), Some(ask)) = (bid, ask) {
                if bid > ask {
                    report.hard_errors.push(format!(
                        "bid/ask inversion for {instrument_id} at {}",
                        ts.to_rfc3339()
                    ));
                }
            }
        }
    }

    fn sweep_outliers_and_staleness(
        &self,
        records: &[CanonicalRecord],
        additions: &mut [BTreeSet<QualityFlag>],
    ) {
        let threshold = if self.context.dataset_id == FX_DAILY_DATASET_ID {
            self.fx_outlier_threshold
        } else {
            self.equity_outlier_threshold
        };
        let mut grouped: BTreeMap<String, Vec<(DateTime<Utc>, usize, f64)>> = BTreeMap::new();
        for (index, record) in records.iter().enumerate() {
            let (key, value) = match record {
                CanonicalRecord::Bar(bar) => {
                    (bar.meta.instrument_id.to_string(), bar.bar.close)
                }
                CanonicalRecord::Point(point) => (
                    format!("{}|{}", point.meta.instrument_id, point.field),
                    point.value,
                ),
            };
            if value.is_finite() {
                grouped.entry(key).or_default().push((record.meta().ts, index, value));
            }
        }
        for entries in grouped.values_mut() {
            entries.sort_by_key(|(ts, index, _)| (*ts, *index));
            let mut prev_value: Option<f64> = None;
            let mut stale_run = 0usize;
            for (_, index, value) in entries.iter() {
                if let Some(prev) = prev_value {
                    if prev > 0.0 && ((value - prev) / prev).abs() > threshold {
                        additions[*index].insert(QualityFlag::OutlierReturn);
                    }
                    stale_run = if *value == prev { stale_run + 1 } else { 1 };
                } else {
                    stale_run = 1;
                }
                if stale_run >= self.stale_window {
                    additions[*index].insert(QualityFlag::Stale);
                }
                prev_value = Some(*value);
            }
        }
    }

    fn check_calendar(
        &self,
        records: &[CanonicalRecord],
        report: &mut ValidationReport,
        additions: &mut [BTreeSet<QualityFlag>],
    ) {
        let Some(ref scope) = self.conflict_scope else {
            return;
        };
        let Some(universe) = self.universe else {
            return;
        };
        if self.context.dataset_id != EQUITY_EOD_DATASET_ID {
            return;
        }
        let mic_by_instrument: BTreeMap<String, String> = universe
            .instruments
            .iter()
            .filter_map(|record| {
                Some((record.instrument_id.to_string(), record.mic.clone()?))
            })
            .collect();

        let mut observed: BTreeMap<(String, String), BTreeMap<NaiveDate, usize>> = BTreeMap::new();
        for (index, record) in records.iter().enumerate() {
            if let CanonicalRecord::Bar(bar) = record {
                let instrument_id = bar.meta.instrument_id.to_string();
                let Some(mic) = mic_by_instrument.get(&instrument_id) else {
                    continue;
                };
                let date = bar
                    .meta
                    .trading_date_local
                    .unwrap_or_else(|| bar.meta.ts.date_naive());
                observed
                    .entry((instrument_id, mic.clone()))
                    .or_default()
                    .insert(date, index);
            }
        }
        for ((_, mic), dates) in &observed {
            let observed_dates: BTreeSet<NaiveDate> = dates.keys().copied().collect();
            let Ok(conflicts) =
                detect_conflicts(scope.baseline, mic, &observed_dates, scope.start, scope.end)
            else {
                continue;
            };
            for conflict in conflicts {
                match conflict {
                    CalendarConflict::BarOnClosedDay { date } => {
                        if let Some(index) = dates.get(&date) {
                            additions[*index].insert(QualityFlag::CalendarConflict);
                        }
                    }
                    CalendarConflict::MissingBarOnOpenDay { .. } => {
                        // No record to pin this on; the report still counts it.
                        report.record_flag(QualityFlag::CalendarConflict);
                    }
                }
            }
        }
    }
}
