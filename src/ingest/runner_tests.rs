//! End-to-end ingestion runner tests against fixture payloads.

use chrono::{DateTime, TimeZone, Utc};

use crate::calendar::baseline::CalendarBaseline;
use crate::calendar::session_rules::seed_session_rules;
use crate::core::identity::InstrumentId;
use crate::core::quality::QualityFlag;
use crate::core::records::{CanonicalRecord, TsProvenance};
use crate::ingest::errors::IngestError;
use crate::ingest::provider::{FetchRequest, FixtureAdapter};
use crate::ingest::runner::{IngestionConfig, IngestionRunner};
use crate::ingest::universe::seed_universe;
use crate::store::canonical_zone::read_canonical_snapshot;
use crate::store::errors::StorageError;
use crate::store::registry::DatasetRegistry;

fn fixed_clock() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 6, 23, 0, 0).unwrap()
}

fn d(day: u32) -> chrono::NaiveDate {
    chrono::NaiveDate::from_ymd_opt(2026, 1, day).unwrap()
}

fn config(root: &std::path::Path, version: &str, run: &str) -> IngestionConfig {
    IngestionConfig {
        dataset_id: "md.equity.eod.bars".to_string(),
        dataset_version: version.to_string(),
        ingest_run_id: run.to_string(),
        raw_root: root.join("raw"),
        canonical_root: root.join("canonical"),
        registry_path: root.join("registry.jsonl"),
        calendar_version: CalendarBaseline::seed().version_id(),
        schema_version: "1.0.0".to_string(),
        notes: None,
    }
}

fn equity_request() -> FetchRequest {
    FetchRequest::new(
        "md.equity.eod.bars",
        vec![InstrumentId::new("EQ.AAPL").unwrap()],
        d(5),
        d(6),
        vec!["close".to_string()],
    )
    .unwrap()
}

const EQUITY_FIXTURE: &str = r#"{"records": [
    {"mic": "XNYS", "vendor_symbol": "AAPL", "trading_date": "2026-01-05",
     "open": 199.0, "high": 201.0, "low": 198.5, "close": 200.5, "volume": 1000000},
    {"mic": "XNYS", "vendor_symbol": "AAPL", "trading_date": "2026-01-06",
     "open": 200.5, "high": 202.0, "low": 199.0, "close": 200.0, "volume": 900000}
]}"#;

#[test]
fn full_pipeline_publishes_and_registers() {
    let dir = tempfile::tempdir().unwrap();
    let fixtures = dir.path().join("fixtures");
    std::fs::create_dir_all(&fixtures).unwrap();
    std::fs::write(fixtures.join("md.equity.eod.bars.json"), EQUITY_FIXTURE).unwrap();

    let universe = seed_universe().unwrap();
    let session_rules = seed_session_rules().unwrap();
    let baseline = CalendarBaseline::seed();
    let runner = IngestionRunner::new(
        config(dir.path(), "2026-01-06", "ing_20260106_230000Z_0001"),
        &universe,
        &session_rules,
        &baseline,
    )
    .unwrap()
    .with_clock(fixed_clock);
    let adapter = FixtureAdapter::new(&fixtures).with_clock(fixed_clock);

    let result = runner.run(&equity_request(), &adapter).unwrap();

    // Raw zone holds the payload byte-identical.
    let raw = std::fs::read(&result.raw_paths.payload_path).unwrap();
    assert_eq!(raw, EQUITY_FIXTURE.as_bytes());

    // Snapshot round-trips with derived exchange-close timestamps.
    let (records, metadata) = read_canonical_snapshot(
        &dir.path().join("canonical"),
        "md.equity.eod.bars",
        "2026-01-06",
    )
    .unwrap();
    assert_eq!(records.len(), 2);
    match &records[0] {
        CanonicalRecord::Bar(bar) => {
            assert_eq!(bar.meta.ts_provenance, TsProvenance::ExchangeClose);
            // 2026-01-05 16:00 America/New_York == 21:00 UTC.
            assert_eq!(
                bar.meta.ts,
                Utc.with_ymd_and_hms(2026, 1, 5, 21, 0, 0).unwrap()
            );
            assert_eq!(bar.bar.close, 200.5);
        }
        other => panic!("expected bar record, got {other:?}"),
    }
    assert_eq!(metadata["row_count"], 2);

    // Registry entry is present and verifiable.
    let registry = DatasetRegistry::new(dir.path().join("registry.jsonl"), dir.path().join("canonical"));
    let entry = registry.find("md.equity.eod.bars", "2026-01-06").unwrap().unwrap();
    assert_eq!(entry.content_hash, result.published.content_hash);
    assert_eq!(registry.verify_integrity().unwrap(), 1);
    assert!(result.validation_report.is_publishable());
}

#[test]
fn duplicate_rows_block_publishing() {
    let dir = tempfile::tempdir().unwrap();
    let fixtures = dir.path().join("fixtures");
    std::fs::create_dir_all(&fixtures).unwrap();
    let duplicated = r#"{"records": [
        {"mic": "XNYS", "vendor_symbol": "AAPL", "trading_date": "2026-01-05", "close": 200.5},
        {"mic": "XNYS", "vendor_symbol": "AAPL", "trading_date": "2026-01-05", "close": 200.6}
    ]}"#;
    std::fs::write(fixtures.join("md.equity.eod.bars.json"), duplicated).unwrap();

    let universe = seed_universe().unwrap();
    let session_rules = seed_session_rules().unwrap();
    let baseline = CalendarBaseline::seed();
    let runner = IngestionRunner::new(
        config(dir.path(), "2026-01-06", "ing_20260106_230000Z_0002"),
        &universe,
        &session_rules,
        &baseline,
    )
    .unwrap()
    .with_clock(fixed_clock);
    let adapter = FixtureAdapter::new(&fixtures).with_clock(fixed_clock);

    let err = runner
        .run(
            &FetchRequest::new(
                "md.equity.eod.bars",
                vec![InstrumentId::new("EQ.AAPL").unwrap()],
                d(5),
                d(5),
                vec!["close".to_string()],
            )
            .unwrap(),
            &adapter,
        )
        .unwrap_err();
    match err {
        IngestError::Validation { report } => {
            assert!(!report.is_publishable());
            assert!(report.hard_errors[0].contains("duplicate record"));
        }
        other => panic!("expected validation error, got {other}"),
    }
    // Nothing was published.
    assert!(!dir
        .path()
        .join("canonical")
        .join("dataset_id=md.equity.eod.bars")
        .exists());
}

#[test]
fn republish_of_same_dataset_version_conflicts() {
    let dir = tempfile::tempdir().unwrap();
    let fixtures = dir.path().join("fixtures");
    std::fs::create_dir_all(&fixtures).unwrap();
    std::fs::write(fixtures.join("md.equity.eod.bars.json"), EQUITY_FIXTURE).unwrap();

    let universe = seed_universe().unwrap();
    let session_rules = seed_session_rules().unwrap();
    let baseline = CalendarBaseline::seed();
    let adapter = FixtureAdapter::new(&fixtures).with_clock(fixed_clock);

    let first = IngestionRunner::new(
        config(dir.path(), "2026-01-06", "ing_20260106_230000Z_0001"),
        &universe,
        &session_rules,
        &baseline,
    )
    .unwrap()
    .with_clock(fixed_clock);
    first.run(&equity_request(), &adapter).unwrap();

    let second = IngestionRunner::new(
        config(dir.path(), "2026-01-06", "ing_20260106_230000Z_0002"),
        &universe,
        &session_rules,
        &baseline,
    )
    .unwrap()
    .with_clock(fixed_clock);
    let err = second.run(&equity_request(), &adapter).unwrap_err();
    assert!(matches!(
        err,
        IngestError::Storage(StorageError::SnapshotExists { .. })
    ));
}

#[test]
fn fx_pipeline_flags_provider_timestamps() {
    let dir = tempfile::tempdir().unwrap();
    let fixtures = dir.path().join("fixtures");
    std::fs::create_dir_all(&fixtures).unwrap();
    let fx_fixture = r#"{"records": [
        {"base_ccy": "EUR", "quote_ccy": "USD", "field": "close", "value": 1.10,
         "ts": "2026-01-06T17:00:00+00:00", "fixing_date": "2026-01-06"}
    ]}"#;
    std::fs::write(fixtures.join("md.fx.spot.daily.json"), fx_fixture).unwrap();

    let universe = seed_universe().unwrap();
    let session_rules = seed_session_rules().unwrap();
    let baseline = CalendarBaseline::seed();
    let mut fx_config = config(dir.path(), "2026-01-06", "ing_20260106_230000Z_0003");
    fx_config.dataset_id = "md.fx.spot.daily".to_string();
    let runner = IngestionRunner::new(fx_config, &universe, &session_rules, &baseline)
        .unwrap()
        .with_clock(fixed_clock);
    let adapter = FixtureAdapter::new(&fixtures).with_clock(fixed_clock);

    let request = FetchRequest::new(
        "md.fx.spot.daily",
        vec![InstrumentId::new("FX.EURUSD").unwrap()],
        d(6),
        d(6),
        vec!["close".to_string()],
    )
    .unwrap();
    let result = runner.run(&request, &adapter).unwrap();
    assert_eq!(
        result.validation_report.flag_counts[&QualityFlag::ProviderTimestampUsed],
        1
    );
}
