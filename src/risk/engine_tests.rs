//! Risk engine pipeline tests.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate};

use crate::access::bundle::{AssetMeta, TimeSeriesBundle};
use crate::access::cache::LineageMeta;
use crate::access::frame::DataFrame;
use crate::access::request::Field;
use crate::access::validate::QualityReport;
use crate::core::identity::{Currency, InstrumentId, MarketDataId};
use crate::instruments::instrument::Instrument;
use crate::instruments::portfolio::{Portfolio, Position};
use crate::instruments::spec::{InstrumentSpec, InstrumentType};
use crate::pricing::valuation::{
    PortfolioValuation, PositionValuation, VALUATION_SCHEMA_VERSION,
};
use crate::risk::engine::{RiskEngine, RiskInputs};
use crate::risk::errors::RiskError;
use crate::risk::request::{InputMode, RiskRequest, RiskWindow};

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, day).unwrap()
}

fn asset(id: &str) -> MarketDataId {
    MarketDataId::new(id).unwrap()
}

fn bundle(columns: Vec<(&str, Vec<f64>)>, dates: Vec<NaiveDate>) -> TimeSeriesBundle {
    let mut frame = DataFrame::new(dates).unwrap();
    let mut assets_meta = BTreeMap::new();
    for (id, values) in columns {
        frame
            .insert_column(
                (asset(id), Field::Close),
                values.into_iter().map(Some).collect(),
            )
            .unwrap();
        assets_meta.insert(
            asset(id),
            AssetMeta {
                provider: "fixture".to_string(),
                provider_symbol: id.to_string(),
            },
        );
    }
    TimeSeriesBundle {
        data: frame,
        assets_meta,
        quality: QualityReport::default(),
        lineage: LineageMeta {
            request_hash: "req-hash".to_string(),
            request_json: serde_json::json!({}),
            provider: "fixture".to_string(),
            ingestion_ts_utc: "2026-01-31T00:00:00+00:00".to_string(),
            as_of_utc: None,
            dataset_version: "2026-01-31".to_string(),
            code_version: None,
            storage_paths: Vec::new(),
        },
    }
}

fn trading_days(count: usize) -> Vec<NaiveDate> {
    // January 2026 weekdays starting the 2nd.
    let mut dates = Vec::new();
    let mut day = d(2);
    while dates.len() < count {
        if !matches!(
            day.weekday(),
            chrono::Weekday::Sat | chrono::Weekday::Sun
        ) {
            dates.push(day);
        }
        day += chrono::Duration::days(1);
    }
    dates
}

fn instruments() -> BTreeMap<String, Instrument> {
    let usd = Currency::new("USD").unwrap();
    let spy = Instrument::new(
        InstrumentId::new("EQ.SPY").unwrap(),
        InstrumentType::Equity,
        Some(asset("EQ.SPY")),
        Some(usd.clone()),
        InstrumentSpec::Equity {
            exchange: None,
            country: None,
        },
    )
    .unwrap();
    let agg = Instrument::new(
        InstrumentId::new("EQ.AGG").unwrap(),
        InstrumentType::Equity,
        Some(asset("EQ.AGG")),
        Some(usd),
        InstrumentSpec::Equity {
            exchange: None,
            country: None,
        },
    )
    .unwrap();
    BTreeMap::from([
        ("EQ.SPY".to_string(), spy),
        ("EQ.AGG".to_string(), agg),
    ])
}

fn portfolio() -> Portfolio {
    let as_of: DateTime<FixedOffset> =
        DateTime::parse_from_rfc3339("2026-01-30T00:00:00+00:00").unwrap();
    Portfolio::new(
        as_of,
        vec![
            Position::new(InstrumentId::new("EQ.SPY").unwrap(), 6.0).unwrap(),
            Position::new(InstrumentId::new("EQ.AGG").unwrap(), 40.0).unwrap(),
        ],
        vec![],
    )
    .unwrap()
}

fn position_valuation(id: &str, md: &str, notional: f64) -> PositionValuation {
    PositionValuation {
        schema_version: VALUATION_SCHEMA_VERSION.to_string(),
        as_of: d(30),
        instrument_id: InstrumentId::new(id).unwrap(),
        market_data_id: Some(asset(md)),
        instrument_kind: "equity".to_string(),
        quantity: 1.0,
        instrument_currency: Currency::new("USD").unwrap(),
        unit_price: Some(notional),
        notional_native: notional,
        base_currency: Currency::new("USD").unwrap(),
        fx_asset_id_used: None,
        fx_inverted: false,
        fx_rate_effective: 1.0,
        notional_base: notional,
        inputs: Vec::new(),
        warnings: Vec::new(),
    }
}

fn valuation() -> PortfolioValuation {
    PortfolioValuation {
        schema_version: VALUATION_SCHEMA_VERSION.to_string(),
        as_of: d(30),
        base_currency: Currency::new("USD").unwrap(),
        nav_base: 10_000.0,
        positions: vec![
            position_valuation("EQ.SPY", "EQ.SPY", 6_000.0),
            position_valuation("EQ.AGG", "EQ.AGG", 4_000.0),
        ],
        breakdown_by_currency: BTreeMap::new(),
        warnings: Vec::new(),
        lineage: None,
    }
}

fn spy_prices() -> Vec<f64> {
    vec![
        470.0, 472.5, 468.0, 471.0, 474.2, 473.0, 469.8, 472.1, 475.5, 474.0, 476.3, 478.0,
        477.1, 479.4,
    ]
}

fn agg_prices() -> Vec<f64> {
    vec![
        98.0, 98.1, 97.9, 98.2, 98.4, 98.3, 98.1, 98.5, 98.6, 98.4, 98.7, 98.8, 98.6, 98.9,
    ]
}

fn standard_request() -> RiskRequest {
    let dates = trading_days(14);
    let mut request = RiskRequest::new(*dates.last().unwrap(), RiskWindow::lookback(10)).unwrap();
    request.input_mode = InputMode::StaticWeightsXAssetReturns;
    request.confidence_levels = vec![0.90];
    request
}

#[test]
fn pipeline_produces_consistent_metrics_and_lineage() {
    let dates = trading_days(14);
    let bundle = bundle(
        vec![("EQ.SPY", spy_prices()), ("EQ.AGG", agg_prices())],
        dates,
    );
    let valuation = valuation();
    let portfolio = portfolio();
    let instruments = instruments();
    let inputs = RiskInputs {
        portfolio: &portfolio,
        instruments: &instruments,
        bundle: &bundle,
        valuation: Some(&valuation),
        portfolio_returns: None,
        benchmark: None,
    };
    let report = RiskEngine::default().compute(&standard_request(), &inputs).unwrap();

    let metrics = &report.metrics;
    assert!(metrics.portfolio_vol_annualized.unwrap() > 0.0);
    assert!(metrics.max_drawdown.unwrap() <= 0.0);
    let var = metrics.var.as_ref().unwrap()["0.9"];
    let es = metrics.es.as_ref().unwrap()["0.9"];
    assert!(es >= var - 1e-12);
    let diagnostics = metrics.covariance_diagnostics.as_ref().unwrap();
    assert!(diagnostics.is_symmetric);
    assert_eq!(diagnostics.estimator, "SAMPLE");
    assert_eq!(diagnostics.sample_size, 10);

    // Attribution reconciles to wᵀΣw.
    let attribution = report.attribution.as_ref().unwrap();
    let sum: f64 = attribution.contributions.values().sum();
    assert!((sum - attribution.portfolio_variance).abs() < 1e-9);

    // The static-weights approximation warning is mandatory.
    assert!(report
        .warnings
        .iter()
        .any(|warning| warning.message == "approximation ignores intra-window rebalancing"));

    let lineage = &report.input_lineage;
    assert!(lineage.portfolio_snapshot_hash.is_some());
    assert!(lineage.market_data_bundle_hash.is_some());
    assert!(lineage.request_hash.is_some());

    // The whole report serializes canonically.
    let hash_one = report.report_hash().unwrap();
    let hash_two = report.report_hash().unwrap();
    assert_eq!(hash_one, hash_two);
}

#[test]
fn unknown_portfolio_asset_is_rejected() {
    let dates = trading_days(14);
    let bundle = bundle(vec![("EQ.SPY", spy_prices())], dates);
    let valuation = valuation();
    let portfolio = portfolio();
    let instruments = instruments();
    let inputs = RiskInputs {
        portfolio: &portfolio,
        instruments: &instruments,
        bundle: &bundle,
        valuation: Some(&valuation),
        portfolio_returns: None,
        benchmark: None,
    };
    let err = RiskEngine::default().compute(&standard_request(), &inputs).unwrap_err();
    assert!(matches!(err, RiskError::UnknownAsset { .. }));
}

#[test]
fn data_after_as_of_is_never_used() {
    let dates = trading_days(14);
    let cutoff = dates[9];
    let bundle = bundle(
        vec![("EQ.SPY", spy_prices()), ("EQ.AGG", agg_prices())],
        dates,
    );
    let valuation = valuation();
    let portfolio = portfolio();
    let instruments = instruments();
    let inputs = RiskInputs {
        portfolio: &portfolio,
        instruments: &instruments,
        bundle: &bundle,
        valuation: Some(&valuation),
        portfolio_returns: None,
        benchmark: None,
    };
    let mut request = RiskRequest::new(cutoff, RiskWindow::lookback(5)).unwrap();
    request.input_mode = InputMode::StaticWeightsXAssetReturns;
    request.confidence_levels = vec![0.90];
    let report = RiskEngine::default().compute(&request, &inputs).unwrap();
    // Five returns only, all of them at or before the cutoff.
    assert_eq!(
        report
            .metrics
            .covariance_diagnostics
            .as_ref()
            .unwrap()
            .sample_size,
        5
    );
}

#[test]
fn benchmark_enables_tracking_error() {
    let dates = trading_days(14);
    let benchmark_prices: Vec<f64> = spy_prices().iter().map(|price| price * 0.99).collect();
    let bundle = bundle(
        vec![
            ("EQ.SPY", spy_prices()),
            ("EQ.AGG", agg_prices()),
            ("IDX.BENCH", benchmark_prices),
        ],
        dates,
    );
    let valuation = valuation();
    let portfolio = portfolio();
    let instruments = instruments();
    let benchmark = asset("IDX.BENCH");
    let inputs = RiskInputs {
        portfolio: &portfolio,
        instruments: &instruments,
        bundle: &bundle,
        valuation: Some(&valuation),
        portfolio_returns: None,
        benchmark: Some(&benchmark),
    };
    let report = RiskEngine::default().compute(&standard_request(), &inputs).unwrap();
    assert!(report.metrics.tracking_error_annualized.unwrap() > 0.0);
    assert_eq!(
        report.input_lineage.benchmark_id.as_deref(),
        Some("IDX.BENCH")
    );
}

#[test]
fn portfolio_returns_mode_requires_the_series() {
    let dates = trading_days(14);
    let bundle = bundle(
        vec![("EQ.SPY", spy_prices()), ("EQ.AGG", agg_prices())],
        dates,
    );
    let valuation = valuation();
    let portfolio = portfolio();
    let instruments = instruments();
    let inputs = RiskInputs {
        portfolio: &portfolio,
        instruments: &instruments,
        bundle: &bundle,
        valuation: Some(&valuation),
        portfolio_returns: None,
        benchmark: None,
    };
    let mut request = standard_request();
    request.input_mode = InputMode::PortfolioReturns;
    assert!(matches!(
        RiskEngine::default().compute(&request, &inputs),
        Err(RiskError::InvalidRequest { .. })
    ));
}
