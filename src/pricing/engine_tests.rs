//! Valuation engine tests, including the EUR/USD inversion scenario.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate};

use crate::core::identity::{Currency, InstrumentId, MarketDataId};
use crate::instruments::instrument::Instrument;
use crate::instruments::portfolio::{Portfolio, Position};
use crate::instruments::spec::{InstrumentSpec, InstrumentType};
use crate::pricing::engine::ValuationEngine;
use crate::pricing::errors::PricingError;
use crate::pricing::fx::FX_EURUSD_ASSET_ID;
use crate::pricing::market_data::StaticMarketDataView;
use crate::pricing::pricers::PricerRegistry;

fn d() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 6).unwrap()
}

fn as_of() -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339("2026-01-06T00:00:00+00:00").unwrap()
}

fn usd() -> Currency {
    Currency::new("USD").unwrap()
}

fn eur() -> Currency {
    Currency::new("EUR").unwrap()
}

fn equity(id: &str, md: &str, currency: Currency) -> Instrument {
    Instrument::new(
        InstrumentId::new(id).unwrap(),
        InstrumentType::Equity,
        Some(MarketDataId::new(md).unwrap()),
        Some(currency),
        InstrumentSpec::Equity {
            exchange: None,
            country: None,
        },
    )
    .unwrap()
}

fn future(id: &str, md: &str, multiplier: f64) -> Instrument {
    Instrument::new(
        InstrumentId::new(id).unwrap(),
        InstrumentType::Future,
        Some(MarketDataId::new(md).unwrap()),
        Some(usd()),
        InstrumentSpec::Future {
            expiry: NaiveDate::from_ymd_opt(2026, 3, 20).unwrap(),
            multiplier,
            root: None,
            exchange: None,
        },
    )
    .unwrap()
}

fn view() -> StaticMarketDataView {
    StaticMarketDataView::new()
        .with_value(MarketDataId::new("EQ.AAPL").unwrap(), "close", d(), 200.0)
        .with_value(MarketDataId::new("FUT.ES").unwrap(), "close", d(), 4500.0)
        .with_value(
            MarketDataId::new(FX_EURUSD_ASSET_ID).unwrap(),
            "close",
            d(),
            1.10,
        )
}

fn instruments() -> BTreeMap<String, Instrument> {
    BTreeMap::from([
        ("EQ.AAPL".to_string(), equity("EQ.AAPL", "EQ.AAPL", usd())),
        ("FUT.ES".to_string(), future("FUT.ES", "FUT.ES", 50.0)),
    ])
}

#[test]
fn usd_position_converts_into_eur_base_with_inverted_fx() {
    let portfolio = Portfolio::new(
        as_of(),
        vec![Position::new(InstrumentId::new("EQ.AAPL").unwrap(), 10.0).unwrap()],
        vec![("EUR".to_string(), 1000.0)],
    )
    .unwrap();
    let engine = ValuationEngine::new(PricerRegistry::standard());
    let valuation = engine
        .value_portfolio(&portfolio, &instruments(), &view(), eur(), Some(d()), None)
        .unwrap();

    let aapl = valuation
        .positions
        .iter()
        .find(|position| position.instrument_id.as_str() == "EQ.AAPL")
        .unwrap();
    assert_eq!(aapl.fx_asset_id_used.as_deref(), Some(FX_EURUSD_ASSET_ID));
    assert!(aapl.fx_inverted);
    assert!((aapl.fx_rate_effective - 1.0 / 1.10).abs() < 1e-12);
    assert!((aapl.notional_native - 2000.0).abs() < 1e-9);
    assert!((aapl.notional_base - 2000.0 / 1.10).abs() < 1e-9);

    // NAV = 1000 EUR cash + 2000/1.10 EUR of AAPL.
    assert!((valuation.nav_base - (1000.0 + 2000.0 / 1.10)).abs() < 1e-9);

    // Breakdown reconciles with position totals.
    let usd_bucket = &valuation.breakdown_by_currency[&usd()];
    assert!((usd_bucket.notional_native - 2000.0).abs() < 1e-9);
    assert!((usd_bucket.notional_base - 2000.0 / 1.10).abs() < 1e-9);
    let eur_bucket = &valuation.breakdown_by_currency[&eur()];
    assert!((eur_bucket.notional_native - 1000.0).abs() < 1e-9);
    assert!((eur_bucket.notional_base - 1000.0).abs() < 1e-9);
}

#[test]
fn same_currency_needs_no_fx_series() {
    let portfolio = Portfolio::new(
        as_of(),
        vec![Position::new(InstrumentId::new("EQ.AAPL").unwrap(), 10.0).unwrap()],
        vec![],
    )
    .unwrap();
    // No FX series in the view: must still price in USD base.
    let view = StaticMarketDataView::new().with_value(
        MarketDataId::new("EQ.AAPL").unwrap(),
        "close",
        d(),
        200.0,
    );
    let engine = ValuationEngine::new(PricerRegistry::standard());
    let valuation = engine
        .value_portfolio(&portfolio, &instruments(), &view, usd(), Some(d()), None)
        .unwrap();
    let aapl = &valuation.positions[0];
    assert_eq!(aapl.fx_asset_id_used, None);
    assert!(!aapl.fx_inverted);
    assert_eq!(aapl.fx_rate_effective, 1.0);
    assert_eq!(aapl.notional_base, aapl.notional_native);
}

#[test]
fn scaling_quantity_scales_notionals_linearly() {
    let engine = ValuationEngine::new(PricerRegistry::standard());
    let base = Portfolio::new(
        as_of(),
        vec![Position::new(InstrumentId::new("EQ.AAPL").unwrap(), 10.0).unwrap()],
        vec![],
    )
    .unwrap();
    let tripled = Portfolio::new(
        as_of(),
        vec![Position::new(InstrumentId::new("EQ.AAPL").unwrap(), 30.0).unwrap()],
        vec![],
    )
    .unwrap();
    let small = engine
        .value_portfolio(&base, &instruments(), &view(), eur(), Some(d()), None)
        .unwrap();
    let large = engine
        .value_portfolio(&tripled, &instruments(), &view(), eur(), Some(d()), None)
        .unwrap();
    assert!(
        (large.positions[0].notional_native - 3.0 * small.positions[0].notional_native).abs()
            < 1e-9
    );
    assert!(
        (large.positions[0].notional_base - 3.0 * small.positions[0].notional_base).abs() < 1e-9
    );
}

#[test]
fn future_notional_includes_the_multiplier() {
    let portfolio = Portfolio::new(
        as_of(),
        vec![Position::new(InstrumentId::new("FUT.ES").unwrap(), 2.0).unwrap()],
        vec![],
    )
    .unwrap();
    let engine = ValuationEngine::new(PricerRegistry::standard());
    let valuation = engine
        .value_portfolio(&portfolio, &instruments(), &view(), usd(), Some(d()), None)
        .unwrap();
    assert!((valuation.positions[0].notional_native - 2.0 * 4500.0 * 50.0).abs() < 1e-9);
}

#[test]
fn missing_price_and_missing_pricer_fail_fast() {
    let portfolio = Portfolio::new(
        as_of(),
        vec![Position::new(InstrumentId::new("EQ.AAPL").unwrap(), 1.0).unwrap()],
        vec![],
    )
    .unwrap();
    let empty_view = StaticMarketDataView::new();
    let engine = ValuationEngine::new(PricerRegistry::standard());
    assert!(matches!(
        engine.value_portfolio(&portfolio, &instruments(), &empty_view, usd(), Some(d()), None),
        Err(PricingError::MissingPrice { .. })
    ));

    let bare = ValuationEngine::new(PricerRegistry::empty());
    assert!(matches!(
        bare.value_portfolio(&portfolio, &instruments(), &view(), usd(), Some(d()), None),
        Err(PricingError::MissingPricer { .. })
    ));
}

#[test]
fn missing_fx_errors_when_currencies_mix() {
    let portfolio = Portfolio::new(
        as_of(),
        vec![Position::new(InstrumentId::new("EQ.AAPL").unwrap(), 1.0).unwrap()],
        vec![("EUR".to_string(), 100.0)],
    )
    .unwrap();
    let no_fx = StaticMarketDataView::new().with_value(
        MarketDataId::new("EQ.AAPL").unwrap(),
        "close",
        d(),
        200.0,
    );
    let engine = ValuationEngine::new(PricerRegistry::standard());
    let err = engine
        .value_portfolio(&portfolio, &instruments(), &no_fx, eur(), Some(d()), None)
        .unwrap_err();
    assert!(matches!(err, PricingError::MissingFxRate { .. }));
}
