//! Pricing engine: market-data protocol, FX policy B, pricers, valuation.

pub mod engine;
pub mod errors;
pub mod fx;
pub mod market_data;
pub mod pricers;
pub mod valuation;

#[cfg(test)]
mod engine_tests;

pub use engine::ValuationEngine;
pub use errors::PricingError;
pub use fx::{
    FxConversionResult, FxConverter, FxRateResolution, FxRateResolver, FX_EURUSD_ASSET_ID,
    FX_INVERTED_QUOTE,
};
pub use market_data::{
    BundleMarketDataView, MarketDataMeta, MarketDataView, MarketPoint, StaticMarketDataView,
};
pub use pricers::{
    CashPricer, EquityPricer, FuturePricer, IndexPricer, Pricer, PricerRegistry, PricingContext,
};
pub use valuation::{
    CurrencyBreakdown, PortfolioValuation, PositionValuation, ValuationInput,
    VALUATION_SCHEMA_VERSION,
};
