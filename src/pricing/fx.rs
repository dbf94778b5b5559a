//! FX policy B: one canonical series, explicit inversion, no triangulation.
//!
//! `FX.EURUSD` quotes USD per EUR. Conversions between EUR and USD resolve
//! through that single series; an inverted use is recorded, any other
//! currency is rejected.

use chrono::NaiveDate;

use crate::core::identity::{Currency, MarketDataId};
use crate::pricing::errors::PricingError;
use crate::pricing::market_data::MarketDataView;

pub const FX_EURUSD_ASSET_ID: &str = "FX.EURUSD";
pub const SUPPORTED_CURRENCIES: [&str; 2] = ["EUR", "USD"];

/// Warning recorded on valuations that used the inverted quote.
pub const FX_INVERTED_QUOTE: &str = "FX_INVERTED_QUOTE";

/// Result of resolving the effective conversion rate.
#[derive(Debug, Clone, PartialEq)]
pub struct FxRateResolution {
    pub rate: f64,
    pub fx_asset_id: Option<String>,
    pub inverted: bool,
}

/// Resolve effective EUR/USD rates from a market-data view.
pub struct FxRateResolver<'a> {
    market_data: &'a dyn MarketDataView,
    field: String,
}

impl<'a> FxRateResolver<'a> {
    pub fn new(market_data: &'a dyn MarketDataView) -> Self {
        Self {
            market_data,
            field: "close".to_string(),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn effective_rate(
        &self,
        native_currency: &Currency,
        base_currency: &Currency,
        as_of: NaiveDate,
        instrument_id: Option<&str>,
    ) -> Result<FxRateResolution, PricingError> {
        self.ensure_supported(native_currency, base_currency, as_of, instrument_id)?;
        if native_currency == base_currency {
            return Ok(FxRateResolution {
                rate: 1.0,
                fx_asset_id: None,
                inverted: false,
            });
        }
        let eurusd = self.eurusd_rate(as_of, instrument_id)?;
        match (native_currency.as_str(), base_currency.as_str()) {
            ("EUR", "USD") => Ok(FxRateResolution {
                rate: eurusd,
                fx_asset_id: Some(FX_EURUSD_ASSET_ID.to_string()),
                inverted: false,
            }),
            ("USD", "EUR") => Ok(FxRateResolution {
                rate: 1.0 / eurusd,
                fx_asset_id: Some(FX_EURUSD_ASSET_ID.to_string()),
                inverted: true,
            }),
            _ => Err(PricingError::UnsupportedCurrency {
                currency: native_currency.as_str().to_string(),
                base_currency: base_currency.as_str().to_string(),
                as_of,
                instrument_id: instrument_id.map(str::to_string),
            }),
        }
    }

    fn ensure_supported(
        &self,
        native_currency: &Currency,
        base_currency: &Currency,
        as_of: NaiveDate,
        instrument_id: Option<&str>,
    ) -> Result<(), PricingError> {
        for currency in [native_currency, base_currency] {
            if !SUPPORTED_CURRENCIES.contains(&currency.as_str()) {
                return Err(PricingError::UnsupportedCurrency {
                    currency: currency.as_str().to_string(),
                    base_currency: base_currency.as_str().to_string(),
                    as_of,
                    instrument_id: instrument_id.map(str::to_string),
                });
            }
        }
        Ok(())
    }

    fn eurusd_rate(
        &self,
        as_of: NaiveDate,
        instrument_id: Option<&str>,
    ) -> Result<f64, PricingError> {
        let asset_id = MarketDataId::new(FX_EURUSD_ASSET_ID).map_err(|_| {
            PricingError::MissingFxRate {
                asset_id: FX_EURUSD_ASSET_ID.to_string(),
                field: self.field.clone(),
                as_of,
                instrument_id: instrument_id.map(str::to_string),
            }
        })?;
        let rate = self
            .market_data
            .get_value(&asset_id, &self.field, as_of)
            .ok_or_else(|| PricingError::MissingFxRate {
                asset_id: FX_EURUSD_ASSET_ID.to_string(),
                field: self.field.clone(),
                as_of,
                instrument_id: instrument_id.map(str::to_string),
            })?;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(PricingError::InvalidFxRate {
                asset_id: FX_EURUSD_ASSET_ID.to_string(),
                field: self.field.clone(),
                as_of,
                rate,
                instrument_id: instrument_id.map(str::to_string),
            });
        }
        Ok(rate)
    }
}

/// Applied conversion with full audit fields.
#[derive(Debug, Clone, PartialEq)]
pub struct FxConversionResult {
    pub notional_native: f64,
    pub notional_base: f64,
    pub fx_rate_effective: f64,
    pub fx_asset_id_used: Option<String>,
    pub fx_inverted: bool,
    pub warnings: Vec<String>,
}

/// Apply resolved FX rates with numeric hygiene.
pub struct FxConverter<'a> {
    resolver: FxRateResolver<'a>,
}

impl<'a> FxConverter<'a> {
    pub fn new(resolver: FxRateResolver<'a>) -> Self {
        Self { resolver }
    }

    pub fn convert(
        &self,
        notional_native: f64,
        native_currency: &Currency,
        base_currency: &Currency,
        as_of: NaiveDate,
        instrument_id: Option<&str>,
    ) -> Result<FxConversionResult, PricingError> {
        if !notional_native.is_finite() {
            return Err(PricingError::NonFiniteInput {
                field: "notional_native".to_string(),
                value: notional_native,
                as_of,
                instrument_id: instrument_id.map(str::to_string),
            });
        }
        let resolution =
            self.resolver
                .effective_rate(native_currency, base_currency, as_of, instrument_id)?;
        let notional_base = notional_native * resolution.rate;
        if !notional_base.is_finite() {
            return Err(PricingError::NonFiniteInput {
                field: "notional_base".to_string(),
                value: notional_base,
                as_of,
                instrument_id: instrument_id.map(str::to_string),
            });
        }
        let warnings = if resolution.inverted {
            vec![FX_INVERTED_QUOTE.to_string()]
        } else {
            Vec::new()
        };
        Ok(FxConversionResult {
            notional_native,
            notional_base,
            fx_rate_effective: resolution.rate,
            fx_asset_id_used: resolution.fx_asset_id,
            fx_inverted: resolution.inverted,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::market_data::StaticMarketDataView;

    fn d() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 6).unwrap()
    }

    fn eur() -> Currency {
        Currency::new("EUR").unwrap()
    }

    fn usd() -> Currency {
        Currency::new("USD").unwrap()
    }

    fn view_with_rate(rate: f64) -> StaticMarketDataView {
        StaticMarketDataView::new().with_value(
            MarketDataId::new(FX_EURUSD_ASSET_ID).unwrap(),
            "close",
            d(),
            rate,
        )
    }

    #[test]
    fn same_currency_is_identity_without_series_lookup() {
        let view = StaticMarketDataView::new();
        let resolver = FxRateResolver::new(&view);
        let resolution = resolver.effective_rate(&usd(), &usd(), d(), None).unwrap();
        assert_eq!(resolution.rate, 1.0);
        assert_eq!(resolution.fx_asset_id, None);
        assert!(!resolution.inverted);
    }

    #[test]
    fn usd_to_eur_uses_the_inverted_quote() {
        let view = view_with_rate(1.10);
        let resolver = FxRateResolver::new(&view);
        let resolution = resolver.effective_rate(&usd(), &eur(), d(), None).unwrap();
        assert!((resolution.rate - 1.0 / 1.10).abs() < 1e-15);
        assert_eq!(resolution.fx_asset_id.as_deref(), Some(FX_EURUSD_ASSET_ID));
        assert!(resolution.inverted);

        let forward = resolver.effective_rate(&eur(), &usd(), d(), None).unwrap();
        assert_eq!(forward.rate, 1.10);
        assert!(!forward.inverted);
    }

    #[test]
    fn missing_invalid_and_unsupported_are_distinct_errors() {
        let empty = StaticMarketDataView::new();
        let resolver = FxRateResolver::new(&empty);
        assert!(matches!(
            resolver.effective_rate(&usd(), &eur(), d(), None),
            Err(PricingError::MissingFxRate { .. })
        ));

        let zero = view_with_rate(0.0);
        let resolver = FxRateResolver::new(&zero);
        assert!(matches!(
            resolver.effective_rate(&usd(), &eur(), d(), None),
            Err(PricingError::InvalidFxRate { .. })
        ));

        let view = view_with_rate(1.10);
        let resolver = FxRateResolver::new(&view);
        let gbp = Currency::new("GBP").unwrap();
        assert!(matches!(
            resolver.effective_rate(&gbp, &usd(), d(), None),
            Err(PricingError::UnsupportedCurrency { .. })
        ));
    }

    #[test]
    fn converter_records_the_inversion_warning() {
        let view = view_with_rate(1.10);
        let converter = FxConverter::new(FxRateResolver::new(&view));
        let result = converter
            .convert(2000.0, &usd(), &eur(), d(), Some("EQ.AAPL"))
            .unwrap();
        assert!((result.notional_base - 2000.0 / 1.10).abs() < 1e-9);
        assert_eq!(result.warnings, vec![FX_INVERTED_QUOTE.to_string()]);
        assert!(result.fx_inverted);
    }
}
