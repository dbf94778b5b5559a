//! Shock application under an explicit convention.

use std::collections::BTreeMap;

use crate::core::identity::MarketDataId;
use crate::stress::errors::StressError;
use crate::stress::scenario::ShockConvention;

/// Apply one shock to one price.
///
/// Shocked prices must stay positive for price-positive instruments;
/// `allow_negative` loosens that for rate-like series.
pub fn apply_shock_to_price(
    price: f64,
    shock: f64,
    convention: ShockConvention,
    allow_negative: bool,
) -> Result<f64, StressError> {
    if !price.is_finite() {
        return Err(StressError::NonFinite {
            label: "price".to_string(),
        });
    }
    if !shock.is_finite() {
        return Err(StressError::NonFinite {
            label: "shock".to_string(),
        });
    }
    if !allow_negative && price < 0.0 {
        return Err(StressError::Input {
            detail: format!("price must be non-negative, got {price}"),
        });
    }
    let shocked_price = match convention {
        ShockConvention::MultReturn => price * (1.0 + shock),
        ShockConvention::MultFactor => price * shock,
    };
    if !shocked_price.is_finite() {
        return Err(StressError::NonFinite {
            label: "shocked_price".to_string(),
        });
    }
    if !allow_negative && shocked_price <= 0.0 {
        return Err(StressError::InvalidShockedPrice {
            asset_id: String::new(),
            price,
            shock,
            shocked_price,
        });
    }
    Ok(shocked_price)
}

/// Apply a shock vector to a price map; every shocked asset must have a
/// base price.
pub fn apply_shocks_to_prices(
    prices: &BTreeMap<MarketDataId, f64>,
    shock_vector: &BTreeMap<MarketDataId, f64>,
    convention: ShockConvention,
) -> Result<BTreeMap<MarketDataId, f64>, StressError> {
    if prices.is_empty() {
        return Err(StressError::Input {
            detail: "prices must be non-empty".to_string(),
        });
    }
    if shock_vector.is_empty() {
        return Err(StressError::Input {
            detail: "shock_vector must be non-empty".to_string(),
        });
    }
    let mut shocked = BTreeMap::new();
    for (asset, shock) in shock_vector {
        let price = prices
            .get(asset)
            .ok_or_else(|| StressError::MissingMarketState {
                asset_id: asset.as_str().to_string(),
            })?;
        let shocked_price = apply_shock_to_price(*price, *shock, convention, false).map_err(
            |err| match err {
                StressError::InvalidShockedPrice {
                    price,
                    shock,
                    shocked_price,
                    ..
                } => StressError::InvalidShockedPrice {
                    asset_id: asset.as_str().to_string(),
                    price,
                    shock,
                    shocked_price,
                },
                other => other,
            },
        )?;
        shocked.insert(asset.clone(), shocked_price);
    }
    Ok(shocked)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mult_return_and_mult_factor_differ() {
        let down = apply_shock_to_price(200.0, -0.10, ShockConvention::MultReturn, false).unwrap();
        assert!((down - 180.0).abs() < 1e-12);
        let scaled = apply_shock_to_price(200.0, 0.90, ShockConvention::MultFactor, false).unwrap();
        assert!((scaled - 180.0).abs() < 1e-12);
    }

    #[test]
    fn positivity_is_enforced_for_price_positive_instruments() {
        let err =
            apply_shock_to_price(100.0, -1.5, ShockConvention::MultReturn, false).unwrap_err();
        assert!(matches!(err, StressError::InvalidShockedPrice { .. }));
        // Rate-like series may cross zero when explicitly allowed.
        let negative =
            apply_shock_to_price(100.0, -1.5, ShockConvention::MultReturn, true).unwrap();
        assert!((negative + 50.0).abs() < 1e-12);
    }

    #[test]
    fn vector_application_requires_base_prices() {
        let prices = BTreeMap::from([(MarketDataId::new("EQ.AAPL").unwrap(), 200.0)]);
        let shocks = BTreeMap::from([(MarketDataId::new("FUT.ES").unwrap(), -0.05)]);
        let err = apply_shocks_to_prices(&prices, &shocks, ShockConvention::MultReturn)
            .unwrap_err();
        assert!(matches!(err, StressError::MissingMarketState { .. }));
    }
}
