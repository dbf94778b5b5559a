//! Component variance attribution: `CCV_i = w_i (Σw)_i`.

use std::collections::BTreeMap;

use crate::core::identity::MarketDataId;
use crate::risk::covariance::CovarianceResult;
use crate::risk::errors::RiskError;
use crate::risk::report::RiskAttribution;

pub const CONVENTION_COMPONENT: &str = "component = weight * (covariance @ weight)";
const RECONCILIATION_TOLERANCE: f64 = 1e-9;

/// Decompose portfolio variance into per-asset contributions.
///
/// Contributions sum to `wᵀΣw` within tolerance by construction; the
/// reconciliation is still asserted so silent numeric drift cannot pass.
pub fn variance_attribution(
    weights: &BTreeMap<MarketDataId, f64>,
    covariance: &CovarianceResult,
) -> Result<RiskAttribution, RiskError> {
    if weights.is_empty() {
        return Err(RiskError::Attribution {
            detail: "weights must be non-empty".to_string(),
        });
    }
    let assets = &covariance.assets;
    for asset in weights.keys() {
        if !assets.contains(asset) {
            return Err(RiskError::Attribution {
                detail: format!("weight asset '{asset}' missing from covariance"),
            });
        }
    }
    for asset in assets {
        if !weights.contains_key(asset) {
            return Err(RiskError::Attribution {
                detail: format!("covariance asset '{asset}' missing from weights"),
            });
        }
    }
    let vector: Vec<f64> = assets.iter().map(|asset| weights[asset]).collect();
    if vector.iter().any(|weight| !weight.is_finite()) {
        return Err(RiskError::NonFinite {
            label: "weights".to_string(),
        });
    }

    // marginal = Σ w
    let marginal: Vec<f64> = covariance
        .covariance
        .iter()
        .map(|row| row.iter().zip(&vector).map(|(sigma, weight)| sigma * weight).sum())
        .collect();
    let contributions: BTreeMap<MarketDataId, f64> = assets
        .iter()
        .zip(vector.iter().zip(&marginal))
        .map(|(asset, (weight, marginal))| (asset.clone(), weight * marginal))
        .collect();
    let portfolio_variance: f64 = contributions.values().sum();

    let direct: f64 = vector
        .iter()
        .zip(&marginal)
        .map(|(weight, marginal)| weight * marginal)
        .sum();
    if (portfolio_variance - direct).abs() > RECONCILIATION_TOLERANCE {
        return Err(RiskError::Attribution {
            detail: format!(
                "contributions {portfolio_variance} do not reconcile with wᵀΣw {direct}"
            ),
        });
    }

    Ok(RiskAttribution {
        contributions,
        portfolio_variance,
        convention: CONVENTION_COMPONENT.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::covariance::sample_covariance;
    use crate::risk::returns::AlignedSeries;
    use chrono::NaiveDate;

    fn two_asset_covariance() -> CovarianceResult {
        let mut series = AlignedSeries::new(
            (0..4)
                .map(|i| NaiveDate::from_ymd_opt(2026, 1, 2 + i).unwrap())
                .collect(),
        );
        series.columns.insert(
            MarketDataId::new("A").unwrap(),
            vec![Some(0.01), Some(-0.02), Some(0.03), Some(0.00)],
        );
        series.columns.insert(
            MarketDataId::new("B").unwrap(),
            vec![Some(0.02), Some(0.00), Some(0.01), Some(-0.01)],
        );
        sample_covariance(&series, None, false).unwrap()
    }

    #[test]
    fn contributions_sum_to_portfolio_variance() {
        let covariance = two_asset_covariance();
        let weights = BTreeMap::from([
            (MarketDataId::new("A").unwrap(), 0.6),
            (MarketDataId::new("B").unwrap(), 0.4),
        ]);
        let attribution = variance_attribution(&weights, &covariance).unwrap();
        let sum: f64 = attribution.contributions.values().sum();
        assert!((sum - attribution.portfolio_variance).abs() < 1e-12);
        assert_eq!(attribution.convention, CONVENTION_COMPONENT);

        // Cross-check against the quadratic form.
        let sigma = &covariance.covariance;
        let expected = 0.6 * (sigma[0][0] * 0.6 + sigma[0][1] * 0.4)
            + 0.4 * (sigma[1][0] * 0.6 + sigma[1][1] * 0.4);
        assert!((attribution.portfolio_variance - expected).abs() < 1e-15);
    }

    #[test]
    fn mismatched_asset_sets_are_rejected() {
        let covariance = two_asset_covariance();
        let missing = BTreeMap::from([(MarketDataId::new("A").unwrap(), 1.0)]);
        assert!(variance_attribution(&missing, &covariance).is_err());
        let extra = BTreeMap::from([
            (MarketDataId::new("A").unwrap(), 0.5),
            (MarketDataId::new("B").unwrap(), 0.25),
            (MarketDataId::new("C").unwrap(), 0.25),
        ]);
        assert!(variance_attribution(&extra, &covariance).is_err());
    }
}
