//! Annualized volatility and tracking error.

use statrs::statistics::Statistics;

use crate::risk::errors::RiskError;
use crate::risk::report::RiskWarning;
use crate::risk::request::RiskMissingPolicy;

/// Sample standard deviation (n-1) scaled by the root of the
/// annualization factor.
pub fn annualized_volatility(
    returns: &[f64],
    annualization_factor: u32,
) -> Result<f64, RiskError> {
    if annualization_factor == 0 {
        return Err(RiskError::InvalidRequest {
            detail: "annualization_factor must be positive".to_string(),
        });
    }
    if returns.len() < 2 {
        return Err(RiskError::InsufficientSample {
            rows: returns.len(),
            required: 2,
            context: "volatility".to_string(),
        });
    }
    if returns.iter().any(|value| !value.is_finite()) {
        return Err(RiskError::NonFinite {
            label: "returns".to_string(),
        });
    }
    let std = returns.iter().std_dev();
    Ok(std * (annualization_factor as f64).sqrt())
}

/// Annualized tracking error of portfolio minus benchmark, after aligning
/// the two series under the missing-data policy.
pub fn tracking_error_annualized(
    portfolio_returns: &[Option<f64>],
    benchmark_returns: &[Option<f64>],
    annualization_factor: u32,
    missing_data_policy: RiskMissingPolicy,
) -> Result<(f64, Vec<RiskWarning>), RiskError> {
    if portfolio_returns.len() != benchmark_returns.len() {
        return Err(RiskError::InvalidRequest {
            detail: format!(
                "portfolio ({}) and benchmark ({}) series must share an index",
                portfolio_returns.len(),
                benchmark_returns.len()
            ),
        });
    }
    let mut warnings = Vec::new();
    let mut paired: Vec<(Option<f64>, Option<f64>)> = portfolio_returns
        .iter()
        .copied()
        .zip(benchmark_returns.iter().copied())
        .collect();
    let missing_count = paired
        .iter()
        .filter(|(portfolio, benchmark)| portfolio.is_none() || benchmark.is_none())
        .count();
    match missing_data_policy {
        RiskMissingPolicy::Error => {
            if missing_count > 0 {
                return Err(RiskError::MissingValues {
                    missing_count,
                    context: "active returns".to_string(),
                });
            }
        }
        RiskMissingPolicy::DropDates | RiskMissingPolicy::Partial => {
            paired.retain(|(portfolio, benchmark)| portfolio.is_some() && benchmark.is_some());
            if missing_count > 0 {
                warnings.push(RiskWarning::new(
                    "TRACKING_ERROR_DROPPED_MISSING",
                    "Dropped dates with a missing side before tracking error computation.",
                    [("missing_count", missing_count.to_string())],
                ));
            }
        }
        RiskMissingPolicy::ForwardFill => {
            if missing_count > 0 {
                warnings.push(RiskWarning::new(
                    "TRACKING_ERROR_FORWARD_FILL",
                    "Forward-filled missing returns before tracking error computation.",
                    [("missing_count", missing_count.to_string())],
                ));
            }
            let mut last_portfolio: Option<f64> = None;
            let mut last_benchmark: Option<f64> = None;
            for (portfolio, benchmark) in paired.iter_mut() {
                match portfolio {
                    Some(value) => last_portfolio = Some(*value),
                    None => *portfolio = last_portfolio,
                }
                match benchmark {
                    Some(value) => last_benchmark = Some(*value),
                    None => *benchmark = last_benchmark,
                }
            }
            paired.retain(|(portfolio, benchmark)| portfolio.is_some() && benchmark.is_some());
        }
    }

    let active: Vec<f64> = paired
        .iter()
        .map(|(portfolio, benchmark)| {
            portfolio.unwrap_or_default() - benchmark.unwrap_or_default()
        })
        .collect();
    let te = annualized_volatility(&active, annualization_factor)?;
    Ok((te, warnings))
}
