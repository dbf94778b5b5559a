//! Sample covariance and correlation with diagnostics.

use statrs::statistics::Statistics;

use crate::core::identity::MarketDataId;
use crate::risk::errors::RiskError;
use crate::risk::report::{CovarianceDiagnostics, RiskWarning};
use crate::risk::returns::AlignedSeries;

pub const SYMMETRY_TOLERANCE: f64 = 1e-12;

/// Covariance/correlation matrices over a fixed asset order.
#[derive(Debug, Clone, PartialEq)]
pub struct CovarianceResult {
    pub assets: Vec<MarketDataId>,
    pub covariance: Vec<Vec<f64>>,
    pub correlation: Vec<Vec<f64>>,
    pub diagnostics: CovarianceDiagnostics,
    pub warnings: Vec<RiskWarning>,
}

/// Unbiased (n-1) sample covariance, optionally annualized.
pub fn sample_covariance(
    returns: &AlignedSeries,
    annualization_factor: Option<u32>,
    allow_missing: bool,
) -> Result<CovarianceResult, RiskError> {
    if returns.is_empty() || returns.columns.is_empty() {
        return Err(RiskError::InsufficientSample {
            rows: 0,
            required: 2,
            context: "covariance".to_string(),
        });
    }
    let mut warnings = Vec::new();
    let missing_count = returns.missing_count();
    if missing_count > 0 {
        if !allow_missing {
            return Err(RiskError::MissingValues {
                missing_count,
                context: "returns".to_string(),
            });
        }
        warnings.push(RiskWarning::new(
            "COVARIANCE_DROPPED_MISSING",
            "Dropped rows with missing returns before covariance estimation.",
            [("missing_count", missing_count.to_string())],
        ));
    }
    let (_, assets, matrix) = returns.dense();
    let sample_size = matrix.len();
    if sample_size < 2 {
        return Err(RiskError::InsufficientSample {
            rows: sample_size,
            required: 2,
            context: "covariance".to_string(),
        });
    }
    for row in &matrix {
        if row.iter().any(|value| !value.is_finite()) {
            return Err(RiskError::NonFinite {
                label: "returns".to_string(),
            });
        }
    }

    let dimension = assets.len();
    let means: Vec<f64> = (0..dimension)
        .map(|column| matrix.iter().map(|row| row[column]).mean())
        .collect();
    let scale = annualization_factor.map(|factor| factor as f64).unwrap_or(1.0);
    let mut covariance = vec![vec![0.0; dimension]; dimension];
    for i in 0..dimension {
        for j in i..dimension {
            let mut accumulator = 0.0;
            for row in &matrix {
                accumulator += (row[i] - means[i]) * (row[j] - means[j]);
            }
            let value = scale * accumulator / (sample_size as f64 - 1.0);
            covariance[i][j] = value;
            covariance[j][i] = value;
        }
    }

    let correlation = safe_correlation(&covariance);
    let symmetry_max_error = symmetry_max_error(&covariance);
    let diagnostics = CovarianceDiagnostics {
        sample_size,
        missing_count,
        symmetry_max_error,
        is_symmetric: symmetry_max_error <= SYMMETRY_TOLERANCE,
        estimator: "SAMPLE".to_string(),
    };
    Ok(CovarianceResult {
        assets,
        covariance,
        correlation,
        diagnostics,
        warnings,
    })
}

/// Correlation with zero-variance rows mapped to zero off-diagonal and an
/// exact unit diagonal.
fn safe_correlation(covariance: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let dimension = covariance.len();
    let stddev: Vec<f64> = (0..dimension)
        .map(|index| covariance[index][index].max(0.0).sqrt())
        .collect();
    let mut correlation = vec![vec![0.0; dimension]; dimension];
    for i in 0..dimension {
        for j in 0..dimension {
            correlation[i][j] = if i == j {
                1.0
            } else if stddev[i] > 0.0 && stddev[j] > 0.0 {
                covariance[i][j] / (stddev[i] * stddev[j])
            } else {
                0.0
            };
        }
    }
    correlation
}

fn symmetry_max_error(matrix: &[Vec<f64>]) -> f64 {
    let mut max_error: f64 = 0.0;
    for (i, row) in matrix.iter().enumerate() {
        for (j, value) in row.iter().enumerate() {
            max_error = max_error.max((value - matrix[j][i]).abs());
        }
    }
    max_error
}
