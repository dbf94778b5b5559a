//! Historical VaR and expected shortfall in loss convention.
//!
//! Losses are negated returns. The empirical quantile uses linear
//! interpolation between ascending order statistics at rank
//! `h = (n - 1) * level` (zero-indexed): the single pinned rule for the
//! whole library. ES is the mean of losses at or beyond the VaR, which
//! makes `ES >= VaR` structural.

use std::collections::BTreeMap;

use crate::risk::errors::RiskError;
use crate::risk::report::{confidence_key, RiskWarning};

const SAMPLE_SIZE_EPS: f64 = 1e-12;

/// VaR/ES per confidence level, in loss units.
#[derive(Debug, Clone, PartialEq)]
pub struct VarEsResult {
    pub var: BTreeMap<String, f64>,
    pub es: BTreeMap<String, f64>,
    pub warnings: Vec<RiskWarning>,
}

/// Linear-interpolated empirical quantile of an ascending sample.
pub fn empirical_quantile(sorted: &[f64], level: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    if n == 1 {
        return sorted[0];
    }
    let rank = (n as f64 - 1.0) * level;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let fraction = rank - lower as f64;
    sorted[lower] + fraction * (sorted[upper] - sorted[lower])
}

fn required_sample_size(level: f64) -> usize {
    (1.0 / (1.0 - level) - SAMPLE_SIZE_EPS).ceil() as usize
}

/// Historical VaR/ES over a clean return series.
pub fn historical_var_es(
    returns: &[f64],
    confidence_levels: &[f64],
) -> Result<VarEsResult, RiskError> {
    if returns.len() < 2 {
        return Err(RiskError::InsufficientSample {
            rows: returns.len(),
            required: 2,
            context: "var_es".to_string(),
        });
    }
    if returns.iter().any(|value| !value.is_finite()) {
        return Err(RiskError::NonFinite {
            label: "returns".to_string(),
        });
    }
    if confidence_levels.is_empty() {
        return Err(RiskError::InvalidRequest {
            detail: "confidence_levels must be non-empty".to_string(),
        });
    }
    let mut losses: Vec<f64> = returns.iter().map(|ret| -ret).collect();
    losses.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let sample_size = losses.len();

    let mut warnings = Vec::new();
    let mut var = BTreeMap::new();
    let mut es = BTreeMap::new();
    for level in confidence_levels {
        if !(*level > 0.0 && *level < 1.0) {
            return Err(RiskError::InvalidRequest {
                detail: format!("confidence level {level} must be in (0, 1)"),
            });
        }
        let required = required_sample_size(*level);
        if sample_size < required {
            warnings.push(RiskWarning::new(
                "VAR_ES_SMALL_SAMPLE",
                "Sample size is smaller than the minimum recommended for tail estimates.",
                [
                    ("confidence_level", level.to_string()),
                    ("sample_size", sample_size.to_string()),
                    ("required_sample_size", required.to_string()),
                ],
            ));
        }
        let var_value = empirical_quantile(&losses, *level);
        let tail: Vec<f64> = losses.iter().copied().filter(|loss| *loss >= var_value).collect();
        if tail.is_empty() {
            return Err(RiskError::InvalidRequest {
                detail: format!("tail sample is empty at confidence level {level}"),
            });
        }
        let es_value = tail.iter().sum::<f64>() / tail.len() as f64;
        var.insert(confidence_key(*level), var_value);
        es.insert(confidence_key(*level), es_value);
    }
    Ok(VarEsResult { var, es, warnings })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RETURNS: [f64; 10] = [
        -0.05, -0.03, -0.02, -0.01, 0.00, 0.01, 0.02, 0.03, 0.04, 0.05,
    ];

    #[test]
    fn var_matches_the_pinned_interpolation_rule() {
        let result = historical_var_es(&RETURNS, &[0.90]).unwrap();
        // Losses ascending: [-0.05,-0.04,-0.03,-0.02,-0.01,0,0.01,0.02,0.03,0.05].
        // rank = 9 * 0.9 = 8.1 -> 0.03 + 0.1 * (0.05 - 0.03) = 0.032.
        let var = result.var["0.9"];
        assert!((var - 0.032).abs() < 1e-12);
        // Tail {0.05}: ES = 0.05.
        let es = result.es["0.9"];
        assert!((es - 0.05).abs() < 1e-12);
        assert!(es >= var);
    }

    #[test]
    fn es_dominates_var_at_every_level() {
        for level in [0.5, 0.75, 0.9, 0.95, 0.99] {
            let result = historical_var_es(&RETURNS, &[level]).unwrap();
            let key = confidence_key(level);
            assert!(
                result.es[&key] >= result.var[&key] - 1e-12,
                "level {level}: es {} < var {}",
                result.es[&key],
                result.var[&key]
            );
        }
    }

    #[test]
    fn small_samples_warn_for_high_confidence() {
        let result = historical_var_es(&RETURNS, &[0.99]).unwrap();
        assert!(result
            .warnings
            .iter()
            .any(|warning| warning.code == "VAR_ES_SMALL_SAMPLE"));
        // 1 / (1 - 0.9) = 10 observations are available: no warning.
        let ok = historical_var_es(&RETURNS, &[0.90]).unwrap();
        assert!(ok.warnings.is_empty());
    }

    #[test]
    fn quantile_edges_are_exact_order_statistics() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(empirical_quantile(&sorted, 0.0), 1.0);
        assert_eq!(empirical_quantile(&sorted, 1.0), 4.0);
        assert!((empirical_quantile(&sorted, 0.5) - 2.5).abs() < 1e-15);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        assert!(historical_var_es(&[0.01], &[0.9]).is_err());
        assert!(historical_var_es(&[0.01, f64::NAN], &[0.9]).is_err());
        assert!(historical_var_es(&RETURNS, &[]).is_err());
        assert!(historical_var_es(&RETURNS, &[1.0]).is_err());
    }
}
