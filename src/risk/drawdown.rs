//! Drawdown series, maximum drawdown, and time-to-recovery.

use crate::risk::errors::RiskError;
use crate::risk::request::ReturnDefinition;

/// Drawdown outcome over one return series.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawdownResult {
    /// `D_t = W_t / max_{s<=t} W_s - 1`; non-positive by construction.
    pub drawdown: Vec<f64>,
    pub max_drawdown: f64,
    /// Observations from the trough until wealth regained the prior peak;
    /// `None` if it never recovered inside the window.
    pub time_to_recovery: Option<usize>,
}

/// Compute the drawdown profile of a clean (gap-free, finite) return
/// series.
pub fn drawdown(
    returns: &[f64],
    return_definition: ReturnDefinition,
) -> Result<DrawdownResult, RiskError> {
    if returns.is_empty() {
        return Err(RiskError::InsufficientSample {
            rows: 0,
            required: 1,
            context: "drawdown".to_string(),
        });
    }
    if returns.iter().any(|value| !value.is_finite()) {
        return Err(RiskError::NonFinite {
            label: "returns".to_string(),
        });
    }
    let wealth: Vec<f64> = match return_definition {
        ReturnDefinition::Simple => returns
            .iter()
            .scan(1.0, |acc, ret| {
                *acc *= 1.0 + ret;
                Some(*acc)
            })
            .collect(),
        ReturnDefinition::Log => returns
            .iter()
            .scan(0.0, |acc, ret| {
                *acc += ret;
                Some(acc.exp())
            })
            .collect(),
    };

    let mut running_max = f64::MIN;
    let mut drawdown_series = Vec::with_capacity(wealth.len());
    let mut trough_index = 0usize;
    let mut max_drawdown = 0.0f64;
    for (index, value) in wealth.iter().enumerate() {
        running_max = running_max.max(*value);
        let dd = value / running_max - 1.0;
        if dd < max_drawdown {
            max_drawdown = dd;
            trough_index = index;
        }
        drawdown_series.push(dd);
    }

    // Recovery: first index after the trough where wealth regains the peak
    // that stood at the trough.
    let time_to_recovery = if max_drawdown < 0.0 {
        let peak_at_trough = wealth[..=trough_index]
            .iter()
            .cloned()
            .fold(f64::MIN, f64::max);
        wealth[trough_index + 1..]
            .iter()
            .position(|value| *value >= peak_at_trough)
            .map(|offset| offset + 1)
    } else {
        None
    };

    Ok(DrawdownResult {
        drawdown: drawdown_series,
        max_drawdown,
        time_to_recovery,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drawdown_is_nonpositive_and_zero_at_running_maxima() {
        let result = drawdown(
            &[0.10, -0.05, 0.08, -0.02],
            ReturnDefinition::Simple,
        )
        .unwrap();
        assert!(result.drawdown.iter().all(|value| *value <= 1e-15));
        // First observation is a running maximum.
        assert!(result.drawdown[0].abs() < 1e-15);
    }

    #[test]
    fn max_drawdown_and_recovery_on_a_vee_path() {
        // Wealth: 1.1, 0.99, 1.0890, 1.1979 -> trough at index 1.
        let result = drawdown(
            &[0.10, -0.10, 0.10, 0.10],
            ReturnDefinition::Simple,
        )
        .unwrap();
        assert!((result.max_drawdown + 0.10).abs() < 1e-12);
        // Wealth regains 1.1 at index 3 (1.1979): two steps after the trough.
        assert_eq!(result.time_to_recovery, Some(2));
    }

    #[test]
    fn no_recovery_inside_window_is_none() {
        let result = drawdown(&[0.10, -0.20, 0.01], ReturnDefinition::Simple).unwrap();
        assert!(result.max_drawdown < 0.0);
        assert_eq!(result.time_to_recovery, None);
    }

    #[test]
    fn monotone_growth_has_zero_drawdown() {
        let result = drawdown(&[0.01, 0.02, 0.03], ReturnDefinition::Simple).unwrap();
        assert_eq!(result.max_drawdown, 0.0);
        assert_eq!(result.time_to_recovery, None);
    }

    #[test]
    fn log_definition_uses_exponential_wealth() {
        let simple = drawdown(&[0.1f64.ln_1p(), (-0.1f64).ln_1p()], ReturnDefinition::Log)
            .unwrap();
        // exp(ln(1.1) + ln(0.9)) = 0.99; peak 1.1 -> drawdown -0.1.
        assert!((simple.max_drawdown + 0.10).abs() < 1e-12);
    }
}
