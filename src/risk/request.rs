//! Risk request schema.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::core::canonical::{content_hash, to_canonical_value};
use crate::risk::errors::RiskError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnDefinition {
    Simple,
    Log,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InputMode {
    PortfolioReturns,
    StaticWeightsXAssetReturns,
}

/// Missing-data handling inside the risk pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskMissingPolicy {
    Error,
    DropDates,
    ForwardFill,
    Partial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CovarianceEstimator {
    Sample,
}

impl CovarianceEstimator {
    pub fn as_str(&self) -> &'static str {
        "SAMPLE"
    }
}

/// Either a trailing lookback or an explicit `[start, end]` window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskWindow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lookback_trading_days: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDate>,
}

impl RiskWindow {
    pub fn lookback(days: usize) -> Self {
        Self {
            lookback_trading_days: Some(days),
            start: None,
            end: None,
        }
    }

    pub fn range(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            lookback_trading_days: None,
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn validate(&self) -> Result<(), RiskError> {
        let has_lookback = self.lookback_trading_days.is_some();
        let has_range = self.start.is_some() && self.end.is_some();
        if has_lookback == has_range {
            return Err(RiskError::InvalidRequest {
                detail: "window must set exactly one of lookback_trading_days or start+end"
                    .to_string(),
            });
        }
        if let Some(days) = self.lookback_trading_days {
            if days == 0 {
                return Err(RiskError::InvalidRequest {
                    detail: "lookback_trading_days must be positive".to_string(),
                });
            }
        }
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(RiskError::InvalidRequest {
                    detail: format!("window start {start} must be on or before end {end}"),
                });
            }
        }
        Ok(())
    }
}

/// Full specification of one risk computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRequest {
    pub as_of: NaiveDate,
    pub window: RiskWindow,
    pub return_definition: ReturnDefinition,
    pub annualization_factor: u32,
    pub confidence_levels: Vec<f64>,
    pub input_mode: InputMode,
    pub missing_data_policy: RiskMissingPolicy,
    pub covariance_estimator: CovarianceEstimator,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lineage: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl RiskRequest {
    pub fn new(as_of: NaiveDate, window: RiskWindow) -> Result<Self, RiskError> {
        let request = Self {
            as_of,
            window,
            return_definition: ReturnDefinition::Simple,
            annualization_factor: 252,
            confidence_levels: vec![0.95, 0.99],
            input_mode: InputMode::PortfolioReturns,
            missing_data_policy: RiskMissingPolicy::Error,
            covariance_estimator: CovarianceEstimator::Sample,
            lineage: None,
            notes: None,
        };
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), RiskError> {
        self.window.validate()?;
        if self.annualization_factor == 0 {
            return Err(RiskError::InvalidRequest {
                detail: "annualization_factor must be positive".to_string(),
            });
        }
        if self.confidence_levels.is_empty() {
            return Err(RiskError::InvalidRequest {
                detail: "confidence_levels must be non-empty".to_string(),
            });
        }
        for level in &self.confidence_levels {
            if !(*level > 0.0 && *level < 1.0) {
                return Err(RiskError::InvalidRequest {
                    detail: format!("confidence level {level} must be in (0, 1)"),
                });
            }
        }
        Ok(())
    }

    /// Confidence levels sorted and deduplicated.
    pub fn sorted_confidence_levels(&self) -> Vec<f64> {
        let mut levels = self.confidence_levels.clone();
        levels.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        levels.dedup();
        levels
    }

    pub fn request_hash(&self) -> Result<String, RiskError> {
        let value = to_canonical_value(self).map_err(|err| RiskError::InvalidRequest {
            detail: err.to_string(),
        })?;
        Ok(content_hash(&value))
    }
}
