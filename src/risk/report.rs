//! Typed risk report with deterministic serialization.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::core::canonical::{content_hash, to_canonical_value};
use crate::core::identity::{Currency, MarketDataId};
use crate::report::lineage::InputLineage;
use crate::risk::errors::RiskError;
use crate::risk::request::{InputMode, ReturnDefinition, RiskMissingPolicy, RiskWindow};

pub const RISK_REPORT_VERSION: &str = "1.0";

/// Structured soft issue carried on a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskWarning {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
}

impl RiskWarning {
    pub fn new<const N: usize>(
        code: &str,
        message: &str,
        context: [(&str, String); N],
    ) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
            context: context
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect(),
        }
    }
}

/// Conventions the metrics were computed under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConventions {
    pub return_definition: ReturnDefinition,
    pub annualization_factor: u32,
    pub input_mode: InputMode,
    pub missing_data_policy: RiskMissingPolicy,
    /// The pinned empirical-quantile rule for historical VaR.
    pub quantile_interpolation: String,
}

/// Covariance estimation diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CovarianceDiagnostics {
    pub sample_size: usize,
    pub missing_count: usize,
    pub symmetry_max_error: f64,
    pub is_symmetric: bool,
    pub estimator: String,
}

/// Headline metrics. Tail-risk maps are keyed by the decimal confidence
/// level rendered as a string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portfolio_vol_annualized: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_drawdown: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_recovery: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_error_annualized: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub var: Option<BTreeMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub es: Option<BTreeMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub covariance_diagnostics: Option<CovarianceDiagnostics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetExposure {
    pub asset_id: MarketDataId,
    pub weight: f64,
    pub notional_base: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyExposure {
    pub currency: Currency,
    pub weight: f64,
    pub notional_base: f64,
}

/// Exposure views; lists are sorted by their stable key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskExposures {
    pub by_asset: Vec<AssetExposure>,
    pub by_currency: Vec<CurrencyExposure>,
    /// Convention actually applied (`NORMALIZED` or `RAW_NOTIONAL`).
    pub weight_convention: String,
}

/// Component variance contributions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskAttribution {
    pub contributions: BTreeMap<MarketDataId, f64>,
    pub portfolio_variance: f64,
    pub convention: String,
}

/// The assembled risk report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    pub report_version: String,
    pub as_of: NaiveDate,
    pub window: RiskWindow,
    pub conventions: RiskConventions,
    pub input_lineage: InputLineage,
    pub metrics: RiskMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exposures: Option<RiskExposures>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribution: Option<RiskAttribution>,
    pub warnings: Vec<RiskWarning>,
}

impl RiskReport {
    pub fn to_canonical_value(&self) -> Result<serde_json::Value, RiskError> {
        to_canonical_value(self).map_err(|err| RiskError::InvalidRequest {
            detail: err.to_string(),
        })
    }

    pub fn report_hash(&self) -> Result<String, RiskError> {
        Ok(content_hash(&self.to_canonical_value()?))
    }
}

/// Render a confidence level as its stable map key.
pub fn confidence_key(level: f64) -> String {
    format!("{level}")
}
