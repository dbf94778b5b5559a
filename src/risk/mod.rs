//! Risk engine: return builders, covariance, drawdowns, historical
//! VaR/ES, exposures, attribution, and the typed report.

pub mod attribution;
pub mod covariance;
pub mod drawdown;
pub mod engine;
pub mod errors;
pub mod exposures;
pub mod report;
pub mod request;
pub mod returns;
pub mod tracking;
pub mod var_es;

#[cfg(test)]
mod engine_tests;

pub use attribution::{variance_attribution, CONVENTION_COMPONENT};
pub use covariance::{sample_covariance, CovarianceResult, SYMMETRY_TOLERANCE};
pub use drawdown::{drawdown, DrawdownResult};
pub use engine::{RiskEngine, RiskInputs, QUANTILE_INTERPOLATION};
pub use errors::RiskError;
pub use exposures::{attribution_weights, exposures_from_valuation};
pub use report::{
    confidence_key, AssetExposure, CovarianceDiagnostics, CurrencyExposure, RiskAttribution,
    RiskConventions, RiskExposures, RiskMetrics, RiskReport, RiskWarning, RISK_REPORT_VERSION,
};
pub use request::{
    CovarianceEstimator, InputMode, ReturnDefinition, RiskMissingPolicy, RiskRequest, RiskWindow,
};
pub use returns::{build_returns, AlignedSeries};
pub use tracking::{annualized_volatility, tracking_error_annualized};
pub use var_es::{empirical_quantile, historical_var_es, VarEsResult};
