//! Stress engine: scenarios, shocks, linear revaluation, reporting.

pub mod engine;
pub mod errors;
pub mod reval;
pub mod report;
pub mod scenario;
pub mod shocks;


pub use engine::StressEngine;
pub use errors::StressError;
pub use reval::linear_position_pnl;
pub use report::{
    PositionStressResult, ScenarioLoss, ScenarioResult, StressDriver, StressReport,
    StressSummary, StressWarning, NON_PROBABILISTIC_STATEMENT, STRESS_REPORT_VERSION,
};
pub use scenario::{MissingShockPolicy, Scenario, ScenarioSet, ShockConvention};
pub use shocks::{apply_shock_to_price, apply_shocks_to_prices};
