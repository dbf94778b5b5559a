//! Stress report schema.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::core::canonical::{content_hash, to_canonical_value};
use crate::core::identity::{Currency, InstrumentId, MarketDataId};
use crate::report::lineage::InputLineage;
use crate::stress::errors::StressError;
use crate::stress::scenario::{MissingShockPolicy, ShockConvention};

pub const STRESS_REPORT_VERSION: &str = "1.0";

/// Mandatory statement carried on every stress report.
pub const NON_PROBABILISTIC_STATEMENT: &str =
    "scenario-set metrics are not probabilities and are not VaR";

/// Structured soft issue on a stress result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressWarning {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
}

/// P&L of one position under one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionStressResult {
    pub instrument_id: InstrumentId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_data_id: Option<MarketDataId>,
    pub instrument_kind: String,
    pub quantity: f64,
    pub pnl: f64,
}

/// One scenario's outcome with reconciling breakdowns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_id: String,
    pub name: String,
    pub portfolio_pnl: f64,
    pub by_position: Vec<PositionStressResult>,
    pub by_market_data: BTreeMap<MarketDataId, f64>,
    pub by_currency: BTreeMap<Currency, f64>,
    pub warnings: Vec<StressWarning>,
}

/// One ranked loss entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioLoss {
    pub scenario_id: String,
    pub portfolio_pnl: f64,
}

/// One ranked driver entry (from the worst scenario).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressDriver {
    pub market_data_id: MarketDataId,
    pub contribution: f64,
}

/// Worst-case summary across the scenario set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressSummary {
    pub max_loss: f64,
    pub max_loss_scenario_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_loss_return: Option<f64>,
    pub top_k_losses: Vec<ScenarioLoss>,
    pub top_drivers: Vec<StressDriver>,
}

/// The assembled stress report; scenario results are ordered by
/// `scenario_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressReport {
    pub report_version: String,
    pub as_of: NaiveDate,
    pub scenario_set_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shock_convention: Option<ShockConvention>,
    pub missing_shock_policy: MissingShockPolicy,
    pub results: Vec<ScenarioResult>,
    pub summary: StressSummary,
    pub statement: String,
    pub input_lineage: InputLineage,
}

impl StressReport {
    pub fn to_canonical_value(&self) -> Result<serde_json::Value, StressError> {
        to_canonical_value(self).map_err(|err| StressError::Input {
            detail: err.to_string(),
        })
    }

    pub fn report_hash(&self) -> Result<String, StressError> {
        Ok(content_hash(&self.to_canonical_value()?))
    }
}
