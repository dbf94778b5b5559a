//! The stress engine: deterministic scenario revaluation.

use std::collections::BTreeMap;

use tracing::debug;

use crate::core::identity::{Currency, MarketDataId};
use crate::instruments::instrument::Instrument;
use crate::instruments::portfolio::Portfolio;
use crate::report::lineage::InputLineage;
use crate::stress::errors::StressError;
use crate::stress::reval::linear_position_pnl;
use crate::stress::scenario::{MissingShockPolicy, Scenario, ScenarioSet};
use crate::stress::shocks::apply_shocks_to_prices;
use crate::stress::report::{
    PositionStressResult, ScenarioLoss, ScenarioResult, StressDriver, StressReport,
    StressSummary, StressWarning, NON_PROBABILISTIC_STATEMENT, STRESS_REPORT_VERSION,
};

const RECONCILIATION_TOLERANCE: f64 = 1e-9;

/// Linear stress revaluation over an as-of market state.
pub struct StressEngine {
    /// How many entries the loss/driver rankings carry.
    pub top_k: usize,
}

impl Default for StressEngine {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

impl StressEngine {
    pub fn run(
        &self,
        portfolio: &Portfolio,
        instruments: &BTreeMap<String, Instrument>,
        market_state: &BTreeMap<MarketDataId, f64>,
        scenario_set: &ScenarioSet,
        nav_base: Option<f64>,
        lineage: Option<InputLineage>,
    ) -> Result<StressReport, StressError> {
        let resolved = self.resolve_positions(portfolio, instruments)?;
        let portfolio_assets = self.validate_market_state(&resolved, market_state)?;

        let mut results = Vec::with_capacity(scenario_set.scenarios.len());
        for scenario in &scenario_set.scenarios {
            results.push(self.run_scenario(
                scenario,
                scenario_set.missing_shock_policy,
                &resolved,
                &portfolio_assets,
                market_state,
            )?);
        }
        // Scenario sets are already ordered by id; keep the report order
        // canonical regardless of how the set was built.
        results.sort_by(|a, b| a.scenario_id.cmp(&b.scenario_id));

        let summary = self.summarize(&results, nav_base)?;
        let mut input_lineage = lineage.unwrap_or_default();
        input_lineage
            .extra
            .insert("scenario_set_hash".to_string(), scenario_set.canonical_hash()?);
        if input_lineage.portfolio_snapshot_hash.is_none() {
            input_lineage.portfolio_snapshot_hash =
                Some(portfolio.snapshot_hash().map_err(|err| StressError::Input {
                    detail: err.to_string(),
                })?);
        }

        Ok(StressReport {
            report_version: STRESS_REPORT_VERSION.to_string(),
            as_of: scenario_set.as_of,
            scenario_set_hash: scenario_set.canonical_hash()?,
            shock_convention: scenario_set.shock_convention,
            missing_shock_policy: scenario_set.missing_shock_policy,
            results,
            summary,
            statement: NON_PROBABILISTIC_STATEMENT.to_string(),
            input_lineage,
        })
    }

    fn resolve_positions<'a>(
        &self,
        portfolio: &'a Portfolio,
        instruments: &'a BTreeMap<String, Instrument>,
    ) -> Result<Vec<(&'a crate::instruments::portfolio::Position, &'a Instrument)>, StressError>
    {
        let mut resolved = Vec::with_capacity(portfolio.positions.len());
        for position in &portfolio.positions {
            let instrument = instruments
                .get(position.instrument_id.as_str())
                .ok_or_else(|| StressError::Input {
                    detail: format!(
                        "missing instrument for instrument_id={}",
                        position.instrument_id
                    ),
                })?;
            resolved.push((position, instrument));
        }
        Ok(resolved)
    }

    /// Every market-data-bearing position needs a finite as-of price.
    fn validate_market_state(
        &self,
        resolved: &[(&crate::instruments::portfolio::Position, &Instrument)],
        market_state: &BTreeMap<MarketDataId, f64>,
    ) -> Result<Vec<MarketDataId>, StressError> {
        let mut assets = Vec::new();
        for (_, instrument) in resolved {
            if let Some(ref asset) = instrument.market_data_id {
                let price =
                    market_state
                        .get(asset)
                        .ok_or_else(|| StressError::MissingMarketState {
                            asset_id: asset.as_str().to_string(),
                        })?;
                if !price.is_finite() || *price <= 0.0 {
                    return Err(StressError::Input {
                        detail: format!("market state price for '{asset}' must be finite and > 0"),
                    });
                }
                if !assets.contains(asset) {
                    assets.push(asset.clone());
                }
            }
        }
        assets.sort();
        Ok(assets)
    }

    fn run_scenario(
        &self,
        scenario: &Scenario,
        missing_shock_policy: MissingShockPolicy,
        resolved: &[(&crate::instruments::portfolio::Position, &Instrument)],
        portfolio_assets: &[MarketDataId],
        market_state: &BTreeMap<MarketDataId, f64>,
    ) -> Result<ScenarioResult, StressError> {
        let mut warnings = Vec::new();

        // Effective shock vector over the portfolio's assets.
        let mut effective: BTreeMap<MarketDataId, f64> = BTreeMap::new();
        let mut unshocked: Vec<String> = Vec::new();
        for asset in portfolio_assets {
            match scenario.shock_vector().get(asset) {
                Some(shock) => {
                    effective.insert(asset.clone(), *shock);
                }
                None => match missing_shock_policy {
                    MissingShockPolicy::Error => {
                        return Err(StressError::MissingShock {
                            scenario_id: scenario.scenario_id().to_string(),
                            asset_id: asset.as_str().to_string(),
                        });
                    }
                    MissingShockPolicy::ZeroWithWarning => {
                        effective.insert(asset.clone(), 0.0);
                        unshocked.push(asset.as_str().to_string());
                    }
                },
            }
        }
        if !unshocked.is_empty() {
            warnings.push(StressWarning {
                code: "MISSING_SHOCK_ZEROED".to_string(),
                message: "Assets without a shock were held flat.".to_string(),
                context: BTreeMap::from([(
                    "assets".to_string(),
                    unshocked.join(","),
                )]),
            });
        }

        let base_prices: BTreeMap<MarketDataId, f64> = portfolio_assets
            .iter()
            .filter_map(|asset| market_state.get(asset).map(|price| (asset.clone(), *price)))
            .collect();
        let shocked_prices =
            apply_shocks_to_prices(&base_prices, &effective, scenario.shock_convention())?;

        let mut by_position = Vec::with_capacity(resolved.len());
        let mut by_market_data: BTreeMap<MarketDataId, f64> = BTreeMap::new();
        let mut by_currency: BTreeMap<Currency, f64> = BTreeMap::new();
        let mut portfolio_pnl = 0.0;
        for (position, instrument) in resolved {
            let pnl = linear_position_pnl(position, instrument, &base_prices, &shocked_prices)?;
            portfolio_pnl += pnl;
            by_position.push(PositionStressResult {
                instrument_id: position.instrument_id.clone(),
                market_data_id: instrument.market_data_id.clone(),
                instrument_kind: instrument.spec.kind().as_str().to_string(),
                quantity: position.quantity,
                pnl,
            });
            if let Some(ref asset) = instrument.market_data_id {
                *by_market_data.entry(asset.clone()).or_insert(0.0) += pnl;
            }
            if let Some(ref currency) = instrument.currency {
                *by_currency.entry(currency.clone()).or_insert(0.0) += pnl;
            }
        }
        by_position.sort_by(|a, b| a.instrument_id.cmp(&b.instrument_id));

        let position_total: f64 = by_position.iter().map(|result| result.pnl).sum();
        if (position_total - portfolio_pnl).abs() > RECONCILIATION_TOLERANCE {
            return Err(StressError::Input {
                detail: format!(
                    "position P&L {position_total} does not reconcile with portfolio P&L {portfolio_pnl}"
                ),
            });
        }
        debug!(
            scenario_id = scenario.scenario_id(),
            portfolio_pnl, "stress.scenario_done"
        );

        Ok(ScenarioResult {
            scenario_id: scenario.scenario_id().to_string(),
            name: scenario.name().to_string(),
            portfolio_pnl,
            by_position,
            by_market_data,
            by_currency,
            warnings,
        })
    }

    fn summarize(
        &self,
        results: &[ScenarioResult],
        nav_base: Option<f64>,
    ) -> Result<StressSummary, StressError> {
        let worst = results
            .iter()
            .min_by(|a, b| {
                a.portfolio_pnl
                    .partial_cmp(&b.portfolio_pnl)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .ok_or_else(|| StressError::Input {
                detail: "scenario set produced no results".to_string(),
            })?;
        let max_loss = worst.portfolio_pnl;
        let max_loss_return = match nav_base {
            Some(nav) if nav != 0.0 => Some(max_loss / nav),
            _ => None,
        };

        let mut ranked: Vec<&ScenarioResult> = results.iter().collect();
        ranked.sort_by(|a, b| {
            a.portfolio_pnl
                .partial_cmp(&b.portfolio_pnl)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.scenario_id.cmp(&b.scenario_id))
        });
        let top_k_losses = ranked
            .iter()
            .take(self.top_k)
            .map(|result| ScenarioLoss {
                scenario_id: result.scenario_id.clone(),
                portfolio_pnl: result.portfolio_pnl,
            })
            .collect();

        let mut drivers: Vec<StressDriver> = worst
            .by_market_data
            .iter()
            .map(|(asset, pnl)| StressDriver {
                market_data_id: asset.clone(),
                contribution: *pnl,
            })
            .collect();
        drivers.sort_by(|a, b| {
            b.contribution
                .abs()
                .partial_cmp(&a.contribution.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.market_data_id.cmp(&b.market_data_id))
        });
        drivers.truncate(self.top_k);

        Ok(StressSummary {
            max_loss,
            max_loss_scenario_id: worst.scenario_id.clone(),
            max_loss_return,
            top_k_losses,
            top_drivers: drivers,
        })
    }
}
