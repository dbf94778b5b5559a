//! The risk engine pipeline.
//!
//! Stages: validate inputs → build returns → portfolio returns →
//! volatility → covariance → drawdown → tracking error → VaR/ES →
//! exposures → attribution → report assembly. Every stage is a pure
//! function of its inputs; the report carries full lineage.

use std::collections::BTreeMap;

use tracing::debug;

use crate::access::bundle::TimeSeriesBundle;
use crate::access::request::Field;
use crate::core::cancel::CancelToken;
use crate::core::identity::MarketDataId;
use crate::instruments::instrument::Instrument;
use crate::instruments::portfolio::Portfolio;
use crate::pricing::valuation::PortfolioValuation;
use crate::report::lineage::InputLineage;
use crate::risk::attribution::variance_attribution;
use crate::risk::covariance::sample_covariance;
use crate::risk::drawdown::drawdown;
use crate::risk::errors::RiskError;
use crate::risk::exposures::{attribution_weights, exposures_from_valuation};
use crate::risk::report::{
    RiskConventions, RiskMetrics, RiskReport, RiskWarning, RISK_REPORT_VERSION,
};
use crate::risk::request::{InputMode, RiskMissingPolicy, RiskRequest};
use crate::risk::returns::{build_returns, AlignedSeries};
use crate::risk::tracking::{annualized_volatility, tracking_error_annualized};
use crate::risk::var_es::historical_var_es;

pub const QUANTILE_INTERPOLATION: &str = "linear between ascending order statistics, h = (n-1) * level";

/// Everything a risk computation consumes.
pub struct RiskInputs<'a> {
    pub portfolio: &'a Portfolio,
    pub instruments: &'a BTreeMap<String, Instrument>,
    pub bundle: &'a TimeSeriesBundle,
    /// Valuation snapshot supplying exposure weights.
    pub valuation: Option<&'a PortfolioValuation>,
    /// Pre-computed portfolio return series for `PORTFOLIO_RETURNS` mode.
    pub portfolio_returns: Option<&'a [Option<f64>]>,
    /// Benchmark asset (must be present in the bundle) for tracking error.
    pub benchmark: Option<&'a MarketDataId>,
}

#[derive(Default)]
pub struct RiskEngine {
    /// Cooperative cancellation, polled between pipeline stages.
    pub cancel: Option<CancelToken>,
}

impl RiskEngine {
    fn check_cancelled(&self, stage: &'static str) -> Result<(), RiskError> {
        if matches!(self.cancel, Some(ref token) if token.is_cancelled()) {
            return Err(RiskError::Cancelled { stage });
        }
        Ok(())
    }

    pub fn compute(
        &self,
        request: &RiskRequest,
        inputs: &RiskInputs<'_>,
    ) -> Result<RiskReport, RiskError> {
        request.validate()?;
        let mut warnings: Vec<RiskWarning> = Vec::new();

        // Stage 1: input validation and anti-look-ahead window.
        let portfolio_assets = self.portfolio_assets(inputs)?;
        let bundle_assets = inputs.bundle.data.assets();
        for asset in &portfolio_assets {
            if !bundle_assets.contains(asset) {
                return Err(RiskError::UnknownAsset {
                    asset_id: asset.as_str().to_string(),
                });
            }
        }
        if let Some(end) = request.window.end {
            if request.as_of > end {
                return Err(RiskError::InvalidRequest {
                    detail: format!(
                        "as_of {} must be on or before window end {end}",
                        request.as_of
                    ),
                });
            }
        }
        let prices = self.windowed_prices(request, inputs)?;
        if let Some(last) = prices.dates.last() {
            if *last > request.as_of {
                return Err(RiskError::LookAhead {
                    as_of: request.as_of.to_string(),
                    offending_date: last.to_string(),
                });
            }
        }

        // Stage 2: asset returns.
        self.check_cancelled("returns")?;
        let (asset_returns, return_warnings) = build_returns(
            &prices,
            request.return_definition,
            request.missing_data_policy,
        )?;
        warnings.extend(return_warnings);
        debug!(
            rows = asset_returns.len(),
            assets = asset_returns.columns.len(),
            "risk.returns_built"
        );

        // Stage 3: portfolio returns per input mode.
        let portfolio_series = self.portfolio_returns(
            request,
            inputs,
            &asset_returns,
            &portfolio_assets,
            &mut warnings,
        )?;
        let clean_portfolio: Vec<f64> = portfolio_series.iter().flatten().copied().collect();

        // Stages 4-9: metrics.
        self.check_cancelled("covariance")?;
        let vol = annualized_volatility(&clean_portfolio, request.annualization_factor)?;
        let restricted = restrict_assets(&asset_returns, &portfolio_assets);
        let covariance = sample_covariance(
            &restricted,
            Some(request.annualization_factor),
            request.missing_data_policy == RiskMissingPolicy::Partial,
        )?;
        warnings.extend(covariance.warnings.iter().cloned());
        let drawdown_result = drawdown(&clean_portfolio, request.return_definition)?;
        let tracking_error = match inputs.benchmark {
            Some(benchmark) => {
                let benchmark_returns =
                    asset_returns
                        .columns
                        .get(benchmark)
                        .ok_or_else(|| RiskError::BenchmarkMissing {
                            detail: format!("benchmark '{benchmark}' not in the bundle"),
                        })?;
                let (te, te_warnings) = tracking_error_annualized(
                    &portfolio_series,
                    benchmark_returns,
                    request.annualization_factor,
                    request.missing_data_policy,
                )?;
                warnings.extend(te_warnings);
                Some(te)
            }
            None => None,
        };
        self.check_cancelled("var_es")?;
        let tail = historical_var_es(&clean_portfolio, &request.sorted_confidence_levels())?;
        warnings.extend(tail.warnings.iter().cloned());

        // Stages 10-11: exposures and attribution.
        let exposures = inputs
            .valuation
            .map(exposures_from_valuation)
            .transpose()?;
        let attribution = match inputs.valuation {
            Some(valuation) => {
                let weights = attribution_weights(valuation)?;
                let weights: BTreeMap<MarketDataId, f64> = weights
                    .into_iter()
                    .filter(|(asset, _)| portfolio_assets.contains(asset))
                    .collect();
                Some(variance_attribution(&weights, &covariance)?)
            }
            None => None,
        };

        // Stages 12-13: lineage and assembly.
        let mut lineage = InputLineage::default()
            .with_request_hash(request.request_hash()?)
            .with_bundle_hash(inputs.bundle.bundle_hash().map_err(|err| {
                RiskError::InvalidRequest {
                    detail: err.to_string(),
                }
            })?)
            .with_dataset_version(inputs.bundle.lineage.dataset_version.clone());
        lineage.portfolio_snapshot_hash = Some(
            inputs
                .portfolio
                .snapshot_hash()
                .map_err(|err| RiskError::InvalidRequest {
                    detail: err.to_string(),
                })?,
        );
        if let Some(benchmark) = inputs.benchmark {
            lineage = lineage.with_benchmark(benchmark.as_str(), None);
        }
        if let Some(ref extra) = request.lineage {
            lineage.extra.extend(extra.clone());
        }

        Ok(RiskReport {
            report_version: RISK_REPORT_VERSION.to_string(),
            as_of: request.as_of,
            window: request.window.clone(),
            conventions: RiskConventions {
                return_definition: request.return_definition,
                annualization_factor: request.annualization_factor,
                input_mode: request.input_mode,
                missing_data_policy: request.missing_data_policy,
                quantile_interpolation: QUANTILE_INTERPOLATION.to_string(),
            },
            input_lineage: lineage,
            metrics: RiskMetrics {
                portfolio_vol_annualized: Some(vol),
                max_drawdown: Some(drawdown_result.max_drawdown),
                time_to_recovery: drawdown_result.time_to_recovery,
                tracking_error_annualized: tracking_error,
                var: Some(tail.var),
                es: Some(tail.es),
                covariance_diagnostics: Some(covariance.diagnostics.clone()),
            },
            exposures,
            attribution,
            warnings,
        })
    }

    fn portfolio_assets(&self, inputs: &RiskInputs<'_>) -> Result<Vec<MarketDataId>, RiskError> {
        let mut assets = Vec::new();
        for position in &inputs.portfolio.positions {
            let instrument = inputs
                .instruments
                .get(position.instrument_id.as_str())
                .ok_or_else(|| RiskError::UnknownAsset {
                    asset_id: position.instrument_id.as_str().to_string(),
                })?;
            if let Some(ref market_data_id) = instrument.market_data_id {
                if !assets.contains(market_data_id) {
                    assets.push(market_data_id.clone());
                }
            }
        }
        if assets.is_empty() {
            return Err(RiskError::InvalidRequest {
                detail: "portfolio holds no market-data-bearing positions".to_string(),
            });
        }
        assets.sort();
        Ok(assets)
    }

    fn windowed_prices(
        &self,
        request: &RiskRequest,
        inputs: &RiskInputs<'_>,
    ) -> Result<AlignedSeries, RiskError> {
        let prices = AlignedSeries::from_bundle(inputs.bundle, Field::Close);
        let truncated = prices.truncate_after(request.as_of);
        if truncated.is_empty() {
            return Err(RiskError::InsufficientSample {
                rows: 0,
                required: 2,
                context: "prices at or before as_of".to_string(),
            });
        }
        let windowed = if let Some(lookback) = request.window.lookback_trading_days {
            // `lookback` returns need one extra price row.
            truncated.tail(lookback + 1)
        } else {
            let start = request.window.start.unwrap_or(truncated.dates[0]);
            let end = request.window.end.unwrap_or(request.as_of).min(request.as_of);
            truncated.between(start, end)
        };
        Ok(windowed)
    }

    fn portfolio_returns(
        &self,
        request: &RiskRequest,
        inputs: &RiskInputs<'_>,
        asset_returns: &AlignedSeries,
        portfolio_assets: &[MarketDataId],
        warnings: &mut Vec<RiskWarning>,
    ) -> Result<Vec<Option<f64>>, RiskError> {
        match request.input_mode {
            InputMode::PortfolioReturns => {
                let series = inputs.portfolio_returns.ok_or_else(|| {
                    RiskError::InvalidRequest {
                        detail: "PORTFOLIO_RETURNS mode requires a portfolio return series"
                            .to_string(),
                    }
                })?;
                if series.len() != asset_returns.len() {
                    return Err(RiskError::InvalidRequest {
                        detail: format!(
                            "portfolio return series length {} does not match the window ({})",
                            series.len(),
                            asset_returns.len()
                        ),
                    });
                }
                Ok(series.to_vec())
            }
            InputMode::StaticWeightsXAssetReturns => {
                warnings.push(RiskWarning::new(
                    "STATIC_WEIGHTS_APPROXIMATION",
                    "approximation ignores intra-window rebalancing",
                    [],
                ));
                let valuation = inputs.valuation.ok_or_else(|| RiskError::InvalidRequest {
                    detail: "static-weights mode requires a valuation snapshot".to_string(),
                })?;
                let weights = attribution_weights(valuation)?;
                let mut series = Vec::with_capacity(asset_returns.len());
                for row in 0..asset_returns.len() {
                    let mut accumulator = 0.0;
                    let mut complete = true;
                    for asset in portfolio_assets {
                        let weight = weights.get(asset).copied().unwrap_or(0.0);
                        match asset_returns.columns.get(asset).and_then(|column| column[row]) {
                            Some(ret) => accumulator += weight * ret,
                            None => {
                                complete = false;
                                break;
                            }
                        }
                    }
                    series.push(if complete { Some(accumulator) } else { None });
                }
                Ok(series)
            }
        }
    }
}

/// Restrict a return frame to the given assets.
fn restrict_assets(returns: &AlignedSeries, assets: &[MarketDataId]) -> AlignedSeries {
    let mut restricted = AlignedSeries::new(returns.dates.clone());
    for asset in assets {
        if let Some(column) = returns.columns.get(asset) {
            restricted.columns.insert(asset.clone(), column.clone());
        }
    }
    restricted
}
