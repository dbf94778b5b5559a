//! Scenario models and the order-invariant scenario-set hash.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::core::canonical::{content_hash, to_canonical_value};
use crate::core::identity::MarketDataId;
use crate::stress::errors::StressError;

/// How a shock value maps to a shocked price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShockConvention {
    /// `P' = P * (1 + shock)`.
    MultReturn,
    /// `P' = P * shock`.
    MultFactor,
}

impl ShockConvention {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MultReturn => "MULT_RETURN",
            Self::MultFactor => "MULT_FACTOR",
        }
    }
}

/// Behavior when a portfolio asset has no shock in a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MissingShockPolicy {
    ZeroWithWarning,
    Error,
}

/// Tagged scenario variants; each carries a full shock vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Scenario {
    ParametricShock {
        scenario_id: String,
        name: String,
        shock_convention: ShockConvention,
        shock_vector: BTreeMap<MarketDataId, f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tags: Option<Vec<String>>,
    },
    CustomShockVector {
        scenario_id: String,
        name: String,
        shock_convention: ShockConvention,
        shock_vector: BTreeMap<MarketDataId, f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tags: Option<Vec<String>>,
    },
    /// The vector must be materialized upstream; the stress engine never
    /// fetches history.
    HistoricalShock {
        scenario_id: String,
        name: String,
        period_tag: String,
        shock_convention: ShockConvention,
        shock_vector: BTreeMap<MarketDataId, f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tags: Option<Vec<String>>,
    },
}

impl Scenario {
    pub fn scenario_id(&self) -> &str {
        match self {
            Self::ParametricShock { scenario_id, .. }
            | Self::CustomShockVector { scenario_id, .. }
            | Self::HistoricalShock { scenario_id, .. } => scenario_id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::ParametricShock { name, .. }
            | Self::CustomShockVector { name, .. }
            | Self::HistoricalShock { name, .. } => name,
        }
    }

    pub fn shock_convention(&self) -> ShockConvention {
        match self {
            Self::ParametricShock {
                shock_convention, ..
            }
            | Self::CustomShockVector {
                shock_convention, ..
            }
            | Self::HistoricalShock {
                shock_convention, ..
            } => *shock_convention,
        }
    }

    pub fn shock_vector(&self) -> &BTreeMap<MarketDataId, f64> {
        match self {
            Self::ParametricShock { shock_vector, .. }
            | Self::CustomShockVector { shock_vector, .. }
            | Self::HistoricalShock { shock_vector, .. } => shock_vector,
        }
    }

    fn tags_mut(&mut self) -> &mut Option<Vec<String>> {
        match self {
            Self::ParametricShock { tags, .. }
            | Self::CustomShockVector { tags, .. }
            | Self::HistoricalShock { tags, .. } => tags,
        }
    }

    pub fn validate(&self) -> Result<(), StressError> {
        if self.scenario_id().trim().is_empty() || self.name().trim().is_empty() {
            return Err(StressError::Scenario {
                detail: "scenario_id and name must be non-empty".to_string(),
            });
        }
        if self.shock_vector().is_empty() {
            return Err(StressError::Scenario {
                detail: format!("scenario '{}' has an empty shock_vector", self.scenario_id()),
            });
        }
        for (asset, shock) in self.shock_vector() {
            if !shock.is_finite() {
                return Err(StressError::NonFinite {
                    label: format!("shock[{asset}]"),
                });
            }
        }
        if let Self::HistoricalShock { period_tag, .. } = self {
            if period_tag.trim().is_empty() {
                return Err(StressError::Scenario {
                    detail: "period_tag must be non-empty".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Normalize tags: trimmed, unique, sorted.
    fn canonicalize_tags(&mut self) -> Result<(), StressError> {
        if let Some(tags) = self.tags_mut().take() {
            let mut cleaned: BTreeSet<String> = BTreeSet::new();
            for tag in tags {
                let tag = tag.trim().to_string();
                if tag.is_empty() {
                    return Err(StressError::Scenario {
                        detail: "tags must be non-empty strings".to_string(),
                    });
                }
                cleaned.insert(tag);
            }
            *self.tags_mut() = Some(cleaned.into_iter().collect());
        }
        Ok(())
    }
}

/// A set of scenarios evaluated against one as-of market state.
///
/// Scenarios are stored sorted by `scenario_id`, so the canonical hash and
/// the report order are independent of insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSet {
    pub as_of: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shock_convention: Option<ShockConvention>,
    pub missing_shock_policy: MissingShockPolicy,
    pub scenarios: Vec<Scenario>,
}

impl ScenarioSet {
    pub fn new(
        as_of: NaiveDate,
        shock_convention: Option<ShockConvention>,
        missing_shock_policy: MissingShockPolicy,
        mut scenarios: Vec<Scenario>,
    ) -> Result<Self, StressError> {
        if scenarios.is_empty() {
            return Err(StressError::Scenario {
                detail: "scenarios must be non-empty".to_string(),
            });
        }
        for scenario in scenarios.iter_mut() {
            scenario.validate()?;
            scenario.canonicalize_tags()?;
        }
        scenarios.sort_by(|a, b| a.scenario_id().cmp(b.scenario_id()));
        for pair in scenarios.windows(2) {
            if pair[0].scenario_id() == pair[1].scenario_id() {
                return Err(StressError::Scenario {
                    detail: format!("duplicate scenario_id '{}'", pair[0].scenario_id()),
                });
            }
        }
        if let Some(expected) = shock_convention {
            for scenario in &scenarios {
                if scenario.shock_convention() != expected {
                    return Err(StressError::Scenario {
                        detail: format!(
                            "scenario '{}' convention does not match the set convention",
                            scenario.scenario_id()
                        ),
                    });
                }
            }
        }
        Ok(Self {
            as_of,
            shock_convention,
            missing_shock_policy,
            scenarios,
        })
    }

    /// Canonical hash: invariant under scenario insertion order.
    pub fn canonical_hash(&self) -> Result<String, StressError> {
        let value = to_canonical_value(self).map_err(|err| StressError::Scenario {
            detail: err.to_string(),
        })?;
        Ok(content_hash(&value))
    }
}
