//! Stress engine errors.

#[derive(Debug, Clone, PartialEq)]
pub enum StressError {
    /// Malformed scenario or scenario set.
    Scenario { detail: String },
    /// Missing or invalid market state / portfolio input.
    Input { detail: String },
    /// A portfolio asset lacks an as-of price in the market state.
    MissingMarketState { asset_id: String },
    /// A shock is absent under the `ERROR` policy.
    MissingShock { scenario_id: String, asset_id: String },
    /// Shock application produced an inadmissible price.
    InvalidShockedPrice {
        asset_id: String,
        price: f64,
        shock: f64,
        shocked_price: f64,
    },
    NonFinite { label: String },
}

impl std::fmt::Display for StressError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scenario { detail } => write!(f, "invalid scenario: {detail}"),
            Self::Input { detail } => write!(f, "invalid stress input: {detail}"),
            Self::MissingMarketState { asset_id } => {
                write!(f, "market state price missing for portfolio asset '{asset_id}'")
            }
            Self::MissingShock {
                scenario_id,
                asset_id,
            } => write!(f, "scenario '{scenario_id}' has no shock for asset '{asset_id}'"),
            Self::InvalidShockedPrice {
                asset_id,
                price,
                shock,
                shocked_price,
            } => write!(
                f,
                "shock {shock} on '{asset_id}' price {price} yields inadmissible {shocked_price}"
            ),
            Self::NonFinite { label } => write!(f, "{label} must be finite"),
        }
    }
}

impl std::error::Error for StressError {}
