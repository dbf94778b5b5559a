//! Risk engine errors.

#[derive(Debug, Clone, PartialEq)]
pub enum RiskError {
    InvalidRequest { detail: String },
    /// Too few observations for the requested statistic.
    InsufficientSample { rows: usize, required: usize, context: String },
    /// Missing values under the `ERROR` policy.
    MissingValues { missing_count: usize, context: String },
    NonFinite { label: String },
    /// Data strictly after `as_of` would leak into the computation.
    LookAhead { as_of: String, offending_date: String },
    /// Portfolio references an asset the bundle does not carry.
    UnknownAsset { asset_id: String },
    BenchmarkMissing { detail: String },
    Attribution { detail: String },
    /// The computation's cancel token fired between stages.
    Cancelled { stage: &'static str },
}

impl std::fmt::Display for RiskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRequest { detail } => write!(f, "invalid risk request: {detail}"),
            Self::InsufficientSample {
                rows,
                required,
                context,
            } => write!(
                f,
                "insufficient sample for {context}: {rows} rows, {required} required"
            ),
            Self::MissingValues {
                missing_count,
                context,
            } => write!(f, "{context} contain {missing_count} missing values"),
            Self::NonFinite { label } => write!(f, "{label} contain non-finite values"),
            Self::LookAhead {
                as_of,
                offending_date,
            } => write!(
                f,
                "look-ahead violation: data at {offending_date} is after as_of {as_of}"
            ),
            Self::UnknownAsset { asset_id } => {
                write!(f, "portfolio asset '{asset_id}' not present in the bundle")
            }
            Self::BenchmarkMissing { detail } => write!(f, "benchmark unavailable: {detail}"),
            Self::Attribution { detail } => write!(f, "variance attribution failed: {detail}"),
            Self::Cancelled { stage } => write!(f, "risk computation cancelled before {stage}"),
        }
    }
}

impl std::error::Error for RiskError {}
