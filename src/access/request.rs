//! Canonical time-series request and its deterministic fingerprint.
//!
//! The request hash is the cache identity: equal logical requests must
//! hash identically regardless of the order assets or fields were supplied
//! in. Canonicalization sorts every set-like field and fully includes all
//! policies plus `as_of`.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::access::errors::AccessError;
use crate::core::canonical::content_hash;
use crate::core::identity::MarketDataId;

/// Daily bar fields servable by the access layer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Close,
    High,
    Low,
    Open,
    Volume,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Close => "close",
            Self::High => "high",
            Self::Low => "low",
            Self::Open => "open",
            Self::Volume => "volume",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Market calendar selection. Only `MARKET` calendars exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarSpec {
    pub market: String,
}

impl CalendarSpec {
    pub fn market(market: impl Into<String>) -> Result<Self, AccessError> {
        let market = market.into();
        if market.is_empty() {
            return Err(AccessError::InvalidRequest {
                detail: "calendar market must be non-empty".to_string(),
            });
        }
        Ok(Self { market })
    }

    fn to_canonical(&self) -> Value {
        json!({"kind": "MARKET", "market": self.market})
    }
}

/// Missing-data handling after calendar alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MissingPolicyKind {
    NanOk,
    DropDates,
    Error,
}

impl MissingPolicyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NanOk => "NAN_OK",
            Self::DropDates => "DROP_DATES",
            Self::Error => "ERROR",
        }
    }
}

/// What to do with an asset whose coverage falls below the minimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetDropPolicy {
    Error,
    DropAsset,
}

impl AssetDropPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::DropAsset => "DROP_ASSET",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingDataPolicy {
    pub policy: MissingPolicyKind,
    pub min_coverage: f64,
    pub asset_drop_policy: AssetDropPolicy,
}

impl Default for MissingDataPolicy {
    fn default() -> Self {
        Self {
            policy: MissingPolicyKind::NanOk,
            min_coverage: 0.98,
            asset_drop_policy: AssetDropPolicy::Error,
        }
    }
}

impl MissingDataPolicy {
    pub fn new(
        policy: MissingPolicyKind,
        min_coverage: f64,
        asset_drop_policy: AssetDropPolicy,
    ) -> Result<Self, AccessError> {
        if !(min_coverage > 0.0 && min_coverage <= 1.0) {
            return Err(AccessError::InvalidRequest {
                detail: format!("min_coverage must be in (0, 1], got {min_coverage}"),
            });
        }
        Ok(Self {
            policy,
            min_coverage,
            asset_drop_policy,
        })
    }

    fn to_canonical(&self) -> Value {
        json!({
            "policy": self.policy.as_str(),
            "min_coverage": self.min_coverage,
            "asset_drop_policy": self.asset_drop_policy.as_str(),
        })
    }
}

/// Duplicate-date resolution discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeduplicatePolicy {
    Error,
    Last,
    First,
}

impl DeduplicatePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Last => "LAST",
            Self::First => "FIRST",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationPolicy {
    pub no_nonpositive_prices: bool,
    pub deduplicate: DeduplicatePolicy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_abs_return: Option<f64>,
    pub corp_action_jump_threshold: f64,
    pub monotonic_index: bool,
    pub type_checks: bool,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            no_nonpositive_prices: true,
            deduplicate: DeduplicatePolicy::Last,
            max_abs_return: None,
            corp_action_jump_threshold: 0.40,
            monotonic_index: true,
            type_checks: true,
        }
    }
}

impl ValidationPolicy {
    pub fn validated(self) -> Result<Self, AccessError> {
        if let Some(max_abs_return) = self.max_abs_return {
            if max_abs_return <= 0.0 {
                return Err(AccessError::InvalidRequest {
                    detail: "max_abs_return must be positive when set".to_string(),
                });
            }
        }
        if self.corp_action_jump_threshold <= 0.0 {
            return Err(AccessError::InvalidRequest {
                detail: "corp_action_jump_threshold must be positive".to_string(),
            });
        }
        Ok(self)
    }

    fn to_canonical(&self) -> Value {
        json!({
            "no_nonpositive_prices": self.no_nonpositive_prices,
            "deduplicate": self.deduplicate.as_str(),
            "max_abs_return": self.max_abs_return,
            "corp_action_jump_threshold": self.corp_action_jump_threshold,
            "monotonic_index": self.monotonic_index,
            "type_checks": self.type_checks,
        })
    }
}

/// Canonical request for aligned daily market data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesRequest {
    pub assets: Vec<MarketDataId>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub fields: BTreeSet<Field>,
    pub calendar: CalendarSpec,
    pub missing: MissingDataPolicy,
    pub validate: ValidationPolicy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub as_of: Option<DateTime<Utc>>,
}

impl TimeSeriesRequest {
    pub fn new(
        assets: Vec<MarketDataId>,
        start: NaiveDate,
        end: NaiveDate,
        fields: BTreeSet<Field>,
        calendar: CalendarSpec,
        missing: MissingDataPolicy,
        validate: ValidationPolicy,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<Self, AccessError> {
        if assets.is_empty() {
            return Err(AccessError::InvalidRequest {
                detail: "assets must be non-empty".to_string(),
            });
        }
        if start > end {
            return Err(AccessError::InvalidRequest {
                detail: format!("start {start} must be on or before end {end}"),
            });
        }
        if fields.is_empty() {
            return Err(AccessError::InvalidRequest {
                detail: "fields must be non-empty".to_string(),
            });
        }
        Ok(Self {
            assets,
            start,
            end,
            fields,
            calendar,
            missing,
            validate: validate.validated()?,
            as_of,
        })
    }

    /// Close-only request with default policies.
    pub fn close_daily(
        assets: Vec<MarketDataId>,
        start: NaiveDate,
        end: NaiveDate,
        market: &str,
    ) -> Result<Self, AccessError> {
        Self::new(
            assets,
            start,
            end,
            BTreeSet::from([Field::Close]),
            CalendarSpec::market(market)?,
            MissingDataPolicy::default(),
            ValidationPolicy::default(),
            None,
        )
    }

    /// Fields in canonical (sorted) order.
    pub fn sorted_fields(&self) -> Vec<Field> {
        self.fields.iter().copied().collect()
    }

    /// Order-invariant canonical dict: the hashing and manifest identity.
    pub fn to_canonical_value(&self) -> Value {
        let mut assets: Vec<String> = self
            .assets
            .iter()
            .map(|asset| asset.as_str().to_string())
            .collect();
        assets.sort();
        let fields: Vec<&str> = self.sorted_fields().iter().map(Field::as_str).collect();
        json!({
            "assets": assets,
            "start": self.start.to_string(),
            "end": self.end.to_string(),
            "frequency": "1D",
            "fields": fields,
            "price_type": "raw",
            "calendar": self.calendar.to_canonical(),
            "timezone": "UTC",
            "alignment": {"index_mode": "TARGET_CALENDAR"},
            "missing": self.missing.to_canonical(),
            "validate": self.validate.to_canonical(),
            "as_of": self.as_of.map(|ts| ts.to_rfc3339()),
        })
    }

    /// Deterministic SHA-256 of the canonical dict.
    pub fn request_hash(&self) -> String {
        content_hash(&self.to_canonical_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn asset(id: &str) -> MarketDataId {
        MarketDataId::new(id).unwrap()
    }

    #[test]
    fn hash_is_invariant_under_asset_and_field_order() {
        let a = TimeSeriesRequest::new(
            vec![asset("EQ:SPY"), asset("EQ:AGG")],
            d(2024, 1, 2),
            d(2024, 1, 5),
            BTreeSet::from([Field::Close, Field::Open]),
            CalendarSpec::market("XNYS").unwrap(),
            MissingDataPolicy::default(),
            ValidationPolicy::default(),
            None,
        )
        .unwrap();
        let b = TimeSeriesRequest::new(
            vec![asset("EQ:AGG"), asset("EQ:SPY")],
            d(2024, 1, 2),
            d(2024, 1, 5),
            BTreeSet::from([Field::Open, Field::Close]),
            CalendarSpec::market("XNYS").unwrap(),
            MissingDataPolicy::default(),
            ValidationPolicy::default(),
            None,
        )
        .unwrap();
        assert_eq!(a.request_hash(), b.request_hash());
    }

    #[test]
    fn as_of_participates_in_the_hash() {
        let base = TimeSeriesRequest::close_daily(
            vec![asset("EQ:SPY")],
            d(2024, 1, 2),
            d(2024, 1, 5),
            "XNYS",
        )
        .unwrap();
        let mut pinned = base.clone();
        pinned.as_of = Some(chrono::Utc::now());
        assert_ne!(base.request_hash(), pinned.request_hash());
    }

    #[test]
    fn policy_bounds_are_enforced() {
        assert!(MissingDataPolicy::new(MissingPolicyKind::NanOk, 0.0, AssetDropPolicy::Error)
            .is_err());
        assert!(MissingDataPolicy::new(MissingPolicyKind::NanOk, 1.0, AssetDropPolicy::Error)
            .is_ok());
        let mut policy = ValidationPolicy::default();
        policy.corp_action_jump_threshold = -0.1;
        assert!(policy.validated().is_err());
    }

    #[test]
    fn empty_assets_or_inverted_range_rejected() {
        assert!(
            TimeSeriesRequest::close_daily(vec![], d(2024, 1, 2), d(2024, 1, 5), "XNYS").is_err()
        );
        assert!(TimeSeriesRequest::close_daily(
            vec![asset("EQ:SPY")],
            d(2024, 1, 5),
            d(2024, 1, 2),
            "XNYS"
        )
        .is_err());
    }
}
