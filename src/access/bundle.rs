//! Aligned time-series bundle: data, per-asset metadata, quality, lineage.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::access::cache::LineageMeta;
use crate::access::errors::AccessError;
use crate::access::frame::DataFrame;
use crate::access::validate::QualityReport;
use crate::core::canonical::{content_hash, to_canonical_value};
use crate::core::identity::MarketDataId;

/// Provider-side identity of one asset in a bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetMeta {
    pub provider: String,
    pub provider_symbol: String,
}

/// The access-service result: aligned columns plus everything needed to
/// reproduce them.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesBundle {
    pub data: DataFrame,
    pub assets_meta: BTreeMap<MarketDataId, AssetMeta>,
    pub quality: QualityReport,
    pub lineage: LineageMeta,
}

impl TimeSeriesBundle {
    pub fn to_canonical_value(&self) -> Result<Value, AccessError> {
        Ok(serde_json::json!({
            "data": self.data.to_canonical_value(),
            "assets_meta": to_canonical_value(&self.assets_meta)?,
            "quality": to_canonical_value(&self.quality)?,
            "lineage": to_canonical_value(&self.lineage)?,
        }))
    }

    /// Content hash identifying this bundle in downstream report lineage.
    pub fn bundle_hash(&self) -> Result<String, AccessError> {
        Ok(content_hash(&self.to_canonical_value()?))
    }

    pub fn request_hash(&self) -> &str {
        &self.lineage.request_hash
    }
}
