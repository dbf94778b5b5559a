//! Input lineage shared by valuation, risk, and stress reports.
//!
//! Reports reference their inputs exclusively by content hash and dataset
//! version tuple; nothing else is needed to reproduce them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Content-hash references to everything a report consumed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputLineage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portfolio_snapshot_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_data_bundle_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub benchmark_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub benchmark_hash: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl InputLineage {
    pub fn with_portfolio_hash(mut self, hash: impl Into<String>) -> Self {
        self.portfolio_snapshot_hash = Some(hash.into());
        self
    }

    pub fn with_bundle_hash(mut self, hash: impl Into<String>) -> Self {
        self.market_data_bundle_hash = Some(hash.into());
        self
    }

    pub fn with_request_hash(mut self, hash: impl Into<String>) -> Self {
        self.request_hash = Some(hash.into());
        self
    }

    pub fn with_dataset_version(mut self, version: impl Into<String>) -> Self {
        self.dataset_version = Some(version.into());
        self
    }

    pub fn with_benchmark(
        mut self,
        benchmark_id: impl Into<String>,
        benchmark_hash: Option<String>,
    ) -> Self {
        self.benchmark_id = Some(benchmark_id.into());
        self.benchmark_hash = benchmark_hash;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_fields_are_omitted_from_serialization() {
        let lineage = InputLineage::default().with_request_hash("abc");
        let value = serde_json::to_value(&lineage).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 1);
        assert_eq!(object["request_hash"], "abc");
    }
}
