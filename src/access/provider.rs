//! Provider boundary of the access service.
//!
//! Providers return raw per-symbol daily rows; they perform no calendar
//! logic and no validation. The symbol mapper translates internal asset
//! ids to provider symbols and fails loudly on gaps.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::access::errors::AccessError;
use crate::access::request::Field;
use crate::core::identity::MarketDataId;

/// One provider observation. Fields the provider did not supply are absent.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRow {
    pub date: NaiveDate,
    pub values: BTreeMap<Field, f64>,
}

/// Raw rows for one symbol, in provider order (possibly unsorted, possibly
/// containing duplicate dates; the validation layer resolves those).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderSeries {
    pub rows: Vec<ProviderRow>,
}

/// Daily end-of-day data provider.
pub trait EodProvider {
    fn name(&self) -> &str;

    /// Fetch rows per provider symbol over an inclusive date range.
    /// Every requested symbol must be present in the result.
    fn fetch_eod(
        &self,
        provider_symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
        fields: &[Field],
    ) -> Result<BTreeMap<String, ProviderSeries>, AccessError>;
}

/// Internal asset id → provider symbol mapping.
#[derive(Debug, Clone, Default)]
pub struct SymbolMapper {
    mapping: BTreeMap<MarketDataId, String>,
}

impl SymbolMapper {
    pub fn new(mapping: BTreeMap<MarketDataId, String>) -> Self {
        Self { mapping }
    }

    pub fn resolve(&self, asset_id: &MarketDataId) -> Result<String, AccessError> {
        self.mapping
            .get(asset_id)
            .cloned()
            .ok_or_else(|| AccessError::MissingSymbolMapping {
                asset_id: asset_id.as_str().to_string(),
            })
    }

    /// Resolve all assets, preserving request order.
    pub fn resolve_many(
        &self,
        assets: &[MarketDataId],
    ) -> Result<Vec<(MarketDataId, String)>, AccessError> {
        assets
            .iter()
            .map(|asset| Ok((asset.clone(), self.resolve(asset)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_mapping_is_a_typed_failure() {
        let mapper = SymbolMapper::new(BTreeMap::from([(
            MarketDataId::new("EQ:SPY").unwrap(),
            "SPY".to_string(),
        )]));
        assert_eq!(mapper.resolve(&MarketDataId::new("EQ:SPY").unwrap()).unwrap(), "SPY");
        let err = mapper.resolve(&MarketDataId::new("EQ:AGG").unwrap()).unwrap_err();
        assert!(matches!(err, AccessError::MissingSymbolMapping { .. }));
    }
}
