//! Canonical JSON encoding and content hashing.
//!
//! Every identity in the system (request hashes, snapshot content hashes,
//! portfolio snapshot hashes, scenario-set hashes) is derived by one
//! routine: normalize to a canonical `serde_json::Value`, encode with sorted
//! keys and compact separators, and hash the UTF-8 bytes with SHA-256.
//! Using a single entry point is what keeps hashes from drifting between
//! subsystems.
//!
//! Canonical form:
//! - object keys sorted lexicographically (`serde_json`'s default map is
//!   ordered, so encoding is deterministic once values are normalized)
//! - set-like collections sorted by their canonical encoding
//! - dates and timestamps as ISO-8601 strings with explicit UTC offset
//! - enums by their stable string value
//! - numbers finite only; non-finite floats are rejected before encoding

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::core::errors::SchemaError;

/// Build a JSON number from a float, rejecting NaN and infinities.
///
/// `serde_json` silently encodes non-finite floats as `null`, which would
/// corrupt hashes; every hand-built canonical dict goes through this helper.
pub fn canonical_number(value: f64) -> Result<Value, SchemaError> {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .ok_or(SchemaError::NonFiniteValue {
            field: "number",
            value,
        })
}

/// Sort a collection of strings into a canonical JSON array.
pub fn sorted_string_array<I, S>(values: I) -> Value
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut items: Vec<String> = values.into_iter().map(Into::into).collect();
    items.sort();
    Value::Array(items.into_iter().map(Value::String).collect())
}

/// Encode a canonical value as compact JSON with sorted keys.
pub fn canonical_json(value: &Value) -> String {
    // Maps are BTreeMap-backed, so `to_string` already emits sorted keys
    // with compact separators.
    value.to_string()
}

/// SHA-256 hex digest of the canonical JSON encoding.
pub fn content_hash(value: &Value) -> String {
    hash_bytes(canonical_json(value).as_bytes())
}

/// SHA-256 hex digest of raw bytes.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Serialize any canonical model to a `Value`, surfacing encoding failures
/// as schema errors.
pub fn to_canonical_value<T: serde::Serialize>(model: &T) -> Result<Value, SchemaError> {
    serde_json::to_value(model).map_err(|err| SchemaError::Serialization {
        detail: err.to_string(),
    })
}
