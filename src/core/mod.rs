//! Canonical schema, identity, and deterministic hashing.
//!
//! Shared foundation for every subsystem: validated identifier newtypes,
//! the canonical record schema, the quality-flag vocabulary, and the single
//! canonical-JSON/SHA-256 routine from which all content hashes derive.

pub mod cancel;
pub mod canonical;
pub mod errors;
pub mod identity;
pub mod quality;
pub mod records;


pub use cancel::CancelToken;
pub use canonical::{canonical_json, content_hash, hash_bytes, to_canonical_value};
pub use errors::SchemaError;
pub use identity::{generate_ingest_run_id, Currency, InstrumentId, MarketDataId};
pub use quality::{QualityFlag, ValidationReport};
pub use records::{
    AdjustmentBasis, Bar, BarRecord, CanonicalRecord, PointRecord, RecordMeta, Source,
    TsProvenance,
};
