//! QuantLab
//!
//! Layered quantitative analytics with deterministic lineage end to end.
//!
//! # Architecture
//!
//! ```text
//! raw payloads
//!    ↓  ingest (fetch → normalize → validate)
//! canonical snapshots ──▶ dataset registry (append-only, content-hashed)
//!    ↓  access (align → guardrails → parquet cache → manifest)
//! TimeSeriesBundle
//!    ↓            ↘
//! pricing          risk / stress
//! (NAV, FX)        (metrics, scenarios)
//!    ↓                ↓
//! reports with content-hash lineage
//! ```
//!
//! # Determinism Guarantees
//!
//! - **Hashing**: one canonical-JSON/SHA-256 routine (`core::canonical`)
//!   produces every identity: request hashes, snapshot content hashes,
//!   portfolio snapshot hashes, scenario-set hashes.
//! - **Storage**: raw payloads are write-once; canonical snapshots publish
//!   by atomic rename; the registry journal only accepts entries whose
//!   snapshot is on disk with a matching hash.
//! - **Replay**: an identical time-series request (including `as_of`) is
//!   served from cache without touching the provider.
//! - **Engines**: pricing, risk, and stress are pure functions of their
//!   inputs and safely parallelizable across requests.

pub mod access;
pub mod calendar;
pub mod core;
pub mod ingest;
pub mod instruments;
pub mod pricing;
pub mod report;
pub mod risk;
pub mod store;
pub mod stress;
