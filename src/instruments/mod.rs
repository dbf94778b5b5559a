//! Instruments domain model: typed specs, positions, portfolio snapshots.

pub mod errors;
pub mod instrument;
pub mod portfolio;
pub mod spec;

pub use errors::InstrumentError;
pub use instrument::{Instrument, INSTRUMENTS_SCHEMA_VERSION};
pub use portfolio::{Portfolio, Position};
pub use spec::{InstrumentSpec, InstrumentType};
