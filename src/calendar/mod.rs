//! Venue calendars and session semantics.
//!
//! Trading-day baselines, session rules with validity windows, UTC close
//! derivation, and calendar-conflict detection.

pub mod baseline;
pub mod derive;
pub mod errors;
pub mod session_rules;

pub use baseline::{CalendarBaseline, BASELINE_NAME, BASELINE_VERSION};
pub use derive::{derive_close_ts, detect_conflicts, CalendarConflict, DerivedTs};
pub use errors::CalendarError;
pub use session_rules::{seed_session_rules, SessionRule, SessionRulesSnapshot};
