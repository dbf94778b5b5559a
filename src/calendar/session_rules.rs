//! Session-rules table: per-MIC regular close times with validity windows.
//!
//! Each rule carries its own UTC offset, so a venue that observes DST is
//! represented by splitting validity windows at the transition dates. The
//! snapshot hash feeds registry entries.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::calendar::errors::CalendarError;
use crate::core::canonical::{content_hash, to_canonical_value};
use crate::core::errors::SchemaError;

/// Parse `HH:MM` into a time of day.
pub fn parse_local_time(value: &str) -> Result<NaiveTime, CalendarError> {
    NaiveTime::parse_from_str(value, "%H:%M").map_err(|_| CalendarError::InvalidTime {
        value: value.to_string(),
    })
}

/// One close rule for a MIC over a validity window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRule {
    pub mic: String,
    pub timezone_local: String,
    pub regular_close_local: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regular_open_local: Option<String>,
    /// Minutes the local clock runs ahead of UTC inside this window.
    pub utc_offset_minutes: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_from: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_to: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_note: Option<String>,
}

impl SessionRule {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mic: impl Into<String>,
        timezone_local: impl Into<String>,
        regular_close_local: impl Into<String>,
        regular_open_local: Option<String>,
        utc_offset_minutes: i32,
        effective_from: Option<NaiveDate>,
        effective_to: Option<NaiveDate>,
    ) -> Result<Self, CalendarError> {
        let mic = mic.into().trim().to_ascii_uppercase();
        let timezone_local = timezone_local.into();
        let regular_close_local = regular_close_local.into();
        if mic.is_empty() || timezone_local.is_empty() {
            return Err(CalendarError::InvalidWindow {
                mic,
                detail: "mic and timezone_local must be non-empty".to_string(),
            });
        }
        parse_local_time(&regular_close_local)?;
        if let Some(ref open) = regular_open_local {
            parse_local_time(open)?;
        }
        if let (Some(from), Some(to)) = (effective_from, effective_to) {
            if to < from {
                return Err(CalendarError::InvalidWindow {
                    mic,
                    detail: format!("effective_to {to} precedes effective_from {from}"),
                });
            }
        }
        Ok(Self {
            mic,
            timezone_local,
            regular_close_local,
            regular_open_local,
            utc_offset_minutes,
            effective_from,
            effective_to,
            source_note: None,
        })
    }

    /// Whether this rule covers the local trading date.
    pub fn covers(&self, day: NaiveDate) -> bool {
        if let Some(from) = self.effective_from {
            if day < from {
                return false;
            }
        }
        if let Some(to) = self.effective_to {
            if day > to {
                return false;
            }
        }
        true
    }
}

/// Immutable, hashed set of session rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRulesSnapshot {
    pub version: String,
    pub rules: Vec<SessionRule>,
    pub sessionrules_hash: String,
}

impl SessionRulesSnapshot {
    pub fn new(version: impl Into<String>, mut rules: Vec<SessionRule>) -> Result<Self, CalendarError> {
        let version = version.into();
        if version.is_empty() || rules.is_empty() {
            return Err(CalendarError::InvalidWindow {
                mic: String::new(),
                detail: "version and rules must be non-empty".to_string(),
            });
        }
        rules.sort_by(|a, b| {
            (a.mic.as_str(), a.effective_from).cmp(&(b.mic.as_str(), b.effective_from))
        });
        // Windows for the same MIC must not overlap; the lookup would be
        // ambiguous otherwise.
        for pair in rules.windows(2) {
            if pair[0].mic == pair[1].mic {
                let prev_end = pair[0].effective_to;
                let next_start = pair[1].effective_from;
                let overlapping = match (prev_end, next_start) {
                    (Some(end), Some(start)) => start <= end,
                    _ => true,
                };
                if overlapping {
                    return Err(CalendarError::OverlappingRules {
                        mic: pair[0].mic.clone(),
                    });
                }
            }
        }
        let hash = sessionrules_hash(&rules)?;
        Ok(Self {
            version,
            rules,
            sessionrules_hash: hash,
        })
    }

    /// The rule in force for a MIC on a local trading date, if any.
    pub fn rule_for(&self, mic: &str, day: NaiveDate) -> Option<&SessionRule> {
        self.rules
            .iter()
            .find(|rule| rule.mic == mic && rule.covers(day))
    }
}

fn sessionrules_hash(rules: &[SessionRule]) -> Result<String, CalendarError> {
    let payload = serde_json::json!({ "rules": rules });
    let value = to_canonical_value(&payload).map_err(|err: SchemaError| {
        CalendarError::InvalidWindow {
            mic: String::new(),
            detail: err.to_string(),
        }
    })?;
    Ok(content_hash(&value))
}

/// The seed rules shipped with the library: XNYS and XETR, 2024-2026,
/// with DST expressed as split windows.
pub fn seed_session_rules() -> Result<SessionRulesSnapshot, CalendarError> {
    let d = |y: i32, m: u32, day: u32| NaiveDate::from_ymd_opt(y, m, day);
    let mut rules = Vec::new();
    // XNYS: EST / EDT windows.
    let xnys_windows = [
        (d(2024, 1, 1), d(2024, 3, 9), -300),
        (d(2024, 3, 10), d(2024, 11, 2), -240),
        (d(2024, 11, 3), d(2025, 3, 8), -300),
        (d(2025, 3, 9), d(2025, 11, 1), -240),
        (d(2025, 11, 2), d(2026, 3, 7), -300),
        (d(2026, 3, 8), d(2026, 10, 31), -240),
        (d(2026, 11, 1), d(2026, 12, 31), -300),
    ];
    for (from, to, offset) in xnys_windows {
        rules.push(SessionRule::new(
            "XNYS",
            "America/New_York",
            "16:00",
            Some("09:30".to_string()),
            offset,
            from,
            to,
        )?);
    }
    // XETR: CET / CEST windows.
    let xetr_windows = [
        (d(2024, 1, 1), d(2024, 3, 30), 60),
        (d(2024, 3, 31), d(2024, 10, 26), 120),
        (d(2024, 10, 27), d(2025, 3, 29), 60),
        (d(2025, 3, 30), d(2025, 10, 25), 120),
        (d(2025, 10, 26), d(2026, 3, 28), 60),
        (d(2026, 3, 29), d(2026, 10, 24), 120),
        (d(2026, 10, 25), d(2026, 12, 31), 60),
    ];
    for (from, to, offset) in xetr_windows {
        rules.push(SessionRule::new(
            "XETR",
            "Europe/Berlin",
            "17:30",
            Some("09:00".to_string()),
            offset,
            from,
            to,
        )?);
    }
    SessionRulesSnapshot::new("2026.1", rules)
}
