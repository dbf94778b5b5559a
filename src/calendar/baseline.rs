//! Versioned venue calendar baseline.
//!
//! The baseline is an in-memory table of trading schedules per MIC:
//! weekend rule, full-date holiday lists, regular open/close in local time,
//! early closes, and a deterministic local→UTC offset rule. It is the
//! fallback close source when no session rule covers a date, and the
//! reference for calendar-conflict detection.
//!
//! Offsets are computed from the venue's civil DST rules directly so that
//! session derivation never consults an OS timezone database.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate, Weekday};

use crate::calendar::errors::CalendarError;

/// Seed baseline name/version; `version_id` goes into registry entries.
pub const BASELINE_NAME: &str = "quantlab-baseline";
pub const BASELINE_VERSION: &str = "2026.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DstRule {
    /// Second Sunday of March to first Sunday of November (US).
    UnitedStates,
    /// Last Sunday of March to last Sunday of October (EU).
    EuropeanUnion,
}

#[derive(Debug, Clone)]
struct VenueSchedule {
    timezone_local: &'static str,
    open_local: &'static str,
    close_local: &'static str,
    standard_offset_minutes: i32,
    dst_offset_minutes: i32,
    dst_rule: DstRule,
    holidays: BTreeSet<NaiveDate>,
    early_closes: BTreeMap<NaiveDate, &'static str>,
}

/// Per-MIC trading-day and session-time baseline.
#[derive(Debug, Clone)]
pub struct CalendarBaseline {
    name: String,
    version: String,
    venues: BTreeMap<String, VenueSchedule>,
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    // Seed tables below only contain valid civil dates.
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

fn xnys_holidays() -> BTreeSet<NaiveDate> {
    [
        // 2024
        (2024, 1, 1),
        (2024, 1, 15),
        (2024, 2, 19),
        (2024, 3, 29),
        (2024, 5, 27),
        (2024, 6, 19),
        (2024, 7, 4),
        (2024, 9, 2),
        (2024, 11, 28),
        (2024, 12, 25),
        // 2025 (includes the January 9 national day of mourning)
        (2025, 1, 1),
        (2025, 1, 9),
        (2025, 1, 20),
        (2025, 2, 17),
        (2025, 4, 18),
        (2025, 5, 26),
        (2025, 6, 19),
        (2025, 7, 4),
        (2025, 9, 1),
        (2025, 11, 27),
        (2025, 12, 25),
        // 2026 (July 4 falls on Saturday; observed July 3)
        (2026, 1, 1),
        (2026, 1, 19),
        (2026, 2, 16),
        (2026, 4, 3),
        (2026, 5, 25),
        (2026, 6, 19),
        (2026, 7, 3),
        (2026, 9, 7),
        (2026, 11, 26),
        (2026, 12, 25),
    ]
    .into_iter()
    .map(|(y, m, d)| date(y, m, d))
    .collect()
}

fn xnys_early_closes() -> BTreeMap<NaiveDate, &'static str> {
    [
        (date(2024, 7, 3), "13:00"),
        (date(2024, 11, 29), "13:00"),
        (date(2024, 12, 24), "13:00"),
        (date(2025, 7, 3), "13:00"),
        (date(2025, 11, 28), "13:00"),
        (date(2025, 12, 24), "13:00"),
        (date(2026, 11, 27), "13:00"),
        (date(2026, 12, 24), "13:00"),
    ]
    .into_iter()
    .collect()
}

fn xetr_holidays() -> BTreeSet<NaiveDate> {
    [
        (2024, 1, 1),
        (2024, 3, 29),
        (2024, 4, 1),
        (2024, 5, 1),
        (2024, 12, 24),
        (2024, 12, 25),
        (2024, 12, 26),
        (2024, 12, 31),
        (2025, 1, 1),
        (2025, 4, 18),
        (2025, 4, 21),
        (2025, 5, 1),
        (2025, 12, 24),
        (2025, 12, 25),
        (2025, 12, 26),
        (2025, 12, 31),
        (2026, 1, 1),
        (2026, 4, 3),
        (2026, 4, 6),
        (2026, 5, 1),
        (2026, 12, 24),
        (2026, 12, 25),
        (2026, 12, 31),
    ]
    .into_iter()
    .map(|(y, m, d)| date(y, m, d))
    .collect()
}

fn nth_weekday_of_month(year: i32, month: u32, weekday: Weekday, nth: u32) -> NaiveDate {
    let first = date(year, month, 1);
    let offset = (7 + weekday.num_days_from_monday() as i64
        - first.weekday().num_days_from_monday() as i64)
        % 7;
    first + chrono::Duration::days(offset + 7 * (nth as i64 - 1))
}

fn last_weekday_of_month(year: i32, month: u32, weekday: Weekday) -> NaiveDate {
    let first_next = if month == 12 {
        date(year + 1, 1, 1)
    } else {
        date(year, month + 1, 1)
    };
    let mut day = first_next - chrono::Duration::days(1);
    while day.weekday() != weekday {
        day -= chrono::Duration::days(1);
    }
    day
}

impl DstRule {
    fn in_dst(&self, day: NaiveDate) -> bool {
        let year = day.year();
        match self {
            Self::UnitedStates => {
                let start = nth_weekday_of_month(year, 3, Weekday::Sun, 2);
                let end = nth_weekday_of_month(year, 11, Weekday::Sun, 1);
                day >= start && day < end
            }
            Self::EuropeanUnion => {
                let start = last_weekday_of_month(year, 3, Weekday::Sun);
                let end = last_weekday_of_month(year, 10, Weekday::Sun);
                day >= start && day < end
            }
        }
    }
}

impl CalendarBaseline {
    /// The seed baseline: XNYS and XETR schedules for 2024-2026.
    pub fn seed() -> Self {
        let mut venues = BTreeMap::new();
        venues.insert(
            "XNYS".to_string(),
            VenueSchedule {
                timezone_local: "America/New_York",
                open_local: "09:30",
                close_local: "16:00",
                standard_offset_minutes: -300,
                dst_offset_minutes: -240,
                dst_rule: DstRule::UnitedStates,
                holidays: xnys_holidays(),
                early_closes: xnys_early_closes(),
            },
        );
        venues.insert(
            "XETR".to_string(),
            VenueSchedule {
                timezone_local: "Europe/Berlin",
                open_local: "09:00",
                close_local: "17:30",
                standard_offset_minutes: 60,
                dst_offset_minutes: 120,
                dst_rule: DstRule::EuropeanUnion,
                holidays: xetr_holidays(),
                early_closes: BTreeMap::new(),
            },
        );
        Self {
            name: BASELINE_NAME.to_string(),
            version: BASELINE_VERSION.to_string(),
            venues,
        }
    }

    /// `<name>:<version>` identifier recorded in registry entries.
    pub fn version_id(&self) -> String {
        format!("{}:{}", self.name, self.version)
    }

    pub fn known_mics(&self) -> Vec<&str> {
        self.venues.keys().map(String::as_str).collect()
    }

    fn venue(&self, mic: &str) -> Result<&VenueSchedule, CalendarError> {
        self.venues.get(mic).ok_or_else(|| CalendarError::UnknownVenue {
            mic: mic.to_string(),
        })
    }

    /// Whether the venue is scheduled to trade on the local date.
    pub fn is_session_day(&self, mic: &str, day: NaiveDate) -> Result<bool, CalendarError> {
        let venue = self.venue(mic)?;
        let weekend = matches!(day.weekday(), Weekday::Sat | Weekday::Sun);
        Ok(!weekend && !venue.holidays.contains(&day))
    }

    /// Trading sessions between `start` and `end`, inclusive: unique and
    /// strictly increasing pure dates.
    pub fn sessions(
        &self,
        mic: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NaiveDate>, CalendarError> {
        if start > end {
            return Err(CalendarError::InvalidRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        self.venue(mic)?;
        let mut sessions = Vec::new();
        let mut day = start;
        while day <= end {
            if self.is_session_day(mic, day)? {
                sessions.push(day);
            }
            day += chrono::Duration::days(1);
        }
        Ok(sessions)
    }

    /// Scheduled close in venue-local `HH:MM`, honoring early closes.
    pub fn session_close_local(
        &self,
        mic: &str,
        day: NaiveDate,
    ) -> Result<Option<&'static str>, CalendarError> {
        let venue = self.venue(mic)?;
        if !self.is_session_day(mic, day)? {
            return Ok(None);
        }
        Ok(Some(
            venue.early_closes.get(&day).copied().unwrap_or(venue.close_local),
        ))
    }

    /// Scheduled open in venue-local `HH:MM`.
    pub fn session_open_local(
        &self,
        mic: &str,
        day: NaiveDate,
    ) -> Result<Option<&'static str>, CalendarError> {
        let venue = self.venue(mic)?;
        if !self.is_session_day(mic, day)? {
            return Ok(None);
        }
        Ok(Some(venue.open_local))
    }

    pub fn timezone_local(&self, mic: &str) -> Result<&'static str, CalendarError> {
        Ok(self.venue(mic)?.timezone_local)
    }

    /// Minutes the venue-local clock runs ahead of UTC on the given date.
    pub fn utc_offset_minutes(&self, mic: &str, day: NaiveDate) -> Result<i32, CalendarError> {
        let venue = self.venue(mic)?;
        Ok(if venue.dst_rule.in_dst(day) {
            venue.dst_offset_minutes
        } else {
            venue.standard_offset_minutes
        })
    }
}
