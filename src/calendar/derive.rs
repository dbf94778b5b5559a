//! Canonical `ts` derivation and calendar-conflict detection.
//!
//! Every canonical EOD record gets its UTC `ts` through a fixed hierarchy:
//! session rule close, then baseline close, then the provider timestamp.
//! Falling through to the provider is recorded in the provenance and as a
//! `PROVIDER_TIMESTAMP_USED` flag; conflicts with the venue calendar are
//! flagged, never silently dropped.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};

use crate::calendar::baseline::CalendarBaseline;
use crate::calendar::errors::CalendarError;
use crate::calendar::session_rules::{parse_local_time, SessionRulesSnapshot};
use crate::core::quality::QualityFlag;
use crate::core::records::TsProvenance;

/// Outcome of the close-timestamp derivation.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedTs {
    pub ts: DateTime<Utc>,
    pub provenance: TsProvenance,
    pub flags: Vec<QualityFlag>,
}

fn close_to_utc(
    day: NaiveDate,
    close_local: &str,
    utc_offset_minutes: i32,
) -> Result<DateTime<Utc>, CalendarError> {
    let close = parse_local_time(close_local)?;
    let local = day.and_time(close);
    let utc_naive = local - chrono::Duration::minutes(utc_offset_minutes as i64);
    Ok(DateTime::from_naive_utc_and_offset(utc_naive, Utc))
}

/// Derive the canonical UTC close timestamp for a venue trading date.
///
/// Hierarchy: session rule → baseline schedule → provider timestamp.
pub fn derive_close_ts(
    mic: &str,
    trading_date_local: NaiveDate,
    session_rules: &SessionRulesSnapshot,
    baseline: &CalendarBaseline,
    provider_ts: Option<DateTime<Utc>>,
) -> Result<DerivedTs, CalendarError> {
    if let Some(rule) = session_rules.rule_for(mic, trading_date_local) {
        let ts = close_to_utc(
            trading_date_local,
            &rule.regular_close_local,
            rule.utc_offset_minutes,
        )?;
        return Ok(DerivedTs {
            ts,
            provenance: TsProvenance::ExchangeClose,
            flags: Vec::new(),
        });
    }
    if let Ok(Some(close_local)) = baseline.session_close_local(mic, trading_date_local) {
        let offset = baseline.utc_offset_minutes(mic, trading_date_local)?;
        let ts = close_to_utc(trading_date_local, close_local, offset)?;
        return Ok(DerivedTs {
            ts,
            provenance: TsProvenance::ExchangeClose,
            flags: Vec::new(),
        });
    }
    if let Some(ts) = provider_ts {
        return Ok(DerivedTs {
            ts,
            provenance: TsProvenance::ProviderEod,
            flags: vec![QualityFlag::ProviderTimestampUsed],
        });
    }
    Err(CalendarError::NoCloseSource {
        mic: mic.to_string(),
        date: trading_date_local.to_string(),
    })
}

/// A single calendar conflict between observed bars and the venue schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarConflict {
    /// A bar arrived for a date the venue was closed.
    BarOnClosedDay { date: NaiveDate },
    /// The venue was open but the provider supplied no bar.
    MissingBarOnOpenDay { date: NaiveDate },
}

impl CalendarConflict {
    pub fn date(&self) -> NaiveDate {
        match self {
            Self::BarOnClosedDay { date } | Self::MissingBarOnOpenDay { date } => *date,
        }
    }
}

/// Compare observed bar dates against the venue schedule over a range.
pub fn detect_conflicts(
    baseline: &CalendarBaseline,
    mic: &str,
    observed_dates: &BTreeSet<NaiveDate>,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<CalendarConflict>, CalendarError> {
    let sessions: BTreeSet<NaiveDate> = baseline.sessions(mic, start, end)?.into_iter().collect();
    let mut conflicts = Vec::new();
    for date in observed_dates {
        if *date >= start && *date <= end && !sessions.contains(date) {
            conflicts.push(CalendarConflict::BarOnClosedDay { date: *date });
        }
    }
    for date in &sessions {
        if !observed_dates.contains(date) {
            conflicts.push(CalendarConflict::MissingBarOnOpenDay { date: *date });
        }
    }
    conflicts.sort_by_key(CalendarConflict::date);
    Ok(conflicts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::session_rules::seed_session_rules;
    use chrono::TimeZone;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn session_rule_close_converts_to_utc() {
        let rules = seed_session_rules().unwrap();
        let baseline = CalendarBaseline::seed();
        // 2024-01-05 is EST: 16:00 local == 21:00 UTC.
        let derived =
            derive_close_ts("XNYS", d(2024, 1, 5), &rules, &baseline, None).unwrap();
        assert_eq!(derived.provenance, TsProvenance::ExchangeClose);
        assert_eq!(
            derived.ts,
            Utc.with_ymd_and_hms(2024, 1, 5, 21, 0, 0).unwrap()
        );
        // 2024-07-05 is EDT: 16:00 local == 20:00 UTC.
        let summer =
            derive_close_ts("XNYS", d(2024, 7, 5), &rules, &baseline, None).unwrap();
        assert_eq!(summer.ts, Utc.with_ymd_and_hms(2024, 7, 5, 20, 0, 0).unwrap());
    }

    #[test]
    fn provider_timestamp_is_last_resort_and_flagged() {
        let rules = SessionRulesSnapshot::new(
            "v1",
            vec![crate::calendar::session_rules::SessionRule::new(
                "XETR",
                "Europe/Berlin",
                "17:30",
                None,
                60,
                None,
                None,
            )
            .unwrap()],
        )
        .unwrap();
        let baseline = CalendarBaseline::seed();
        let provider_ts = Utc.with_ymd_and_hms(2024, 1, 5, 22, 7, 13).unwrap();
        // Unknown venue for both rules and baseline: provider wins.
        let derived =
            derive_close_ts("XTKS", d(2024, 1, 5), &rules, &baseline, Some(provider_ts))
                .unwrap();
        assert_eq!(derived.provenance, TsProvenance::ProviderEod);
        assert_eq!(derived.flags, vec![QualityFlag::ProviderTimestampUsed]);
        assert_eq!(derived.ts, provider_ts);
    }

    #[test]
    fn no_source_at_all_errors() {
        let rules = seed_session_rules().unwrap();
        let baseline = CalendarBaseline::seed();
        let err = derive_close_ts("XTKS", d(2024, 1, 5), &rules, &baseline, None).unwrap_err();
        assert!(matches!(err, CalendarError::NoCloseSource { .. }));
    }

    #[test]
    fn conflicts_cover_both_directions() {
        let baseline = CalendarBaseline::seed();
        let observed: BTreeSet<NaiveDate> =
            [d(2024, 1, 1), d(2024, 1, 2), d(2024, 1, 3)].into_iter().collect();
        let conflicts =
            detect_conflicts(&baseline, "XNYS", &observed, d(2024, 1, 1), d(2024, 1, 4))
                .unwrap();
        assert_eq!(
            conflicts,
            vec![
                CalendarConflict::BarOnClosedDay { date: d(2024, 1, 1) },
                CalendarConflict::MissingBarOnOpenDay { date: d(2024, 1, 4) },
            ]
        );
    }
}
