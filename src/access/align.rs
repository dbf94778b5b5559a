//! Calendar alignment and the missing-data policy.

use chrono::NaiveDate;

use crate::access::errors::AccessError;
use crate::access::frame::DataFrame;
use crate::access::request::{MissingDataPolicy, MissingPolicyKind, TimeSeriesRequest};
use crate::calendar::baseline::CalendarBaseline;

/// Build the target date index from the request calendar: the venue's
/// sessions over `[start, end]`, unique and strictly increasing.
pub fn build_target_index(
    request: &TimeSeriesRequest,
    baseline: &CalendarBaseline,
) -> Result<Vec<NaiveDate>, AccessError> {
    let sessions = baseline.sessions(&request.calendar.market, request.start, request.end)?;
    Ok(sessions)
}

/// Reindex onto the target and apply the missing-data policy.
///
/// `NAN_OK` leaves gaps in place (they are counted downstream), `DROP_DATES`
/// removes rows where any required column is missing, `ERROR` rejects the
/// frame on the first gap.
pub fn align_frame(
    frame: &DataFrame,
    target: &[NaiveDate],
    missing: &MissingDataPolicy,
) -> Result<DataFrame, AccessError> {
    let aligned = frame.reindex(target)?;
    match missing.policy {
        MissingPolicyKind::NanOk => Ok(aligned),
        MissingPolicyKind::DropDates => {
            let rows = aligned.rows_with_missing();
            aligned.drop_rows(&rows)
        }
        MissingPolicyKind::Error => {
            let rows = aligned.rows_with_missing();
            if rows.is_empty() {
                return Ok(aligned);
            }
            let example_dates = rows
                .iter()
                .take(5)
                .map(|row| aligned.index()[*row].to_string())
                .collect();
            Err(AccessError::MissingData {
                missing_count: rows.len(),
                example_dates,
            })
        }
    }
}
