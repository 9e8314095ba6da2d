//! Shift-boundary time arithmetic.
//!
//! Attendance records are keyed by UTC calendar date while department shift
//! boundaries are configured as 12-hour strings in the company time zone.
//! Every conversion between the two lives here, so there is exactly one
//! answer to "what day is this" and "when does this shift end".

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::EngineError;

/// A parsed department shift boundary, minute precision, 24-hour internal form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftTime {
    pub hour: u32,
    pub minute: u32,
}

/// UTC calendar date containing `instant`. All record lookups key on this.
pub fn utc_date_key(instant: DateTime<Utc>) -> NaiveDate {
    instant.date_naive()
}

/// Parses a strict 12-hour `"H:MM AM|PM"` shift string.
///
/// Malformed input is a configuration error, never a silent default: the
/// legacy behavior of falling back to 6:00 PM hid broken department setup
/// until payroll was wrong.
pub fn parse_shift_time(raw: &str) -> Result<ShiftTime, EngineError> {
    let bad = |detail: &str| {
        EngineError::Configuration(format!("invalid shift time {:?}: {}", raw, detail))
    };

    let mut parts = raw.trim().split_whitespace();
    let clock = parts.next().ok_or_else(|| bad("empty value"))?;
    let meridiem = parts.next().ok_or_else(|| bad("missing AM/PM"))?;
    if parts.next().is_some() {
        return Err(bad("trailing input"));
    }

    let pm = match meridiem.to_ascii_uppercase().as_str() {
        "AM" => false,
        "PM" => true,
        _ => return Err(bad("meridiem must be AM or PM")),
    };

    let (hour_str, minute_str) = clock
        .split_once(':')
        .ok_or_else(|| bad("expected H:MM"))?;
    let hour_12: u32 = hour_str.parse().map_err(|_| bad("hour is not a number"))?;
    if minute_str.len() != 2 {
        return Err(bad("minutes must be two digits"));
    }
    let minute: u32 = minute_str
        .parse()
        .map_err(|_| bad("minute is not a number"))?;
    if !(1..=12).contains(&hour_12) {
        return Err(bad("hour must be 1-12"));
    }
    if minute > 59 {
        return Err(bad("minute must be 0-59"));
    }

    let hour = match (hour_12, pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, false) => h,
        (h, true) => h + 12,
    };

    Ok(ShiftTime { hour, minute })
}

/// Places `time` on the same local calendar day as `reference`, without
/// rolling. This is the instant to compare against for lateness and
/// early-arrival classification.
pub fn shift_instant_same_day(time: ShiftTime, reference: DateTime<Utc>, tz: &Tz) -> DateTime<Utc> {
    let local_date = reference.with_timezone(tz).date_naive();
    instant_on(local_date, time, tz)
}

/// Places `time` on the local calendar day of `reference`, rolling forward
/// one day when the candidate lands strictly before `reference`. Handles
/// cross-midnight shifts: a 6:00 AM checkout boundary resolved against a
/// 10:00 PM check-in lands on the next day.
///
/// Re-applying the result as its own reference is a fixed point, so there
/// is no infinite day-rolling.
pub fn resolve_shift_instant(time: ShiftTime, reference: DateTime<Utc>, tz: &Tz) -> DateTime<Utc> {
    let local_date = reference.with_timezone(tz).date_naive();
    let candidate = instant_on(local_date, time, tz);
    if candidate < reference {
        instant_on(local_date + Duration::days(1), time, tz)
    } else {
        candidate
    }
}

/// Whether a checked-in shift has passed its expected checkout plus grace.
pub fn is_overdue(
    check_in: DateTime<Utc>,
    shift_end: ShiftTime,
    grace_minutes: i64,
    now: DateTime<Utc>,
    tz: &Tz,
) -> bool {
    let expected = resolve_shift_instant(shift_end, check_in, tz);
    now > expected + Duration::minutes(grace_minutes)
}

/// 23:59:59 UTC on `date`; the bookkeeping end used when force-closing
/// stale overtime sessions.
pub fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    let naive = date
        .and_hms_opt(23, 59, 59)
        .unwrap_or_else(|| NaiveDateTime::default());
    Utc.from_utc_datetime(&naive)
}

/// Elapsed hours between two instants, rounded to 2 decimals.
pub fn hours_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    round_hours((end - start).num_minutes() as f64 / 60.0)
}

/// Every stored hours value is rounded to 2 decimal places.
pub fn round_hours(hours: f64) -> f64 {
    (hours * 100.0).round() / 100.0
}

fn instant_on(date: NaiveDate, time: ShiftTime, tz: &Tz) -> DateTime<Utc> {
    let naive = date
        .and_hms_opt(time.hour, time.minute, 0)
        .unwrap_or_else(|| NaiveDateTime::default());
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        // DST fold: take the earlier offset.
        LocalResult::Ambiguous(first, _) => first.with_timezone(&Utc),
        // DST gap: the wall time does not exist; shift an hour forward.
        LocalResult::None => tz
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&naive)),
    }
}
