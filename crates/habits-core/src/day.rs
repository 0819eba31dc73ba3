//! Calendar-day handling.
//!
//! The engine works on [`NaiveDate`] values throughout. An instant coming
//! from a client is collapsed to its UTC calendar day with [`normalize`];
//! when a timestamp is needed for a day, [`canonical_instant`] pins it at
//! noon UTC so conversions never move it across a day boundary.

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, Utc};

/// Weekday names indexed by day number (0 = Sunday).
pub const WEEKDAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Error returned when a day expression cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid date '{0}': expected YYYY-MM-DD, an RFC 3339 timestamp, 'today' or 'yesterday'")]
pub struct DayParseError(pub String);

/// Collapses an instant to its calendar day (UTC).
pub fn normalize(instant: DateTime<Utc>) -> NaiveDate {
    instant.date_naive()
}

/// Returns the canonical instant of a day: noon UTC.
pub fn canonical_instant(day: NaiveDate) -> DateTime<Utc> {
    let noon = NaiveTime::from_hms_opt(12, 0, 0).expect("12:00:00 is a valid time");
    day.and_time(noon).and_utc()
}

/// Day-of-week number with 0 = Sunday .. 6 = Saturday.
pub fn weekday_number(day: NaiveDate) -> u8 {
    day.weekday().num_days_from_sunday() as u8
}

/// Human-readable name for a weekday number. Out-of-range numbers yield `"?"`.
pub fn weekday_name(number: u8) -> &'static str {
    WEEKDAY_NAMES.get(number as usize).copied().unwrap_or("?")
}

/// The day before `day`, or `None` at the lower bound of the calendar.
pub fn previous(day: NaiveDate) -> Option<NaiveDate> {
    day.checked_sub_days(Days::new(1))
}

/// Formats a day as `YYYY-MM-DD`.
pub fn format_day(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

/// Parses a day expression relative to `today`.
///
/// Accepts `YYYY-MM-DD`, a full RFC 3339 timestamp (normalized to its UTC
/// day), and the keywords `today` / `yesterday`.
pub fn parse_day(input: &str, today: NaiveDate) -> Result<NaiveDate, DayParseError> {
    let trimmed = input.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "today" => return Ok(today),
        "yesterday" => {
            return previous(today).ok_or_else(|| DayParseError(input.to_string()));
        }
        _ => {}
    }

    if let Ok(day) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(day);
    }

    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| normalize(dt.with_timezone(&Utc)))
        .map_err(|_| DayParseError(input.to_string()))
}
