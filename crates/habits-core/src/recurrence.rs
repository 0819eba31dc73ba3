//! Recurrence rules and the scheduling predicate.
//!
//! A habit repeats by one of four rules. [`is_due`] answers whether a given
//! calendar day is one the habit expects a completion for, and
//! [`find_previous_due`] walks backwards (bounded) to the closest earlier due
//! day. Both are pure and are evaluated repeatedly by the streak algorithms.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::day;
use crate::validation::ValidationError;

/// Default number of days [`find_previous_due`] may walk back.
///
/// One 31-day month. Monthly habits walk further, see [`find_previous_due`].
pub const DEFAULT_MAX_LOOKBACK_DAYS: u32 = 31;

/// Lower bound on the lookback for monthly habits.
///
/// A habit created on the 29th to 31st skips the months that lack that day,
/// so two consecutive occurrences can be up to 61 days apart (May 31 to
/// July 31).
const MONTHLY_MIN_LOOKBACK_DAYS: u32 = 62;

// ---------------------------------------------------------------------------
// WeekdaySet
// ---------------------------------------------------------------------------

/// A set of weekday numbers (0 = Sunday .. 6 = Saturday), stored as a bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    /// The empty set.
    pub const EMPTY: Self = Self(0);

    /// Builds a set from weekday numbers, rejecting anything above 6.
    pub fn from_numbers(days: &[u8]) -> Result<Self, ValidationError> {
        let mut bits = 0u8;
        for &d in days {
            if d > 6 {
                return Err(ValidationError::InvalidWeekday(d));
            }
            bits |= 1 << d;
        }
        Ok(Self(bits))
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, number: u8) -> bool {
        number <= 6 && self.0 & (1 << number) != 0
    }

    /// Returns `true` if the weekday of `date` is in the set.
    pub fn contains_day(self, date: NaiveDate) -> bool {
        self.contains(day::weekday_number(date))
    }

    /// Weekday numbers in ascending order.
    pub fn iter(self) -> impl Iterator<Item = u8> {
        (0u8..7).filter(move |d| self.contains(*d))
    }

    pub fn to_vec(self) -> Vec<u8> {
        self.iter().collect()
    }
}

impl Serialize for WeekdaySet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_vec().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for WeekdaySet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let days = Vec::<u8>::deserialize(deserializer)?;
        Self::from_numbers(&days).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for WeekdaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(day::weekday_name).collect();
        f.write_str(&names.join(", "))
    }
}

// ---------------------------------------------------------------------------
// Recurrence
// ---------------------------------------------------------------------------

/// How often a habit is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRecurrence", into = "RawRecurrence")]
pub enum Recurrence {
    /// Every day, or only the listed weekdays when the set is non-empty.
    Daily { week_days: WeekdaySet },
    /// The listed weekdays; the set is never empty.
    Weekly { week_days: WeekdaySet },
    /// The day of month on which the habit was created.
    Monthly,
    /// Like `Daily`: empty means every day.
    Custom { week_days: WeekdaySet },
}

impl Recurrence {
    /// Every day.
    pub fn daily() -> Self {
        Self::Daily {
            week_days: WeekdaySet::EMPTY,
        }
    }

    /// Weekly on the given days. At least one day is required.
    pub fn weekly(days: &[u8]) -> Result<Self, ValidationError> {
        Self::from_parts("weekly", days)
    }

    /// Builds a recurrence from its stored form: a kind name plus weekday numbers.
    pub fn from_parts(kind: &str, days: &[u8]) -> Result<Self, ValidationError> {
        let week_days = WeekdaySet::from_numbers(days)?;
        match kind.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily { week_days }),
            "weekly" => {
                if week_days.is_empty() {
                    return Err(ValidationError::EmptyWeeklyDays);
                }
                Ok(Self::Weekly { week_days })
            }
            "monthly" => Ok(Self::Monthly),
            "custom" => Ok(Self::Custom { week_days }),
            other => Err(ValidationError::UnknownRecurrence(other.to_string())),
        }
    }

    /// The kind name used in storage and on the command line.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Daily { .. } => "daily",
            Self::Weekly { .. } => "weekly",
            Self::Monthly => "monthly",
            Self::Custom { .. } => "custom",
        }
    }

    /// The weekday filter; empty for monthly habits.
    pub fn week_days(&self) -> WeekdaySet {
        match self {
            Self::Daily { week_days } | Self::Weekly { week_days } | Self::Custom { week_days } => {
                *week_days
            }
            Self::Monthly => WeekdaySet::EMPTY,
        }
    }

    /// Returns `true` if the habit is due on `date`.
    pub fn is_due(&self, created_at: NaiveDate, date: NaiveDate) -> bool {
        is_due(self, created_at, date)
    }

    /// Describes the schedule in plain words, e.g. "on Monday, Friday".
    pub fn describe(&self, created_at: NaiveDate) -> String {
        match self {
            Self::Daily { week_days } | Self::Custom { week_days } if week_days.is_empty() => {
                "every day".to_string()
            }
            Self::Daily { week_days } | Self::Weekly { week_days } | Self::Custom { week_days } => {
                format!("on {week_days}")
            }
            Self::Monthly => format!("on day {} of each month", created_at.day()),
        }
    }
}

impl Default for Recurrence {
    fn default() -> Self {
        Self::daily()
    }
}

/// Serialized shape of a [`Recurrence`]: `{"kind": "weekly", "week_days": [1, 3]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawRecurrence {
    kind: String,
    #[serde(default)]
    week_days: Vec<u8>,
}

impl TryFrom<RawRecurrence> for Recurrence {
    type Error = ValidationError;

    fn try_from(raw: RawRecurrence) -> Result<Self, Self::Error> {
        Self::from_parts(&raw.kind, &raw.week_days)
    }
}

impl From<Recurrence> for RawRecurrence {
    fn from(r: Recurrence) -> Self {
        Self {
            kind: r.kind().to_string(),
            week_days: r.week_days().to_vec(),
        }
    }
}

// ---------------------------------------------------------------------------
// Scheduling
// ---------------------------------------------------------------------------

/// Decides whether `date` is a due day for a habit with the given recurrence.
///
/// `created_at` only matters for monthly habits, which repeat on the
/// creation day-of-month.
pub fn is_due(recurrence: &Recurrence, created_at: NaiveDate, date: NaiveDate) -> bool {
    match recurrence {
        Recurrence::Daily { week_days } | Recurrence::Custom { week_days } => {
            week_days.is_empty() || week_days.contains_day(date)
        }
        Recurrence::Weekly { week_days } => week_days.contains_day(date),
        Recurrence::Monthly => date.day() == created_at.day(),
    }
}

/// Finds the closest due day strictly before `from`.
///
/// Walks back at most `max_lookback_days` days and never past `created_at`.
/// Monthly habits always get at least 62 days, so the previous occurrence is
/// found even across months that skip the day.
pub fn find_previous_due(
    recurrence: &Recurrence,
    created_at: NaiveDate,
    from: NaiveDate,
    max_lookback_days: u32,
) -> Option<NaiveDate> {
    let bound = match recurrence {
        Recurrence::Monthly => max_lookback_days.max(MONTHLY_MIN_LOOKBACK_DAYS),
        _ => max_lookback_days,
    };
    let mut current = from;
    for _ in 0..bound {
        current = day::previous(current)?;
        if current < created_at {
            return None;
        }
        if is_due(recurrence, created_at, current) {
            return Some(current);
        }
    }
    None
}
