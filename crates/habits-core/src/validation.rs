//! Input validation for habits and completion records.
//!
//! Every check here runs before anything is written, so a rejected request
//! never leaves partial state behind.

use chrono::NaiveDate;

use crate::day;
use crate::habit::{Habit, Measure};
use crate::record::{NOTES_MAX_CHARS, RecordFields};

/// Maximum habit title length, in characters.
pub const TITLE_MAX_CHARS: usize = 200;

/// Error type for validation failures. All variants are caller-fixable.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("habit is not scheduled for {weekday} {date}; it is due {schedule}")]
    NotScheduled {
        date: NaiveDate,
        weekday: &'static str,
        schedule: String,
    },

    #[error("{date} is before the habit was created ({created_at})")]
    BeforeCreation {
        date: NaiveDate,
        created_at: NaiveDate,
    },

    #[error("numeric habits need a value when marked completed")]
    MissingValue,

    #[error("value must be zero or greater (got {0})")]
    NegativeValue(f64),

    #[error("value must be a finite number")]
    NonFiniteValue,

    #[error("check habits do not take a value")]
    UnexpectedValue,

    #[error("notes must be {max} characters or less (got {0})", max = NOTES_MAX_CHARS)]
    NotesTooLong(usize),

    #[error("weekday must be between 0 (Sunday) and 6 (Saturday) (got {0})")]
    InvalidWeekday(u8),

    #[error("weekly habits need at least one weekday")]
    EmptyWeeklyDays,

    #[error("unknown recurrence kind: {0}")]
    UnknownRecurrence(String),

    #[error("unknown value type: {0}")]
    UnknownMeasure(String),

    #[error("title is required")]
    TitleRequired,

    #[error("title must be {max} characters or less (got {0})", max = TITLE_MAX_CHARS)]
    TitleTooLong(usize),

    #[error("target must be a positive number")]
    InvalidTarget,

    #[error("range start {from} is after its end {to}")]
    InvalidRange { from: NaiveDate, to: NaiveDate },
}

/// Validates a habit definition before it is stored.
pub fn validate_habit(habit: &Habit) -> Result<(), ValidationError> {
    let title_len = habit.title.trim().chars().count();
    if title_len == 0 {
        return Err(ValidationError::TitleRequired);
    }
    if title_len > TITLE_MAX_CHARS {
        return Err(ValidationError::TitleTooLong(title_len));
    }
    if let Some(target) = habit.measure.target() {
        if !target.is_finite() || target <= 0.0 {
            return Err(ValidationError::InvalidTarget);
        }
    }
    Ok(())
}

/// Checks that `date` is a day the habit can be marked on.
pub fn validate_schedule(habit: &Habit, date: NaiveDate) -> Result<(), ValidationError> {
    if date < habit.created_at {
        return Err(ValidationError::BeforeCreation {
            date,
            created_at: habit.created_at,
        });
    }
    if !habit.is_due(date) {
        return Err(ValidationError::NotScheduled {
            date,
            weekday: day::weekday_name(day::weekday_number(date)),
            schedule: habit.recurrence.describe(habit.created_at),
        });
    }
    Ok(())
}

/// Checks the value against the habit's measure.
///
/// Numeric habits need a non-negative value when completed; check habits
/// never carry one. Exceeding a target is fine.
pub fn validate_value(
    measure: &Measure,
    completed: bool,
    value: Option<f64>,
) -> Result<(), ValidationError> {
    match (measure, value) {
        (Measure::Check, Some(_)) => Err(ValidationError::UnexpectedValue),
        (Measure::Check, None) => Ok(()),
        (Measure::Numeric { .. }, None) if completed => Err(ValidationError::MissingValue),
        (Measure::Numeric { .. }, None) => Ok(()),
        (Measure::Numeric { .. }, Some(v)) if !v.is_finite() => {
            Err(ValidationError::NonFiniteValue)
        }
        (Measure::Numeric { .. }, Some(v)) if v < 0.0 => Err(ValidationError::NegativeValue(v)),
        (Measure::Numeric { .. }, Some(_)) => Ok(()),
    }
}

/// Checks the note length.
pub fn validate_notes(notes: Option<&str>) -> Result<(), ValidationError> {
    if let Some(notes) = notes {
        let len = notes.chars().count();
        if len > NOTES_MAX_CHARS {
            return Err(ValidationError::NotesTooLong(len));
        }
    }
    Ok(())
}

/// Runs every record-level check for marking `habit` on `date`.
pub fn validate_record(
    habit: &Habit,
    date: NaiveDate,
    fields: &RecordFields,
) -> Result<(), ValidationError> {
    validate_schedule(habit, date)?;
    validate_value(&habit.measure, fields.completed, fields.value)?;
    validate_notes(fields.notes.as_deref())?;
    Ok(())
}

/// Checks that an inclusive day range is not inverted.
pub fn validate_range(from: NaiveDate, to: NaiveDate) -> Result<(), ValidationError> {
    if from > to {
        return Err(ValidationError::InvalidRange { from, to });
    }
    Ok(())
}

/// Whether a numeric record reached the habit's target.
///
/// `None` when there is no target or no value to compare.
pub fn target_met(measure: &Measure, fields: &RecordFields) -> Option<bool> {
    let target = measure.target()?;
    let value = fields.value?;
    Some(fields.completed && value >= target)
}
