//! Habit struct -- the unit the streak engine tracks.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::recurrence::Recurrence;
use crate::validation::ValidationError;

/// How a completion is measured.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Measure {
    /// A plain done / not-done checkbox. Records carry no value.
    #[default]
    Check,
    /// A quantity per day, optionally with a target to reach.
    Numeric {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<f64>,
    },
}

impl Measure {
    /// Builds a measure from its stored form.
    pub fn from_parts(kind: &str, target: Option<f64>) -> Result<Self, ValidationError> {
        match kind.trim().to_ascii_lowercase().as_str() {
            "check" => Ok(Self::Check),
            "numeric" => Ok(Self::Numeric { target }),
            other => Err(ValidationError::UnknownMeasure(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Check => "check",
            Self::Numeric { .. } => "numeric",
        }
    }

    pub fn target(&self) -> Option<f64> {
        match self {
            Self::Check => None,
            Self::Numeric { target } => *target,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Numeric { .. })
    }
}

/// The cached streak fields of a habit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreakState {
    /// Consecutive due days completed, ending at `last_completed_date`.
    pub current_streak: u32,
    /// Best run ever observed. Never decreases.
    pub longest_streak: u32,
    /// Most recent day marked completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_completed_date: Option<NaiveDate>,
}

/// A recurring habit owned by a single user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Habit {
    pub id: String,

    pub user_id: String,

    pub title: String,

    pub recurrence: Recurrence,

    #[serde(default)]
    pub measure: Measure,

    /// The habit is never due before this day.
    pub created_at: NaiveDate,

    /// Inactive habits are invisible to the record operations.
    #[serde(default = "default_active")]
    pub active: bool,

    #[serde(default)]
    pub current_streak: u32,

    #[serde(default)]
    pub longest_streak: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_completed_date: Option<NaiveDate>,

    /// Optimistic-concurrency counter, bumped by storage on every save.
    #[serde(default)]
    pub version: i64,
}

fn default_active() -> bool {
    true
}

impl Habit {
    /// Returns the cached streak fields.
    pub fn streak(&self) -> StreakState {
        StreakState {
            current_streak: self.current_streak,
            longest_streak: self.longest_streak,
            last_completed_date: self.last_completed_date,
        }
    }

    /// Overwrites the cached streak fields.
    pub fn set_streak(&mut self, state: StreakState) {
        self.current_streak = state.current_streak;
        self.longest_streak = state.longest_streak;
        self.last_completed_date = state.last_completed_date;
    }

    /// Returns `true` if the habit is due on `date`.
    pub fn is_due(&self, date: NaiveDate) -> bool {
        self.recurrence.is_due(self.created_at, date)
    }
}

/// Builder for [`Habit`], mostly used by tests and the CLI.
#[derive(Debug, Clone)]
pub struct HabitBuilder {
    habit: Habit,
}

impl HabitBuilder {
    /// Creates a new daily check habit created today.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            habit: Habit {
                id: String::new(),
                user_id: String::new(),
                title: title.into(),
                recurrence: Recurrence::daily(),
                measure: Measure::Check,
                created_at: Utc::now().date_naive(),
                active: true,
                current_streak: 0,
                longest_streak: 0,
                last_completed_date: None,
                version: 0,
            },
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.habit.id = id.into();
        self
    }

    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.habit.user_id = user_id.into();
        self
    }

    pub fn recurrence(mut self, recurrence: Recurrence) -> Self {
        self.habit.recurrence = recurrence;
        self
    }

    pub fn measure(mut self, measure: Measure) -> Self {
        self.habit.measure = measure;
        self
    }

    pub fn created_at(mut self, created_at: NaiveDate) -> Self {
        self.habit.created_at = created_at;
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.habit.active = active;
        self
    }

    pub fn streak(mut self, state: StreakState) -> Self {
        self.habit.set_streak(state);
        self
    }

    pub fn build(self) -> Habit {
        self.habit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let habit = HabitBuilder::new("Read").id("hb-1").user("u1").build();
        assert_eq!(habit.title, "Read");
        assert_eq!(habit.recurrence, Recurrence::daily());
        assert_eq!(habit.measure, Measure::Check);
        assert!(habit.active);
        assert_eq!(habit.streak(), StreakState::default());
    }

    #[test]
    fn measure_from_parts() {
        assert_eq!(Measure::from_parts("CHECK", None).unwrap(), Measure::Check);
        assert_eq!(
            Measure::from_parts("numeric", Some(8.0)).unwrap(),
            Measure::Numeric { target: Some(8.0) }
        );
        assert!(matches!(
            Measure::from_parts("boolean", None),
            Err(ValidationError::UnknownMeasure(_))
        ));
    }

    #[test]
    fn habit_deserializes_with_defaults() {
        let json = r#"{
            "id": "hb-abc",
            "user_id": "u1",
            "title": "Run",
            "recurrence": {"kind": "weekly", "week_days": [1, 3]},
            "created_at": "2024-01-01"
        }"#;
        let habit: Habit = serde_json::from_str(json).unwrap();
        assert!(habit.active);
        assert_eq!(habit.measure, Measure::Check);
        assert_eq!(habit.current_streak, 0);
        assert!(habit.is_due(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()));
        assert!(!habit.is_due(NaiveDate::from_ymd_opt(2024, 1, 4).unwrap()));
    }

    #[test]
    fn numeric_measure_serde() {
        let m = Measure::Numeric { target: Some(2.5) };
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, r#"{"type":"numeric","target":2.5}"#);
        let check: Measure = serde_json::from_str(r#"{"type":"check"}"#).unwrap();
        assert_eq!(check, Measure::Check);
    }
}
