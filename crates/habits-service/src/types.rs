//! Request and response types of the record service.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use habits_core::day;
use habits_core::habit::{Measure, StreakState};
use habits_core::record::{CompletionRecord, RecordFields};
use habits_core::recurrence::{DEFAULT_MAX_LOOKBACK_DAYS, Recurrence};

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_LIMIT: u32 = 30;

/// Largest page a history query returns.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Tunables of the record service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceOptions {
    /// How far back the incremental updater looks for the previous due day.
    pub max_lookback_days: u32,
    /// How many times a unit of work is retried after a version conflict or
    /// while the database is busy.
    pub conflict_retries: u32,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            max_lookback_days: DEFAULT_MAX_LOOKBACK_DAYS,
            conflict_retries: 3,
        }
    }
}

/// A mark for one habit on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpsertRecord {
    pub habit_id: String,
    pub user_id: String,
    pub date: NaiveDate,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl UpsertRecord {
    /// A completed mark with no value or notes.
    pub fn new(habit_id: impl Into<String>, user_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            habit_id: habit_id.into(),
            user_id: user_id.into(),
            date,
            completed: true,
            value: None,
            notes: None,
        }
    }

    /// A completed mark for the calendar day of `instant`.
    pub fn at(
        habit_id: impl Into<String>,
        user_id: impl Into<String>,
        instant: DateTime<Utc>,
    ) -> Self {
        Self::new(habit_id, user_id, day::normalize(instant))
    }

    pub fn completed(mut self, completed: bool) -> Self {
        self.completed = completed;
        self
    }

    pub fn value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub(crate) fn fields(&self) -> RecordFields {
        RecordFields {
            completed: self.completed,
            value: self.value,
            notes: self.notes.clone(),
        }
    }
}

/// Result of [`RecordService::upsert_record`](crate::RecordService::upsert_record).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordOutcome {
    pub record: CompletionRecord,
    pub current_streak: u32,
    pub longest_streak: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_completed_date: Option<NaiveDate>,
    /// Set for numeric habits with a target when a value was recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_met: Option<bool>,
}

/// Result of [`RecordService::mark_retroactively`](crate::RecordService::mark_retroactively).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetroactiveOutcome {
    pub success: bool,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub record_id: i64,
}

impl RetroactiveOutcome {
    pub(crate) fn new(state: StreakState, record_id: i64) -> Self {
        Self {
            success: true,
            current_streak: state.current_streak,
            longest_streak: state.longest_streak,
            record_id,
        }
    }
}

/// Paging information of a [`HistoryPage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub total: u64,
    pub limit: u32,
    pub offset: u64,
    pub has_more: bool,
}

/// One page of records, newest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPage {
    pub records: Vec<CompletionRecord>,
    pub pagination: Pagination,
}

/// Input for creating a habit.
#[derive(Debug, Clone, PartialEq)]
pub struct NewHabit {
    pub user_id: String,
    pub title: String,
    pub recurrence: Recurrence,
    pub measure: Measure,
    /// Defaults to today.
    pub created_at: Option<NaiveDate>,
}

impl NewHabit {
    /// A daily check habit starting today.
    pub fn new(user_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            title: title.into(),
            recurrence: Recurrence::daily(),
            measure: Measure::Check,
            created_at: None,
        }
    }

    pub fn recurrence(mut self, recurrence: Recurrence) -> Self {
        self.recurrence = recurrence;
        self
    }

    pub fn measure(mut self, measure: Measure) -> Self {
        self.measure = measure;
        self
    }

    pub fn created_at(mut self, created_at: NaiveDate) -> Self {
        self.created_at = Some(created_at);
        self
    }
}
