//! Completion records -- one row per habit, user and calendar day.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length of a record note, in characters.
pub const NOTES_MAX_CHARS: usize = 500;

/// Identifies the single record a habit may have for a day.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub habit_id: String,
    pub user_id: String,
    pub date: NaiveDate,
}

impl RecordKey {
    pub fn new(habit_id: impl Into<String>, user_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            habit_id: habit_id.into(),
            user_id: user_id.into(),
            date,
        }
    }
}

/// The mutable part of a record, written on every upsert.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecordFields {
    pub completed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A stored completion record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub id: i64,

    pub habit_id: String,

    pub user_id: String,

    pub date: NaiveDate,

    pub completed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Audit only.
    pub updated_at: DateTime<Utc>,
}

impl CompletionRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.habit_id.clone(), self.user_id.clone(), self.date)
    }

    pub fn fields(&self) -> RecordFields {
        RecordFields {
            completed: self.completed,
            value: self.value,
            notes: self.notes.clone(),
        }
    }
}
