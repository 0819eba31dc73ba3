//! Repository, ledger and storage traits -- the public API for persistence.
//!
//! The record service depends on these traits rather than on [`SqliteStore`]
//! so that other backends can be substituted.
//!
//! [`SqliteStore`]: crate::SqliteStore

use std::collections::BTreeSet;

use chrono::NaiveDate;

use habits_core::habit::Habit;
use habits_core::record::{CompletionRecord, RecordFields, RecordKey};

use crate::error::Result;

// ---------------------------------------------------------------------------
// Helper types
// ---------------------------------------------------------------------------

/// An inclusive, optionally open-ended range of days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    /// Every day.
    pub fn all() -> Self {
        Self::default()
    }

    /// Days from `from` to `to`, both included.
    pub fn between(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    /// Returns `true` if `date` falls inside the range.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.is_none_or(|from| date >= from) && self.to.is_none_or(|to| date <= to)
    }
}

// ---------------------------------------------------------------------------
// Repository traits
// ---------------------------------------------------------------------------

/// Access to habits and their cached streak fields.
pub trait HabitRepository {
    /// Loads an active habit owned by `user_id`.
    ///
    /// Returns `None` when the habit does not exist, belongs to someone else,
    /// or has been deactivated.
    fn find_active_by_id(&self, habit_id: &str, user_id: &str) -> Result<Option<Habit>>;

    /// Loads a habit owned by `user_id`, active or not.
    fn find_by_id(&self, habit_id: &str, user_id: &str) -> Result<Option<Habit>>;

    /// Writes the mutable fields of `habit`.
    ///
    /// The write only succeeds if the stored version still equals
    /// `habit.version`; otherwise [`StorageError::Conflict`] is returned.
    /// The returned habit carries the new version.
    ///
    /// [`StorageError::Conflict`]: crate::StorageError::Conflict
    fn save_habit(&self, habit: &Habit) -> Result<Habit>;
}

/// The per-day completion ledger.
pub trait CompletionLedger {
    /// Inserts the record for `key` or overwrites its fields.
    fn upsert_record(&self, key: &RecordKey, fields: &RecordFields) -> Result<CompletionRecord>;

    /// Loads the record for `key`, if any.
    fn find_record(&self, key: &RecordKey) -> Result<Option<CompletionRecord>>;

    /// Days in `[from, to]` with a completed record.
    fn find_completed_dates_in_range(
        &self,
        habit_id: &str,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<BTreeSet<NaiveDate>>;

    /// Every day with a completed record.
    fn find_all_completed_dates(&self, habit_id: &str, user_id: &str)
    -> Result<BTreeSet<NaiveDate>>;

    /// Records in `range`, oldest first.
    fn find_records_in_range(
        &self,
        habit_id: &str,
        user_id: &str,
        range: &DateRange,
    ) -> Result<Vec<CompletionRecord>>;

    /// Number of records in `range`.
    fn count_records_in_range(&self, habit_id: &str, user_id: &str, range: &DateRange)
    -> Result<u64>;

    /// One page of records in `range`, newest first.
    fn find_records_page(
        &self,
        habit_id: &str,
        user_id: &str,
        range: &DateRange,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<CompletionRecord>>;
}

/// Operations available inside [`Storage::run_in_transaction`].
pub trait Transaction: HabitRepository + CompletionLedger {}

impl<T: HabitRepository + CompletionLedger> Transaction for T {}

// ---------------------------------------------------------------------------
// Storage trait
// ---------------------------------------------------------------------------

/// A complete storage backend.
pub trait Storage: HabitRepository + CompletionLedger + Send + Sync {
    /// Inserts a new habit. Fails with `AlreadyExists` if the id is taken.
    fn create_habit(&self, habit: &Habit) -> Result<()>;

    /// Activates or deactivates a habit owned by `user_id`.
    fn set_habit_active(&self, habit_id: &str, user_id: &str, active: bool) -> Result<()>;

    /// Lists the habits of a user, oldest first.
    fn list_habits(&self, user_id: &str, include_inactive: bool) -> Result<Vec<Habit>>;

    /// Runs `f` as one unit of work.
    ///
    /// Everything `f` writes commits together when it returns `Ok`, and is
    /// rolled back when it returns an error.
    fn run_in_transaction(
        &self,
        f: &mut dyn FnMut(&dyn Transaction) -> Result<()>,
    ) -> Result<()>;

    /// Releases backend resources.
    fn close(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    #[test]
    fn date_range_bounds_are_inclusive() {
        let range = DateRange::between(day(1, 2), day(1, 4));
        assert!(!range.contains(day(1, 1)));
        assert!(range.contains(day(1, 2)));
        assert!(range.contains(day(1, 4)));
        assert!(!range.contains(day(1, 5)));

        let open = DateRange {
            from: Some(day(3, 1)),
            to: None,
        };
        assert!(open.contains(day(12, 31)));
        assert!(DateRange::all().contains(day(1, 1)));
    }
}
