//! Storage backend for the habits system.
//!
//! Provides the [`HabitRepository`], [`CompletionLedger`] and [`Storage`]
//! traits and a SQLite implementation ([`SqliteStore`]).

pub mod error;
pub mod sqlite;
pub mod traits;

// Re-exports for convenience.
pub use error::StorageError;
pub use sqlite::SqliteStore;
pub use traits::{CompletionLedger, DateRange, HabitRepository, Storage, Transaction};

// ---------------------------------------------------------------------------
// Trait implementations for SqliteStore
// ---------------------------------------------------------------------------

use std::collections::BTreeSet;

use chrono::NaiveDate;

use habits_core::habit::Habit;
use habits_core::record::{CompletionRecord, RecordFields, RecordKey};

use crate::error::Result;

impl HabitRepository for SqliteStore {
    fn find_active_by_id(&self, habit_id: &str, user_id: &str) -> Result<Option<Habit>> {
        self.find_habit_impl(habit_id, user_id, true)
    }

    fn find_by_id(&self, habit_id: &str, user_id: &str) -> Result<Option<Habit>> {
        self.find_habit_impl(habit_id, user_id, false)
    }

    fn save_habit(&self, habit: &Habit) -> Result<Habit> {
        self.save_habit_impl(habit)
    }
}

impl CompletionLedger for SqliteStore {
    fn upsert_record(&self, key: &RecordKey, fields: &RecordFields) -> Result<CompletionRecord> {
        self.upsert_record_impl(key, fields)
    }

    fn find_record(&self, key: &RecordKey) -> Result<Option<CompletionRecord>> {
        self.find_record_impl(key)
    }

    fn find_completed_dates_in_range(
        &self,
        habit_id: &str,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<BTreeSet<NaiveDate>> {
        self.completed_dates_in_range_impl(habit_id, user_id, from, to)
    }

    fn find_all_completed_dates(
        &self,
        habit_id: &str,
        user_id: &str,
    ) -> Result<BTreeSet<NaiveDate>> {
        self.all_completed_dates_impl(habit_id, user_id)
    }

    fn find_records_in_range(
        &self,
        habit_id: &str,
        user_id: &str,
        range: &DateRange,
    ) -> Result<Vec<CompletionRecord>> {
        self.records_in_range_impl(habit_id, user_id, range)
    }

    fn count_records_in_range(
        &self,
        habit_id: &str,
        user_id: &str,
        range: &DateRange,
    ) -> Result<u64> {
        self.count_records_impl(habit_id, user_id, range)
    }

    fn find_records_page(
        &self,
        habit_id: &str,
        user_id: &str,
        range: &DateRange,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<CompletionRecord>> {
        self.records_page_impl(habit_id, user_id, range, limit, offset)
    }
}

impl Storage for SqliteStore {
    fn create_habit(&self, habit: &Habit) -> Result<()> {
        self.create_habit_impl(habit)
    }

    fn set_habit_active(&self, habit_id: &str, user_id: &str, active: bool) -> Result<()> {
        self.set_habit_active_impl(habit_id, user_id, active)
    }

    fn list_habits(&self, user_id: &str, include_inactive: bool) -> Result<Vec<Habit>> {
        self.list_habits_impl(user_id, include_inactive)
    }

    fn run_in_transaction(
        &self,
        f: &mut dyn FnMut(&dyn Transaction) -> Result<()>,
    ) -> Result<()> {
        self.run_in_transaction_impl(f)
    }

    fn close(&self) -> Result<()> {
        self.close_impl()
    }
}
