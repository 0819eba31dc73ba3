//! Transaction wrapper for [`SqliteStore`].

use std::collections::BTreeSet;

use chrono::NaiveDate;
use rusqlite::{Connection, TransactionBehavior};
use tracing::debug;

use habits_core::habit::Habit;
use habits_core::record::{CompletionRecord, RecordFields, RecordKey};

use crate::error::{Result, StorageError};
use crate::sqlite::habits;
use crate::sqlite::records;
use crate::sqlite::store::SqliteStore;
use crate::traits::{CompletionLedger, DateRange, HabitRepository, Transaction};

/// A thin wrapper around a SQLite connection that is inside a transaction.
///
/// Implements the repository traits by delegating to the same
/// connection-level helpers used by [`SqliteStore`].
pub(crate) struct SqliteTx<'a> {
    pub(crate) conn: &'a Connection,
}

impl HabitRepository for SqliteTx<'_> {
    fn find_active_by_id(&self, habit_id: &str, user_id: &str) -> Result<Option<Habit>> {
        habits::find_habit_on_conn(self.conn, habit_id, user_id, true)
    }

    fn find_by_id(&self, habit_id: &str, user_id: &str) -> Result<Option<Habit>> {
        habits::find_habit_on_conn(self.conn, habit_id, user_id, false)
    }

    fn save_habit(&self, habit: &Habit) -> Result<Habit> {
        habits::save_habit_on_conn(self.conn, habit)
    }
}

impl CompletionLedger for SqliteTx<'_> {
    fn upsert_record(&self, key: &RecordKey, fields: &RecordFields) -> Result<CompletionRecord> {
        records::upsert_record_on_conn(self.conn, key, fields)
    }

    fn find_record(&self, key: &RecordKey) -> Result<Option<CompletionRecord>> {
        records::find_record_on_conn(self.conn, key)
    }

    fn find_completed_dates_in_range(
        &self,
        habit_id: &str,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<BTreeSet<NaiveDate>> {
        records::completed_dates_in_range_on_conn(self.conn, habit_id, user_id, from, to)
    }

    fn find_all_completed_dates(
        &self,
        habit_id: &str,
        user_id: &str,
    ) -> Result<BTreeSet<NaiveDate>> {
        records::all_completed_dates_on_conn(self.conn, habit_id, user_id)
    }

    fn find_records_in_range(
        &self,
        habit_id: &str,
        user_id: &str,
        range: &DateRange,
    ) -> Result<Vec<CompletionRecord>> {
        records::records_in_range_on_conn(self.conn, habit_id, user_id, range)
    }

    fn count_records_in_range(
        &self,
        habit_id: &str,
        user_id: &str,
        range: &DateRange,
    ) -> Result<u64> {
        records::count_records_on_conn(self.conn, habit_id, user_id, range)
    }

    fn find_records_page(
        &self,
        habit_id: &str,
        user_id: &str,
        range: &DateRange,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<CompletionRecord>> {
        records::records_page_on_conn(self.conn, habit_id, user_id, range, limit, offset)
    }
}

// ---------------------------------------------------------------------------
// SqliteStore::run_in_transaction
// ---------------------------------------------------------------------------

impl SqliteStore {
    /// Runs a closure inside a database transaction.
    ///
    /// The connection lock is held from `BEGIN IMMEDIATE` to commit, so units
    /// of work on one store never interleave. The transaction is rolled back
    /// when the closure fails.
    pub fn run_in_transaction_impl(
        &self,
        f: &mut dyn FnMut(&dyn Transaction) -> Result<()>,
    ) -> Result<()> {
        let conn = self.lock_conn()?;
        let tx = rusqlite::Transaction::new_unchecked(&conn, TransactionBehavior::Immediate)
            .map_err(|e| transaction_error("begin", e))?;

        let sqlite_tx = SqliteTx { conn: &tx };
        match f(&sqlite_tx) {
            Ok(()) => {
                tx.commit().map_err(|e| transaction_error("commit", e))?;
                Ok(())
            }
            Err(e) => {
                debug!(error = %e, "rolling back transaction");
                // Rolled back on drop.
                Err(e)
            }
        }
    }
}

/// Maps a failed `BEGIN` or `COMMIT`. A busy or locked database stays a
/// query error so callers can tell it is worth retrying.
fn transaction_error(action: &str, e: rusqlite::Error) -> StorageError {
    let err = StorageError::Query(e);
    if err.is_retryable() {
        return err;
    }
    StorageError::Transaction(format!("failed to {action}: {err}"))
}
