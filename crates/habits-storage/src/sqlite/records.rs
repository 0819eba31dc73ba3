//! Completion ledger operations for [`SqliteStore`].

use std::collections::BTreeSet;

use chrono::{NaiveDate, Utc};
use rusqlite::types::ToSql;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;

use habits_core::day;
use habits_core::record::{CompletionRecord, RecordFields, RecordKey};

use crate::error::{Result, StorageError};
use crate::sqlite::habits::{format_datetime, parse_datetime, parse_day_column};
use crate::sqlite::store::SqliteStore;
use crate::traits::DateRange;

const RECORD_COLUMNS: &str = "id, habit_id, user_id, date, completed, value, notes, updated_at";

fn scan_record(row: &Row<'_>) -> rusqlite::Result<CompletionRecord> {
    let updated_at: String = row.get(7)?;
    Ok(CompletionRecord {
        id: row.get("id")?,
        habit_id: row.get("habit_id")?,
        user_id: row.get("user_id")?,
        date: parse_day_column(row, 3)?,
        completed: row.get("completed")?,
        value: row.get("value")?,
        notes: row.get("notes")?,
        updated_at: parse_datetime(7, &updated_at)?,
    })
}

/// Builds the `WHERE` clause shared by the range queries.
///
/// Parameters are `habit_id`, `user_id`, then the present bounds in order.
fn range_filter(habit_id: &str, user_id: &str, range: &DateRange) -> (String, Vec<Box<dyn ToSql>>) {
    let mut clause = String::from("habit_id = ?1 AND user_id = ?2");
    let mut values: Vec<Box<dyn ToSql>> = vec![
        Box::new(habit_id.to_string()),
        Box::new(user_id.to_string()),
    ];
    if let Some(from) = range.from {
        values.push(Box::new(day::format_day(from)));
        clause.push_str(&format!(" AND date >= ?{}", values.len()));
    }
    if let Some(to) = range.to {
        values.push(Box::new(day::format_day(to)));
        clause.push_str(&format!(" AND date <= ?{}", values.len()));
    }
    (clause, values)
}

fn collect_dates(conn: &Connection, sql: &str, values: &[&dyn ToSql]) -> Result<BTreeSet<NaiveDate>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(values, |row| parse_day_column(row, 0))?;
    let mut dates = BTreeSet::new();
    for row in rows {
        dates.insert(row?);
    }
    Ok(dates)
}

// ---------------------------------------------------------------------------
// Connection-level helpers (shared with Transaction)
// ---------------------------------------------------------------------------

/// Inserts the record for `key`, or overwrites the fields of the existing one.
pub(crate) fn upsert_record_on_conn(
    conn: &Connection,
    key: &RecordKey,
    fields: &RecordFields,
) -> Result<CompletionRecord> {
    let now = format_datetime(&Utc::now());
    conn.execute(
        "INSERT INTO completion_records (habit_id, user_id, date, completed, value, notes, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT (habit_id, user_id, date) DO UPDATE SET
            completed = excluded.completed,
            value = excluded.value,
            notes = excluded.notes,
            updated_at = excluded.updated_at",
        params![
            key.habit_id,
            key.user_id,
            day::format_day(key.date),
            fields.completed,
            fields.value,
            fields.notes,
            now,
        ],
    )?;
    debug!(habit = %key.habit_id, date = %key.date, completed = fields.completed, "record upserted");

    find_record_on_conn(conn, key)?.ok_or_else(|| {
        StorageError::Internal(format!(
            "record for {} on {} vanished after upsert",
            key.habit_id, key.date
        ))
    })
}

/// Loads the record for `key`.
pub(crate) fn find_record_on_conn(
    conn: &Connection,
    key: &RecordKey,
) -> Result<Option<CompletionRecord>> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM completion_records
         WHERE habit_id = ?1 AND user_id = ?2 AND date = ?3"
    );
    let record = conn
        .query_row(
            &sql,
            params![key.habit_id, key.user_id, day::format_day(key.date)],
            scan_record,
        )
        .optional()?;
    Ok(record)
}

/// Completed days in `[from, to]`.
pub(crate) fn completed_dates_in_range_on_conn(
    conn: &Connection,
    habit_id: &str,
    user_id: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<BTreeSet<NaiveDate>> {
    collect_dates(
        conn,
        "SELECT date FROM completion_records
         WHERE habit_id = ?1 AND user_id = ?2 AND completed = 1
           AND date >= ?3 AND date <= ?4",
        params![habit_id, user_id, day::format_day(from), day::format_day(to)],
    )
}

/// Every completed day.
pub(crate) fn all_completed_dates_on_conn(
    conn: &Connection,
    habit_id: &str,
    user_id: &str,
) -> Result<BTreeSet<NaiveDate>> {
    collect_dates(
        conn,
        "SELECT date FROM completion_records
         WHERE habit_id = ?1 AND user_id = ?2 AND completed = 1",
        params![habit_id, user_id],
    )
}

/// Records in `range`, oldest first.
pub(crate) fn records_in_range_on_conn(
    conn: &Connection,
    habit_id: &str,
    user_id: &str,
    range: &DateRange,
) -> Result<Vec<CompletionRecord>> {
    let (clause, values) = range_filter(habit_id, user_id, range);
    let sql = format!("SELECT {RECORD_COLUMNS} FROM completion_records WHERE {clause} ORDER BY date ASC");
    let refs: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(refs.as_slice(), scan_record)?;
    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }
    Ok(records)
}

/// Number of records in `range`.
pub(crate) fn count_records_on_conn(
    conn: &Connection,
    habit_id: &str,
    user_id: &str,
    range: &DateRange,
) -> Result<u64> {
    let (clause, values) = range_filter(habit_id, user_id, range);
    let sql = format!("SELECT COUNT(*) FROM completion_records WHERE {clause}");
    let refs: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let count: i64 = conn.query_row(&sql, refs.as_slice(), |row| row.get(0))?;
    Ok(u64::try_from(count).unwrap_or(0))
}

/// One page of records in `range`, newest first.
pub(crate) fn records_page_on_conn(
    conn: &Connection,
    habit_id: &str,
    user_id: &str,
    range: &DateRange,
    limit: u32,
    offset: u64,
) -> Result<Vec<CompletionRecord>> {
    let (clause, mut values) = range_filter(habit_id, user_id, range);
    values.push(Box::new(limit));
    let limit_idx = values.len();
    values.push(Box::new(i64::try_from(offset).unwrap_or(i64::MAX)));
    let offset_idx = values.len();

    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM completion_records WHERE {clause}
         ORDER BY date DESC LIMIT ?{limit_idx} OFFSET ?{offset_idx}"
    );
    let refs: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(refs.as_slice(), scan_record)?;
    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }
    Ok(records)
}

// ---------------------------------------------------------------------------
// SqliteStore methods
// ---------------------------------------------------------------------------

impl SqliteStore {
    /// Upserts a completion record.
    pub fn upsert_record_impl(
        &self,
        key: &RecordKey,
        fields: &RecordFields,
    ) -> Result<CompletionRecord> {
        let conn = self.lock_conn()?;
        upsert_record_on_conn(&conn, key, fields)
    }

    /// Loads the record for `key`.
    pub fn find_record_impl(&self, key: &RecordKey) -> Result<Option<CompletionRecord>> {
        let conn = self.lock_conn()?;
        find_record_on_conn(&conn, key)
    }

    /// Completed days in `[from, to]`.
    pub fn completed_dates_in_range_impl(
        &self,
        habit_id: &str,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<BTreeSet<NaiveDate>> {
        let conn = self.lock_conn()?;
        completed_dates_in_range_on_conn(&conn, habit_id, user_id, from, to)
    }

    /// Every completed day.
    pub fn all_completed_dates_impl(
        &self,
        habit_id: &str,
        user_id: &str,
    ) -> Result<BTreeSet<NaiveDate>> {
        let conn = self.lock_conn()?;
        all_completed_dates_on_conn(&conn, habit_id, user_id)
    }

    /// Records in `range`, oldest first.
    pub fn records_in_range_impl(
        &self,
        habit_id: &str,
        user_id: &str,
        range: &DateRange,
    ) -> Result<Vec<CompletionRecord>> {
        let conn = self.lock_conn()?;
        records_in_range_on_conn(&conn, habit_id, user_id, range)
    }

    /// Number of records in `range`.
    pub fn count_records_impl(&self, habit_id: &str, user_id: &str, range: &DateRange) -> Result<u64> {
        let conn = self.lock_conn()?;
        count_records_on_conn(&conn, habit_id, user_id, range)
    }

    /// One page of records in `range`, newest first.
    pub fn records_page_impl(
        &self,
        habit_id: &str,
        user_id: &str,
        range: &DateRange,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<CompletionRecord>> {
        let conn = self.lock_conn()?;
        records_page_on_conn(&conn, habit_id, user_id, range, limit, offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Days;
    use habits_core::habit::HabitBuilder;
    use pretty_assertions::assert_eq;

    fn day0() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn d(offset: u64) -> NaiveDate {
        day0() + Days::new(offset)
    }

    fn store_with_habit() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        let habit = HabitBuilder::new("Walk")
            .id("hb-walk")
            .user("alice")
            .created_at(day0())
            .build();
        store.create_habit_impl(&habit).unwrap();
        store
    }

    fn mark(store: &SqliteStore, offset: u64, completed: bool) -> CompletionRecord {
        let key = RecordKey::new("hb-walk", "alice", d(offset));
        let fields = RecordFields {
            completed,
            ..Default::default()
        };
        store.upsert_record_impl(&key, &fields).unwrap()
    }

    #[test]
    fn upsert_keeps_one_row_per_day() {
        let store = store_with_habit();
        let first = mark(&store, 0, true);

        let key = RecordKey::new("hb-walk", "alice", d(0));
        let fields = RecordFields {
            completed: false,
            value: None,
            notes: Some("rained".into()),
        };
        let second = store.upsert_record_impl(&key, &fields).unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.fields(), fields);
        let conn = store.lock_conn().unwrap();
        let count = count_records_on_conn(&conn, "hb-walk", "alice", &DateRange::all()).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn find_record_missing_is_none() {
        let store = store_with_habit();
        let key = RecordKey::new("hb-walk", "alice", d(5));
        assert!(store.find_record_impl(&key).unwrap().is_none());
    }

    #[test]
    fn record_for_unknown_habit_violates_foreign_key() {
        let store = store_with_habit();
        let key = RecordKey::new("hb-ghost", "alice", d(0));
        assert!(store.upsert_record_impl(&key, &RecordFields::default()).is_err());
    }

    #[test]
    fn completed_dates_skip_unmarked_days() {
        let store = store_with_habit();
        for offset in 0..5 {
            mark(&store, offset, offset != 2);
        }
        let conn = store.lock_conn().unwrap();

        let all = all_completed_dates_on_conn(&conn, "hb-walk", "alice").unwrap();
        assert_eq!(all, BTreeSet::from([d(0), d(1), d(3), d(4)]));

        let recent = completed_dates_in_range_on_conn(&conn, "hb-walk", "alice", d(1), d(3)).unwrap();
        assert_eq!(recent, BTreeSet::from([d(1), d(3)]));

        let other_user = all_completed_dates_on_conn(&conn, "hb-walk", "bob").unwrap();
        assert!(other_user.is_empty());
    }

    #[test]
    fn range_queries_order_and_bound() {
        let store = store_with_habit();
        for offset in [4, 0, 2, 1, 3] {
            mark(&store, offset, true);
        }
        let conn = store.lock_conn().unwrap();

        let range = DateRange::between(d(1), d(3));
        let dates: Vec<NaiveDate> = records_in_range_on_conn(&conn, "hb-walk", "alice", &range)
            .unwrap()
            .into_iter()
            .map(|r| r.date)
            .collect();
        assert_eq!(dates, vec![d(1), d(2), d(3)]);
        assert_eq!(count_records_on_conn(&conn, "hb-walk", "alice", &range).unwrap(), 3);

        let open_ended = DateRange {
            from: Some(d(3)),
            to: None,
        };
        assert_eq!(count_records_on_conn(&conn, "hb-walk", "alice", &open_ended).unwrap(), 2);
    }

    #[test]
    fn pages_are_newest_first() {
        let store = store_with_habit();
        for offset in 0..5 {
            mark(&store, offset, true);
        }
        let conn = store.lock_conn().unwrap();

        let page = |limit, offset| -> Vec<NaiveDate> {
            records_page_on_conn(&conn, "hb-walk", "alice", &DateRange::all(), limit, offset)
                .unwrap()
                .into_iter()
                .map(|r| r.date)
                .collect()
        };
        assert_eq!(page(2, 0), vec![d(4), d(3)]);
        assert_eq!(page(2, 2), vec![d(2), d(1)]);
        assert_eq!(page(2, 4), vec![d(0)]);
        assert!(page(2, 6).is_empty());
    }

    #[test]
    fn corrupt_timestamp_is_a_read_error() {
        let store = store_with_habit();
        mark(&store, 0, true);
        store
            .lock_conn()
            .unwrap()
            .execute("UPDATE completion_records SET updated_at = 'not a time'", [])
            .unwrap();

        let key = RecordKey::new("hb-walk", "alice", d(0));
        let err = store.find_record_impl(&key).unwrap_err();
        assert!(
            matches!(
                err,
                StorageError::Query(rusqlite::Error::FromSqlConversionFailure(7, _, _))
            ),
            "unexpected error: {err}"
        );
    }
}
