//! Habit CRUD operations for [`SqliteStore`].

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{debug, warn};

use habits_core::day;
use habits_core::habit::{Habit, Measure};
use habits_core::recurrence::Recurrence;

use crate::error::{Result, StorageError};
use crate::sqlite::store::SqliteStore;

/// Column list for `SELECT` queries on the habits table.
pub(crate) const HABIT_COLUMNS: &str = "\
    id, user_id, title, recurrence, week_days, value_type, target_value, \
    created_at, active, current_streak, longest_streak, last_completed_date, version";

// ---------------------------------------------------------------------------
// Row scanning and column formats
// ---------------------------------------------------------------------------

/// Scans a single row into a [`Habit`].
pub(crate) fn scan_habit(row: &Row<'_>) -> rusqlite::Result<Habit> {
    let recurrence_kind: String = row.get("recurrence")?;
    let week_days_json: String = row.get("week_days")?;
    let week_days: Vec<u8> = serde_json::from_str(&week_days_json)
        .map_err(|e| conversion_error(4, e))?;
    let recurrence =
        Recurrence::from_parts(&recurrence_kind, &week_days).map_err(|e| conversion_error(3, e))?;

    let value_type: String = row.get("value_type")?;
    let target_value: Option<f64> = row.get("target_value")?;
    let measure = Measure::from_parts(&value_type, target_value).map_err(|e| conversion_error(5, e))?;

    let created_at = parse_day_column(row, 7)?;
    let last_completed_date = match row.get::<_, Option<String>>(11)? {
        Some(s) => Some(parse_day_text(11, &s)?),
        None => None,
    };

    Ok(Habit {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        title: row.get("title")?,
        recurrence,
        measure,
        created_at,
        active: row.get("active")?,
        current_streak: row.get("current_streak")?,
        longest_streak: row.get("longest_streak")?,
        last_completed_date,
        version: row.get("version")?,
    })
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

/// Reads a `YYYY-MM-DD` column.
pub(crate) fn parse_day_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let s: String = row.get(idx)?;
    parse_day_text(idx, &s)
}

fn parse_day_text(idx: usize, s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| conversion_error(idx, e))
}

/// Formats a `DateTime<Utc>` as ISO 8601 for SQLite TEXT storage.
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Parses an ISO 8601 TEXT column into a `DateTime<Utc>`.
///
/// Also accepts SQLite's `YYYY-MM-DD HH:MM:SS` form. Anything else is a
/// conversion failure on column `idx`.
pub(crate) fn parse_datetime(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    s.parse::<DateTime<Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.fZ")
                .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
                .map(|ndt| ndt.and_utc())
        })
        .map_err(|e| conversion_error(idx, e))
}

fn week_days_json(habit: &Habit) -> Result<String> {
    Ok(serde_json::to_string(&habit.recurrence.week_days())?)
}

// ---------------------------------------------------------------------------
// Connection-level helpers (shared with Transaction)
// ---------------------------------------------------------------------------

/// Inserts a new habit.
pub(crate) fn insert_habit_on_conn(conn: &Connection, habit: &Habit) -> Result<()> {
    let now = format_datetime(&Utc::now());
    conn.execute(
        "INSERT INTO habits (
            id, user_id, title, recurrence, week_days, value_type, target_value,
            created_at, active, current_streak, longest_streak, last_completed_date,
            version, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            habit.id,
            habit.user_id,
            habit.title,
            habit.recurrence.kind(),
            week_days_json(habit)?,
            habit.measure.as_str(),
            habit.measure.target(),
            day::format_day(habit.created_at),
            habit.active,
            habit.current_streak,
            habit.longest_streak,
            habit.last_completed_date.map(day::format_day),
            habit.version,
            now,
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(ref f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StorageError::AlreadyExists {
                entity: "habit".into(),
                id: habit.id.clone(),
            }
        }
        other => StorageError::Query(other),
    })?;
    debug!(id = %habit.id, user = %habit.user_id, "habit inserted");
    Ok(())
}

/// Loads a habit owned by `user_id`, optionally requiring it to be active.
pub(crate) fn find_habit_on_conn(
    conn: &Connection,
    habit_id: &str,
    user_id: &str,
    active_only: bool,
) -> Result<Option<Habit>> {
    let sql = format!(
        "SELECT {HABIT_COLUMNS} FROM habits
         WHERE id = ?1 AND user_id = ?2 AND (?3 = 0 OR active = 1)"
    );
    let habit = conn
        .query_row(&sql, params![habit_id, user_id, active_only], scan_habit)
        .optional()?;
    Ok(habit)
}

/// Writes the mutable fields of a habit, guarded by its version.
pub(crate) fn save_habit_on_conn(conn: &Connection, habit: &Habit) -> Result<Habit> {
    let now = format_datetime(&Utc::now());
    let updated = conn.execute(
        "UPDATE habits SET
            title = ?1, recurrence = ?2, week_days = ?3, value_type = ?4,
            target_value = ?5, active = ?6, current_streak = ?7,
            longest_streak = ?8, last_completed_date = ?9,
            version = version + 1, updated_at = ?10
         WHERE id = ?11 AND user_id = ?12 AND version = ?13",
        params![
            habit.title,
            habit.recurrence.kind(),
            week_days_json(habit)?,
            habit.measure.as_str(),
            habit.measure.target(),
            habit.active,
            habit.current_streak,
            habit.longest_streak,
            habit.last_completed_date.map(day::format_day),
            now,
            habit.id,
            habit.user_id,
            habit.version,
        ],
    )?;

    if updated == 0 {
        let exists: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM habits WHERE id = ?1 AND user_id = ?2",
            params![habit.id, habit.user_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(StorageError::not_found("habit", &habit.id));
        }
        warn!(id = %habit.id, version = habit.version, "habit save lost a version race");
        return Err(StorageError::Conflict {
            id: habit.id.clone(),
            expected: habit.version,
        });
    }

    let mut saved = habit.clone();
    saved.version += 1;
    Ok(saved)
}

/// Flips the active flag of a habit.
pub(crate) fn set_active_on_conn(
    conn: &Connection,
    habit_id: &str,
    user_id: &str,
    active: bool,
) -> Result<()> {
    let now = format_datetime(&Utc::now());
    let updated = conn.execute(
        "UPDATE habits SET active = ?1, version = version + 1, updated_at = ?2
         WHERE id = ?3 AND user_id = ?4",
        params![active, now, habit_id, user_id],
    )?;
    if updated == 0 {
        return Err(StorageError::not_found("habit", habit_id));
    }
    debug!(id = habit_id, active, "habit active flag changed");
    Ok(())
}

/// Lists the habits of a user, oldest first.
pub(crate) fn list_habits_on_conn(
    conn: &Connection,
    user_id: &str,
    include_inactive: bool,
) -> Result<Vec<Habit>> {
    let sql = format!(
        "SELECT {HABIT_COLUMNS} FROM habits
         WHERE user_id = ?1 AND (?2 = 1 OR active = 1)
         ORDER BY created_at, id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![user_id, include_inactive], scan_habit)?;
    let mut habits = Vec::new();
    for row in rows {
        habits.push(row?);
    }
    Ok(habits)
}

// ---------------------------------------------------------------------------
// SqliteStore methods
// ---------------------------------------------------------------------------

impl SqliteStore {
    /// Inserts a new habit.
    pub fn create_habit_impl(&self, habit: &Habit) -> Result<()> {
        let conn = self.lock_conn()?;
        insert_habit_on_conn(&conn, habit)
    }

    /// Loads a habit owned by `user_id`.
    pub fn find_habit_impl(
        &self,
        habit_id: &str,
        user_id: &str,
        active_only: bool,
    ) -> Result<Option<Habit>> {
        let conn = self.lock_conn()?;
        find_habit_on_conn(&conn, habit_id, user_id, active_only)
    }

    /// Saves a habit with a version check.
    pub fn save_habit_impl(&self, habit: &Habit) -> Result<Habit> {
        let conn = self.lock_conn()?;
        save_habit_on_conn(&conn, habit)
    }

    /// Activates or deactivates a habit.
    pub fn set_habit_active_impl(&self, habit_id: &str, user_id: &str, active: bool) -> Result<()> {
        let conn = self.lock_conn()?;
        set_active_on_conn(&conn, habit_id, user_id, active)
    }

    /// Lists the habits of a user.
    pub fn list_habits_impl(&self, user_id: &str, include_inactive: bool) -> Result<Vec<Habit>> {
        let conn = self.lock_conn()?;
        list_habits_on_conn(&conn, user_id, include_inactive)
    }
}
