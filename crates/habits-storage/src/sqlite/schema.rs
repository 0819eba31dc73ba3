//! DDL statements for the SQLite schema.
//!
//! Calendar days are stored as `YYYY-MM-DD` TEXT, so equality on a day never
//! depends on a time zone. Timestamps are ISO 8601 TEXT, booleans INTEGER
//! (0/1) and weekday sets a JSON array of day numbers.

/// Current schema version. Bumped whenever the DDL changes.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Core DDL statements executed during `init_schema`.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    // -- Habits table --------------------------------------------------------
    r#"
    CREATE TABLE IF NOT EXISTS habits (
        id                  TEXT PRIMARY KEY,
        user_id             TEXT NOT NULL,
        title               TEXT NOT NULL,
        recurrence          TEXT NOT NULL DEFAULT 'daily',
        week_days           TEXT NOT NULL DEFAULT '[]',
        value_type          TEXT NOT NULL DEFAULT 'check',
        target_value        REAL,
        created_at          TEXT NOT NULL,
        active              INTEGER NOT NULL DEFAULT 1,
        current_streak      INTEGER NOT NULL DEFAULT 0,
        longest_streak      INTEGER NOT NULL DEFAULT 0,
        last_completed_date TEXT,
        version             INTEGER NOT NULL DEFAULT 0,
        updated_at          TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        CHECK (longest_streak >= current_streak)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_habits_user ON habits(user_id, active)",
    // -- Completion records --------------------------------------------------
    r#"
    CREATE TABLE IF NOT EXISTS completion_records (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        habit_id    TEXT NOT NULL,
        user_id     TEXT NOT NULL,
        date        TEXT NOT NULL,
        completed   INTEGER NOT NULL DEFAULT 0,
        value       REAL,
        notes       TEXT,
        updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        UNIQUE (habit_id, user_id, date),
        FOREIGN KEY (habit_id) REFERENCES habits(id) ON DELETE CASCADE
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_records_completed ON completion_records(habit_id, user_id, completed, date)",
    // -- Config table --------------------------------------------------------
    r#"
    CREATE TABLE IF NOT EXISTS config (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
    "#,
];
