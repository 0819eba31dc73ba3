//! Runtime context for command execution.
//!
//! The [`RuntimeContext`] holds the resolved global flags. Commands that touch
//! habit data call [`RuntimeContext::open_workspace`] to get a record service
//! bound to the current user.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use tracing::debug;

use habits_config::{HabitsConfig, find_habits_dir, load_config};
use habits_core::day;
use habits_service::{RecordService, ServiceOptions};
use habits_storage::SqliteStore;

use crate::cli::GlobalArgs;

/// Runtime context passed to every command handler.
///
/// Constructed once in `main` after CLI parsing, before command dispatch.
#[derive(Debug)]
pub struct RuntimeContext {
    /// Explicit database path from `--db`.
    pub db_path: Option<PathBuf>,

    /// User from `--user` or `HB_USER`.
    pub user: Option<String>,

    /// Whether to produce JSON output.
    pub json: bool,

    /// Verbose output.
    pub verbose: bool,

    /// Quiet mode: suppress non-essential output.
    pub quiet: bool,
}

/// An opened database plus the user the command acts for.
pub struct Workspace {
    pub service: RecordService<SqliteStore>,
    pub user: String,
}

impl Workspace {
    /// Parses a day argument relative to the service clock.
    pub fn parse_day(&self, input: &str) -> Result<NaiveDate> {
        Ok(day::parse_day(input, self.service.today())?)
    }

    /// Parses an optional day argument, defaulting to today.
    pub fn parse_day_or_today(&self, input: Option<&str>) -> Result<NaiveDate> {
        match input {
            Some(input) => self.parse_day(input),
            None => Ok(self.service.today()),
        }
    }
}

impl RuntimeContext {
    /// Build a `RuntimeContext` from parsed global arguments.
    pub fn from_global_args(global: &GlobalArgs) -> Self {
        Self {
            db_path: global.db.as_ref().map(PathBuf::from),
            user: global
                .user
                .as_deref()
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(String::from),
            json: global.json,
            verbose: global.verbose,
            quiet: global.quiet,
        }
    }

    /// Discover the `.habits` directory by walking up from the current directory.
    pub fn find_habits_dir() -> Option<PathBuf> {
        let cwd = env::current_dir().ok()?;
        find_habits_dir(&cwd)
    }

    /// Loads the configuration of the discovered `.habits` directory, or the
    /// defaults when there is none.
    pub fn load_config(&self) -> Result<HabitsConfig> {
        match Self::find_habits_dir() {
            Some(dir) => load_config(&dir)
                .with_context(|| format!("failed to load config from {}", dir.display())),
            None => Ok(HabitsConfig::default()),
        }
    }

    /// Resolves the database path: `--db` first, then the configured database
    /// inside the discovered `.habits` directory.
    pub fn resolve_db_path(&self, config: &HabitsConfig) -> Result<PathBuf> {
        if let Some(path) = &self.db_path {
            return Ok(path.clone());
        }

        let habits_dir = Self::find_habits_dir()
            .context("no habits database found. Run 'hb init' to create one.")?;
        let db_path = config.database_path(&habits_dir);
        if !db_path.exists() {
            bail!(
                "no habits database found at {}\nHint: run 'hb init' to create a database",
                db_path.display()
            );
        }
        Ok(db_path)
    }

    /// Resolves the acting user: `--user` / `HB_USER`, then `user` from config.
    pub fn resolve_user(&self, config: &HabitsConfig) -> Result<String> {
        self.user
            .clone()
            .or_else(|| config.user.clone().filter(|u| !u.trim().is_empty()))
            .context("no user set. Pass --user, set HB_USER, or set 'user' in .habits/config.yaml")
    }

    /// Opens the database and builds a record service for the acting user.
    pub fn open_workspace(&self) -> Result<Workspace> {
        let config = self.load_config()?;
        let user = self.resolve_user(&config)?;
        let db_path = self.resolve_db_path(&config)?;
        debug!(db = %db_path.display(), user = %user, "opening workspace");

        let store = SqliteStore::open(&db_path)
            .with_context(|| format!("failed to open database: {}", db_path.display()))?;
        let service = RecordService::new(store).with_options(ServiceOptions {
            max_lookback_days: config.streak.max_lookback_days,
            conflict_retries: config.service.conflict_retries,
        });
        Ok(Workspace { service, user })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global(user: Option<&str>) -> GlobalArgs {
        GlobalArgs {
            db: None,
            user: user.map(String::from),
            json: false,
            verbose: false,
            quiet: false,
        }
    }

    #[test]
    fn flag_user_wins_over_config() {
        let ctx = RuntimeContext::from_global_args(&global(Some("alice")));
        let config = HabitsConfig {
            user: Some("bob".into()),
            ..Default::default()
        };
        assert_eq!(ctx.resolve_user(&config).unwrap(), "alice");
    }

    #[test]
    fn blank_flag_user_falls_back_to_config() {
        let ctx = RuntimeContext::from_global_args(&global(Some("  ")));
        let config = HabitsConfig {
            user: Some("bob".into()),
            ..Default::default()
        };
        assert_eq!(ctx.resolve_user(&config).unwrap(), "bob");
    }

    #[test]
    fn missing_user_is_an_error() {
        let ctx = RuntimeContext::from_global_args(&global(None));
        let err = ctx.resolve_user(&HabitsConfig::default()).unwrap_err();
        assert!(err.to_string().contains("no user set"));
    }

    #[test]
    fn explicit_db_path_is_used_as_is() {
        let mut args = global(None);
        args.db = Some("/tmp/somewhere/h.db".into());
        let ctx = RuntimeContext::from_global_args(&args);
        assert_eq!(
            ctx.resolve_db_path(&HabitsConfig::default()).unwrap(),
            PathBuf::from("/tmp/somewhere/h.db")
        );
    }
}
