//! Configuration types and loading for the habits system.
//!
//! The main entry point is [`HabitsConfig`], which represents the contents of
//! `.habits/config.yaml`. Configuration is loaded with [`load_config`] and
//! saved with [`save_config`].
//!
//! Layers, lowest priority first: built-in defaults, the YAML file, then
//! environment variables prefixed with `HABITS_`. Nested keys use `__`, so
//! `HABITS_STREAK__MAX_LOOKBACK_DAYS=14` sets `streak.max_lookback_days`.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use habits_core::recurrence::DEFAULT_MAX_LOOKBACK_DAYS;

/// File name of the configuration inside `.habits/`.
pub const CONFIG_FILE: &str = "config.yaml";

/// Database file name used when `database` is not set.
pub const DEFAULT_DATABASE: &str = "habits.db";

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "HABITS_";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read or written.
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// The configuration could not be serialized to YAML.
    #[error("failed to write config file: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// A layer contained a value of the wrong shape.
    #[error("failed to load configuration: {0}")]
    Load(#[from] figment::Error),

    /// A configuration value was out of range.
    #[error("invalid configuration value for key '{key}': {reason}")]
    InvalidValue {
        /// The configuration key that had an invalid value.
        key: String,
        /// A description of why the value is invalid.
        reason: String,
    },
}

/// A specialized `Result` type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Streak computation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreakConfig {
    /// How far back the incremental updater looks for the previous due day.
    pub max_lookback_days: u32,
}

impl Default for StreakConfig {
    fn default() -> Self {
        Self {
            max_lookback_days: DEFAULT_MAX_LOOKBACK_DAYS,
        }
    }
}

/// Record service settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Retries of a unit of work that lost a version race.
    pub conflict_retries: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            conflict_retries: 3,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing` filter directive used when verbose output is on.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "hb=info,habits=info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// HabitsConfig
// ---------------------------------------------------------------------------

/// The full configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HabitsConfig {
    /// SQLite database path. Relative paths resolve against `.habits/`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    /// Default user id for the CLI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    pub streak: StreakConfig,

    pub service: ServiceConfig,

    pub log: LogConfig,
}

impl HabitsConfig {
    /// Resolves the database path against the `.habits/` directory.
    pub fn database_path(&self, habits_dir: &Path) -> PathBuf {
        match self.database.as_deref() {
            Some(db) if Path::new(db).is_absolute() => PathBuf::from(db),
            Some(db) => habits_dir.join(db),
            None => habits_dir.join(DEFAULT_DATABASE),
        }
    }

    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if !(1..=366).contains(&self.streak.max_lookback_days) {
            return Err(ConfigError::InvalidValue {
                key: "streak.max_lookback_days".into(),
                reason: format!(
                    "must be between 1 and 366 (got {})",
                    self.streak.max_lookback_days
                ),
            });
        }
        if self.log.filter.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "log.filter".into(),
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// Load configuration for the `.habits/` directory `habits_dir`.
///
/// A missing or empty `config.yaml` yields the defaults (plus environment
/// overrides).
///
/// # Errors
///
/// Returns [`ConfigError::ReadError`] if the file exists but cannot be read,
/// [`ConfigError::Load`] if a layer has a malformed value, and
/// [`ConfigError::InvalidValue`] if a value is out of range.
pub fn load_config(habits_dir: &Path) -> Result<HabitsConfig> {
    load_layers(habits_dir, Env::prefixed(ENV_PREFIX).split("__"))
}

fn load_layers(habits_dir: &Path, env: Env) -> Result<HabitsConfig> {
    let mut figment = Figment::from(Serialized::defaults(HabitsConfig::default()));

    let config_path = habits_dir.join(CONFIG_FILE);
    match std::fs::read_to_string(&config_path) {
        Ok(content) if !content.trim().is_empty() => {
            figment = figment.merge(Yaml::string(&content));
        }
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    let config: HabitsConfig = figment.merge(env).extract()?;
    config.validate()?;
    Ok(config)
}

/// Save configuration to `config.yaml` inside the given `.habits/` directory.
///
/// The directory is created if it does not exist.
pub fn save_config(habits_dir: &Path, config: &HabitsConfig) -> Result<()> {
    std::fs::create_dir_all(habits_dir)?;

    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(habits_dir.join(CONFIG_FILE), yaml)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// An env provider no test ever sets, so process variables cannot leak in.
    fn no_env() -> Env {
        Env::prefixed("HABITS_CONFIG_TEST_UNSET_").split("__")
    }

    #[test]
    fn test_default_config() {
        let cfg = HabitsConfig::default();
        assert!(cfg.database.is_none());
        assert!(cfg.user.is_none());
        assert_eq!(cfg.streak.max_lookback_days, DEFAULT_MAX_LOOKBACK_DAYS);
        assert_eq!(cfg.service.conflict_retries, 3);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_load_missing_config_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_layers(dir.path(), no_env()).unwrap();
        assert_eq!(cfg, HabitsConfig::default());
    }

    #[test]
    fn test_load_empty_config_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "  \n").unwrap();
        let cfg = load_layers(dir.path(), no_env()).unwrap();
        assert_eq!(cfg, HabitsConfig::default());
    }

    #[test]
    fn test_yaml_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "user: alice\nstreak:\n  max_lookback_days: 14\n",
        )
        .unwrap();

        let cfg = load_layers(dir.path(), no_env()).unwrap();
        assert_eq!(cfg.user.as_deref(), Some("alice"));
        assert_eq!(cfg.streak.max_lookback_days, 14);
        // Untouched sections keep their defaults.
        assert_eq!(cfg.service, ServiceConfig::default());
    }

    #[test]
    fn test_env_overrides_yaml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "service:\n  conflict_retries: 1\n").unwrap();

        // SAFETY: the variable name is unique to this test.
        unsafe {
            std::env::set_var("HABITS_CONFIG_TEST_ENV_SERVICE__CONFLICT_RETRIES", "7");
        }
        let env = Env::prefixed("HABITS_CONFIG_TEST_ENV_").split("__");
        let cfg = load_layers(dir.path(), env).unwrap();
        assert_eq!(cfg.service.conflict_retries, 7);
    }

    #[test]
    fn test_out_of_range_value_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "streak:\n  max_lookback_days: 0\n").unwrap();
        let err = load_layers(dir.path(), no_env()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }), "{err}");
    }

    #[test]
    fn test_malformed_value_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "streak:\n  max_lookback_days: lots\n").unwrap();
        let err = load_layers(dir.path(), no_env()).unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)), "{err}");
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let habits_dir = dir.path().join(".habits");
        let cfg = HabitsConfig {
            user: Some("bob".into()),
            database: Some("data/h.db".into()),
            ..Default::default()
        };
        save_config(&habits_dir, &cfg).unwrap();

        let loaded = load_layers(&habits_dir, no_env()).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn test_database_path_resolution() {
        let base = Path::new("/work/.habits");
        let mut cfg = HabitsConfig::default();
        assert_eq!(cfg.database_path(base), base.join("habits.db"));

        cfg.database = Some("other.db".into());
        assert_eq!(cfg.database_path(base), base.join("other.db"));

        cfg.database = Some("/var/lib/habits.db".into());
        assert_eq!(cfg.database_path(base), PathBuf::from("/var/lib/habits.db"));
    }
}
