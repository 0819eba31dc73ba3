//! Discovery and management of the `.habits/` directory.

use std::path::{Path, PathBuf};

use crate::config::ConfigError;

/// The name of the habits metadata directory.
pub const HABITS_DIR_NAME: &str = ".habits";

/// Environment variable that overrides the directory search.
const HABITS_DIR_ENV: &str = "HABITS_DIR";

/// Walk up the directory tree from `start` looking for a `.habits/` directory.
///
/// The `HABITS_DIR` environment variable takes priority when it names an
/// existing directory.
pub fn find_habits_dir(start: &Path) -> Option<PathBuf> {
    if let Ok(env_dir) = std::env::var(HABITS_DIR_ENV) {
        let env_path = PathBuf::from(env_dir);
        if env_path.is_dir() {
            return Some(env_path);
        }
    }

    let start = start.canonicalize().ok()?;
    start
        .ancestors()
        .map(|dir| dir.join(HABITS_DIR_NAME))
        .find(|candidate| candidate.is_dir())
}

/// Ensure a `.habits/` directory exists at the given path.
///
/// If `path` itself is not called `.habits`, a `.habits/` subdirectory is
/// created under it. Returns the path to the `.habits/` directory.
pub fn ensure_habits_dir(path: &Path) -> Result<PathBuf, ConfigError> {
    let habits_dir = if path.ends_with(HABITS_DIR_NAME) {
        path.to_path_buf()
    } else {
        path.join(HABITS_DIR_NAME)
    };

    std::fs::create_dir_all(&habits_dir)?;
    Ok(habits_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_habits_dir_in_child() {
        let dir = tempfile::tempdir().unwrap();
        let habits = dir.path().join(HABITS_DIR_NAME);
        std::fs::create_dir(&habits).unwrap();

        let child = dir.path().join("src").join("deep");
        std::fs::create_dir_all(&child).unwrap();

        let found = find_habits_dir(&child).unwrap().canonicalize().unwrap();
        assert_eq!(found, habits.canonicalize().unwrap());
    }

    #[test]
    fn test_ensure_habits_dir_creates_once() {
        let dir = tempfile::tempdir().unwrap();
        let first = ensure_habits_dir(dir.path()).unwrap();
        assert!(first.is_dir());
        assert!(first.ends_with(HABITS_DIR_NAME));

        let again = ensure_habits_dir(&first).unwrap();
        assert_eq!(again, first);
    }
}
