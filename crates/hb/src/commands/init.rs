//! `hb init` -- initialize a habits database in the current directory.

use std::env;

use anyhow::{Context, Result, bail};

use habits_config::config::CONFIG_FILE;
use habits_config::{HabitsConfig, ensure_habits_dir, load_config, save_config};
use habits_storage::{SqliteStore, Storage};

use crate::cli::InitArgs;
use crate::context::RuntimeContext;
use crate::output::{output_json, render_pass};

/// Execute the `hb init` command.
pub fn run(ctx: &RuntimeContext, args: &InitArgs) -> Result<()> {
    let cwd = env::current_dir().context("failed to get current directory")?;
    let habits_dir = cwd.join(".habits");
    let config_exists = habits_dir.join(CONFIG_FILE).exists();

    let mut config = if config_exists {
        load_config(&habits_dir)
            .with_context(|| format!("failed to load config from {}", habits_dir.display()))?
    } else {
        HabitsConfig::default()
    };

    // An explicit --db is stored absolute so later runs from subdirectories agree.
    let explicit_db = ctx.db_path.as_ref().map(|p| cwd.join(p));
    let db_path = explicit_db
        .clone()
        .unwrap_or_else(|| config.database_path(&habits_dir));
    if !args.force && db_path.exists() {
        bail!(
            "Found existing database at {}\n\n\
            This directory is already initialized.\n\
            Use --force to rewrite the configuration (records are kept).",
            db_path.display()
        );
    }

    let habits_dir = ensure_habits_dir(&cwd)
        .with_context(|| format!("failed to create directory: {}", habits_dir.display()))?;

    if let Some(user) = &ctx.user {
        config.user = Some(user.clone());
    }
    if let Some(db) = &explicit_db {
        config.database = Some(db.to_string_lossy().into_owned());
    }
    save_config(&habits_dir, &config).context("failed to write config.yaml")?;

    let store = SqliteStore::open(&db_path)
        .with_context(|| format!("failed to create database: {}", db_path.display()))?;
    store.close().context("failed to close database")?;

    if ctx.json {
        output_json(&serde_json::json!({
            "habits_dir": habits_dir.display().to_string(),
            "database": db_path.display().to_string(),
            "user": config.user,
        }));
    } else if !ctx.quiet {
        println!("{} hb initialized", render_pass("\u{2713}"));
        println!();
        println!("  Database: {}", db_path.display());
        match &config.user {
            Some(user) => println!("  User:     {user}"),
            None => println!("  User:     (unset, pass --user or set HB_USER)"),
        }
        println!();
        println!("Run `hb habit add \"Drink water\"` to get started.");
    }

    Ok(())
}
