//! Configuration management for the habits system.
//!
//! This crate handles loading and saving `.habits/config.yaml`, layering
//! `HABITS_*` environment overrides on top, and discovering the `.habits/`
//! directory in the filesystem.

pub mod config;
pub mod habits_dir;

pub use config::{ConfigError, HabitsConfig, load_config, save_config};
pub use habits_dir::{ensure_habits_dir, find_habits_dir};
