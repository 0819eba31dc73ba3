//! Core types and algorithms for the habits system.
//!
//! Everything in this crate is pure: scheduling, streak bookkeeping and input
//! validation operate on values handed to them and never touch storage.

pub mod day;
pub mod habit;
pub mod idgen;
pub mod record;
pub mod recurrence;
pub mod streak;
pub mod validation;
