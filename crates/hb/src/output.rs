//! Output formatting helpers for the `hb` CLI.
//!
//! JSON goes through [`output_json`]; human output uses a few colored
//! helpers that fall back to plain text when stdout is not a color terminal.

use std::env;
use std::io::{self, Write};

use owo_colors::OwoColorize;
use serde::Serialize;

use habits_core::day::format_day;
use habits_core::habit::Habit;
use habits_core::record::CompletionRecord;

// Ayu Dark palette
const PASS: (u8, u8, u8) = (0xc2, 0xd9, 0x4c);
const WARN: (u8, u8, u8) = (0xff, 0xb4, 0x54);
const MUTED: (u8, u8, u8) = (0x6c, 0x76, 0x80);
const ACCENT: (u8, u8, u8) = (0x59, 0xc2, 0xff);

pub const ICON_DONE: &str = "\u{2713}";
pub const ICON_MISSED: &str = "\u{2716}";

/// Print a value as pretty JSON on stdout.
///
/// A closed pipe (e.g. `hb habit list --json | head`) is not an error.
pub fn output_json<T: Serialize>(value: &T) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    match serde_json::to_string_pretty(value) {
        Ok(s) => {
            if let Err(e) = writeln!(handle, "{s}") {
                if e.kind() != io::ErrorKind::BrokenPipe {
                    eprintln!("Error writing output: {e}");
                    std::process::exit(1);
                }
            }
        }
        Err(e) => {
            eprintln!("Error serializing output: {e}");
            std::process::exit(1);
        }
    }
}

// ---------------------------------------------------------------------------
// Color
// ---------------------------------------------------------------------------

/// Honors `NO_COLOR`, `CLICOLOR=0`, `TERM=dumb` and `CLICOLOR_FORCE`, then
/// falls back to TTY detection.
fn supports_color() -> bool {
    if env::var_os("NO_COLOR").is_some()
        || env::var("CLICOLOR").as_deref() == Ok("0")
        || env::var("TERM").as_deref() == Ok("dumb")
    {
        return false;
    }
    if env::var_os("CLICOLOR_FORCE").is_some() {
        return true;
    }
    crossterm::tty::IsTty::is_tty(&io::stdout())
}

fn paint(s: &str, rgb: (u8, u8, u8)) -> String {
    if supports_color() {
        s.truecolor(rgb.0, rgb.1, rgb.2).to_string()
    } else {
        s.to_string()
    }
}

pub fn render_pass(s: &str) -> String {
    paint(s, PASS)
}

pub fn render_warn(s: &str) -> String {
    paint(s, WARN)
}

pub fn render_muted(s: &str) -> String {
    paint(s, MUTED)
}

pub fn render_accent(s: &str) -> String {
    paint(s, ACCENT)
}

pub fn render_bold(s: &str) -> String {
    if supports_color() {
        s.bold().to_string()
    } else {
        s.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// Print rows under a header, columns padded to the widest cell.
pub fn output_table(headers: &[&str], rows: &[Vec<String>]) {
    if rows.is_empty() {
        return;
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let header: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    let _ = writeln!(handle, "{}", render_bold(&pad_row(&header, &widths)));
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(handle, "{}", pad_row(&rule, &widths));
    for row in rows {
        let _ = writeln!(handle, "{}", pad_row(row, &widths));
    }
}

fn pad_row(cells: &[String], widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .iter()
        .enumerate()
        .map(|(i, cell)| match widths.get(i) {
            Some(width) => format!("{cell:<width$}"),
            None => cell.clone(),
        })
        .collect();
    padded.join("  ").trim_end().to_string()
}

// ---------------------------------------------------------------------------
// Habits and records
// ---------------------------------------------------------------------------

/// `Check` or `Numeric (target 20)`.
pub fn describe_measure(habit: &Habit) -> String {
    match habit.measure.target() {
        Some(target) => format!("{} (target {target})", habit.measure.as_str()),
        None => habit.measure.as_str().to_string(),
    }
}

/// A table row for `hb habit list`.
pub fn habit_row(habit: &Habit) -> Vec<String> {
    let mut title = habit.title.clone();
    if !habit.active {
        title.push_str(" (inactive)");
    }
    vec![
        habit.id.clone(),
        title,
        habit.recurrence.describe(habit.created_at),
        habit.current_streak.to_string(),
        habit.longest_streak.to_string(),
        habit
            .last_completed_date
            .map(format_day)
            .unwrap_or_else(|| "-".to_string()),
    ]
}

/// Multi-line detail view for `hb habit show`.
pub fn format_habit_detail(habit: &Habit) -> String {
    let mut out = format!(
        "{} {}\n",
        render_accent(&habit.id),
        render_bold(&habit.title)
    );
    if !habit.active {
        out.push_str(&format!("  {}\n", render_warn("inactive")));
    }
    out.push_str(&format!(
        "  Schedule: {} ({})\n",
        habit.recurrence.describe(habit.created_at),
        habit.recurrence.kind()
    ));
    out.push_str(&format!("  Measure:  {}\n", describe_measure(habit)));
    out.push_str(&format!("  Created:  {}\n", format_day(habit.created_at)));
    out.push_str(&format!(
        "  Streak:   {} current, {} longest\n",
        habit.current_streak, habit.longest_streak
    ));
    let last = habit
        .last_completed_date
        .map(format_day)
        .unwrap_or_else(|| render_muted("never"));
    out.push_str(&format!("  Last done: {last}"));
    out
}

/// A table row for record listings.
pub fn record_row(record: &CompletionRecord) -> Vec<String> {
    let status = if record.completed {
        render_pass(ICON_DONE)
    } else {
        render_muted(ICON_MISSED)
    };
    vec![
        format_day(record.date),
        status,
        record.value.map(|v| v.to_string()).unwrap_or_default(),
        record.notes.clone().unwrap_or_default(),
    ]
}

pub const RECORD_HEADERS: [&str; 4] = ["DATE", "DONE", "VALUE", "NOTES"];
