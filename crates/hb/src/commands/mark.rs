//! `hb mark` -- mark a habit for a day and update the streak.

use anyhow::Result;

use habits_core::day::format_day;
use habits_service::UpsertRecord;

use crate::cli::MarkArgs;
use crate::context::RuntimeContext;
use crate::output::{ICON_DONE, ICON_MISSED, output_json, render_muted, render_pass, render_warn};

/// Execute the `hb mark` command.
pub fn run(ctx: &RuntimeContext, args: &MarkArgs) -> Result<()> {
    let ws = ctx.open_workspace()?;
    let date = ws.parse_day_or_today(args.date.as_deref())?;

    let mut req = UpsertRecord::new(args.habit.as_str(), ws.user.as_str(), date).completed(!args.undo);
    if let Some(value) = args.value {
        req = req.value(value);
    }
    if let Some(notes) = &args.notes {
        req = req.notes(notes.as_str());
    }

    let outcome = ws.service.upsert_record(&req)?;

    if ctx.json {
        output_json(&outcome);
        return Ok(());
    }
    if ctx.quiet {
        return Ok(());
    }

    let icon = if outcome.record.completed {
        render_pass(ICON_DONE)
    } else {
        render_muted(ICON_MISSED)
    };
    println!(
        "{icon} {} {}: streak {} (longest {})",
        args.habit,
        format_day(date),
        outcome.current_streak,
        outcome.longest_streak
    );
    if outcome.target_met == Some(false) {
        println!("  {}", render_warn("below target"));
    }
    Ok(())
}
