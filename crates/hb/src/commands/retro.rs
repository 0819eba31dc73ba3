//! `hb retro` -- edit a past day and recompute the streak from there.

use anyhow::Result;

use habits_core::day::format_day;
use habits_service::UpsertRecord;

use crate::cli::RetroArgs;
use crate::context::RuntimeContext;
use crate::output::{output_json, render_pass};

/// Execute the `hb retro` command.
pub fn run(ctx: &RuntimeContext, args: &RetroArgs) -> Result<()> {
    let ws = ctx.open_workspace()?;
    let date = ws.parse_day(&args.date)?;

    let mut req = UpsertRecord::new(args.habit.as_str(), ws.user.as_str(), date).completed(!args.undo);
    if let Some(value) = args.value {
        req = req.value(value);
    }
    if let Some(notes) = &args.notes {
        req = req.notes(notes.as_str());
    }

    let outcome = ws.service.mark_retroactively(&req)?;

    if ctx.json {
        output_json(&outcome);
    } else if !ctx.quiet {
        let state = if args.undo { "not done" } else { "done" };
        println!(
            "{} {} {} set to {state}: streak {} (longest {})",
            render_pass("\u{2713}"),
            args.habit,
            format_day(date),
            outcome.current_streak,
            outcome.longest_streak
        );
    }
    Ok(())
}
