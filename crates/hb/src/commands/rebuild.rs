//! `hb rebuild` -- recompute a streak from the whole ledger.

use anyhow::Result;

use habits_core::day::format_day;

use crate::cli::RebuildArgs;
use crate::context::RuntimeContext;
use crate::output::{output_json, render_pass};

/// Execute the `hb rebuild` command.
pub fn run(ctx: &RuntimeContext, args: &RebuildArgs) -> Result<()> {
    let ws = ctx.open_workspace()?;
    let state = ws.service.rebuild_streaks(&args.habit, &ws.user)?;

    if ctx.json {
        output_json(&state);
    } else if !ctx.quiet {
        let last = state
            .last_completed_date
            .map(format_day)
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{} Rebuilt {}: streak {} (longest {}), last done {last}",
            render_pass("\u{2713}"),
            args.habit,
            state.current_streak,
            state.longest_streak
        );
    }
    Ok(())
}
