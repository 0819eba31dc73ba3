//! `hb habit` -- create, list, show and deactivate habits.

use anyhow::{Result, bail};

use habits_core::habit::Measure;
use habits_core::recurrence::Recurrence;
use habits_service::NewHabit;

use crate::cli::{HabitAddArgs, HabitArgs, HabitCommands, HabitIdArgs, HabitListArgs};
use crate::context::{RuntimeContext, Workspace};
use crate::output::{format_habit_detail, habit_row, output_json, output_table, render_pass};

/// Execute the `hb habit` command.
pub fn run(ctx: &RuntimeContext, args: &HabitArgs) -> Result<()> {
    let ws = ctx.open_workspace()?;
    match &args.command {
        HabitCommands::Add(args) => run_add(ctx, &ws, args),
        HabitCommands::List(args) => run_list(ctx, &ws, args),
        HabitCommands::Show(args) => run_show(ctx, &ws, args),
        HabitCommands::Deactivate(args) => run_deactivate(ctx, &ws, args),
    }
}

fn run_add(ctx: &RuntimeContext, ws: &Workspace, args: &HabitAddArgs) -> Result<()> {
    let recurrence = Recurrence::from_parts(&args.recurrence, &args.days)?;
    if args.recurrence.eq_ignore_ascii_case("monthly") && !args.days.is_empty() {
        bail!("--days does not apply to monthly habits");
    }
    let measure = if args.numeric {
        Measure::Numeric {
            target: args.target,
        }
    } else {
        Measure::Check
    };

    let mut new = NewHabit::new(ws.user.as_str(), args.title.as_str())
        .recurrence(recurrence)
        .measure(measure);
    if let Some(created) = &args.created {
        new = new.created_at(ws.parse_day(created)?);
    }

    let habit = ws.service.create_habit(new)?;

    if ctx.json {
        output_json(&habit);
    } else if !ctx.quiet {
        println!(
            "{} Created habit {}: {} ({})",
            render_pass("\u{2713}"),
            habit.id,
            habit.title,
            habit.recurrence.describe(habit.created_at)
        );
    }
    Ok(())
}

fn run_list(ctx: &RuntimeContext, ws: &Workspace, args: &HabitListArgs) -> Result<()> {
    let habits = ws.service.list_habits(&ws.user, args.all)?;

    if ctx.json {
        output_json(&habits);
        return Ok(());
    }
    if habits.is_empty() {
        if !ctx.quiet {
            println!("No habits found.");
        }
        return Ok(());
    }

    let rows: Vec<Vec<String>> = habits.iter().map(habit_row).collect();
    output_table(
        &["ID", "TITLE", "SCHEDULE", "STREAK", "LONGEST", "LAST DONE"],
        &rows,
    );
    Ok(())
}

fn run_show(ctx: &RuntimeContext, ws: &Workspace, args: &HabitIdArgs) -> Result<()> {
    let habit = ws.service.get_habit(&args.id, &ws.user)?;
    if ctx.json {
        output_json(&habit);
    } else {
        println!("{}", format_habit_detail(&habit));
    }
    Ok(())
}

fn run_deactivate(ctx: &RuntimeContext, ws: &Workspace, args: &HabitIdArgs) -> Result<()> {
    ws.service.deactivate_habit(&args.id, &ws.user)?;
    if ctx.json {
        output_json(&serde_json::json!({ "id": args.id, "active": false }));
    } else if !ctx.quiet {
        println!("{} Deactivated habit {}", render_pass("\u{2713}"), args.id);
    }
    Ok(())
}
