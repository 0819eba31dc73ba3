//! `hb record` and `hb records` -- read the completion ledger.

use anyhow::Result;

use habits_core::day::format_day;

use crate::cli::{RecordArgs, RecordsArgs};
use crate::context::RuntimeContext;
use crate::output::{RECORD_HEADERS, output_json, output_table, record_row, render_muted};

/// Execute the `hb record` command.
pub fn run_one(ctx: &RuntimeContext, args: &RecordArgs) -> Result<()> {
    let ws = ctx.open_workspace()?;
    let date = ws.parse_day(&args.date)?;
    let record = ws.service.get_record_by_date(&args.habit, &ws.user, date)?;

    if ctx.json {
        // `null` when the day has no record.
        output_json(&record);
        return Ok(());
    }
    match record {
        Some(record) => output_table(&RECORD_HEADERS, &[record_row(&record)]),
        None => println!(
            "{}",
            render_muted(&format!("No record for {} on {}", args.habit, format_day(date)))
        ),
    }
    Ok(())
}

/// Execute the `hb records` command.
pub fn run_range(ctx: &RuntimeContext, args: &RecordsArgs) -> Result<()> {
    let ws = ctx.open_workspace()?;
    let from = ws.parse_day(&args.from)?;
    let to = ws.parse_day_or_today(args.to.as_deref())?;
    let records = ws
        .service
        .get_records_by_date_range(&args.habit, &ws.user, from, to)?;

    if ctx.json {
        output_json(&records);
        return Ok(());
    }
    if records.is_empty() {
        if !ctx.quiet {
            println!("No records between {} and {}.", format_day(from), format_day(to));
        }
        return Ok(());
    }
    let rows: Vec<Vec<String>> = records.iter().map(record_row).collect();
    output_table(&RECORD_HEADERS, &rows);
    Ok(())
}
