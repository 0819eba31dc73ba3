//! `hb history` -- page through a habit's records, newest first.

use anyhow::Result;

use crate::cli::HistoryArgs;
use crate::context::RuntimeContext;
use crate::output::{RECORD_HEADERS, output_json, output_table, record_row, render_muted};

/// Execute the `hb history` command.
pub fn run(ctx: &RuntimeContext, args: &HistoryArgs) -> Result<()> {
    let ws = ctx.open_workspace()?;
    let from = args.from.as_deref().map(|s| ws.parse_day(s)).transpose()?;
    let to = args.to.as_deref().map(|s| ws.parse_day(s)).transpose()?;

    let page = ws.service.get_historical_records(
        &args.habit,
        &ws.user,
        from,
        to,
        args.limit,
        args.offset,
    )?;

    if ctx.json {
        output_json(&page);
        return Ok(());
    }

    let p = &page.pagination;
    if page.records.is_empty() {
        if !ctx.quiet {
            println!("No records ({} in total).", p.total);
        }
        return Ok(());
    }

    let rows: Vec<Vec<String>> = page.records.iter().map(record_row).collect();
    output_table(&RECORD_HEADERS, &rows);
    if !ctx.quiet {
        let first = p.offset + 1;
        let last = p.offset + page.records.len() as u64;
        let mut footer = format!("Showing {first}-{last} of {}", p.total);
        if p.has_more {
            footer.push_str(&format!(" (next: --offset {last})"));
        }
        println!("{}", render_muted(&footer));
    }
    Ok(())
}
