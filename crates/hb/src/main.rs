//! `hb` -- habit tracker CLI.
//!
//! Parses CLI arguments with clap, resolves the runtime context, and
//! dispatches to command handlers.

mod cli;
mod commands;
mod context;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use context::RuntimeContext;

fn main() {
    let cli = Cli::parse();

    let ctx = RuntimeContext::from_global_args(&cli.global);

    // `RUST_LOG` wins over the configured filter.
    if ctx.verbose {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let configured = ctx.load_config().unwrap_or_default().log.filter;
            EnvFilter::try_new(&configured).unwrap_or_else(|_| EnvFilter::new("hb=debug"))
        });
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let result = match cli.command {
        Some(Commands::Init(args)) => commands::init::run(&ctx, &args),
        Some(Commands::Habit(args)) => commands::habit::run(&ctx, &args),
        Some(Commands::Mark(args)) => commands::mark::run(&ctx, &args),
        Some(Commands::Retro(args)) => commands::retro::run(&ctx, &args),
        Some(Commands::Record(args)) => commands::record::run_one(&ctx, &args),
        Some(Commands::Records(args)) => commands::record::run_range(&ctx, &args),
        Some(Commands::History(args)) => commands::history::run(&ctx, &args),
        Some(Commands::Rebuild(args)) => commands::rebuild::run(&ctx, &args),
        None => {
            use clap::CommandFactory;
            Cli::command().print_help().ok();
            println!();
            Ok(())
        }
    };

    if let Err(e) = result {
        if cli.global.json {
            let err_json = serde_json::json!({
                "error": format!("{:#}", e),
            });
            if let Ok(s) = serde_json::to_string_pretty(&err_json) {
                eprintln!("{}", s);
            }
        } else {
            eprintln!("Error: {:#}", e);
        }
        std::process::exit(1);
    }
}
