//! Clap CLI definitions for the `hb` command.

use clap::{Args, Parser, Subcommand};

/// hb -- habit tracker with streaks.
#[derive(Parser, Debug)]
#[command(
    name = "hb",
    about = "Habit tracker with streaks",
    long_about = "Track recurring habits day by day. Streaks count consecutive due days that were completed.",
    version,
    propagate_version = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Global flags available to all subcommands.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Database path (default: auto-discover .habits/habits.db).
    #[arg(long, global = true)]
    pub db: Option<String>,

    /// User whose habits are read and written (default: $HB_USER, then config).
    #[arg(long, global = true, env = "HB_USER")]
    pub user: Option<String>,

    /// Output in JSON format.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose/debug output.
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output (errors only).
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,
}

/// All available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a .habits directory in the current directory.
    Init(InitArgs),

    /// Manage habits.
    Habit(HabitArgs),

    /// Mark a habit done (or not done) for a day.
    #[command(alias = "done")]
    Mark(MarkArgs),

    /// Edit a past day and recompute the streak from that day on.
    Retro(RetroArgs),

    /// Show the record of one day.
    Record(RecordArgs),

    /// List the records between two days, oldest first.
    Records(RecordsArgs),

    /// Page through the records of a habit, newest first.
    History(HistoryArgs),

    /// Recompute a habit's streak from its whole history.
    Rebuild(RebuildArgs),
}

// ---------------------------------------------------------------------------
// init
// ---------------------------------------------------------------------------

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Rewrite the configuration even if a database already exists.
    #[arg(long)]
    pub force: bool,
}

// ---------------------------------------------------------------------------
// habit
// ---------------------------------------------------------------------------

#[derive(Args, Debug)]
pub struct HabitArgs {
    #[command(subcommand)]
    pub command: HabitCommands,
}

/// Habit subcommands.
#[derive(Subcommand, Debug)]
pub enum HabitCommands {
    /// Create a habit.
    #[command(alias = "new")]
    Add(HabitAddArgs),
    /// List habits.
    List(HabitListArgs),
    /// Show a habit and its streak.
    Show(HabitIdArgs),
    /// Deactivate a habit. Its records are kept.
    Deactivate(HabitIdArgs),
}

#[derive(Args, Debug)]
pub struct HabitAddArgs {
    /// Habit title.
    pub title: String,

    /// Recurrence: daily, weekly, monthly or custom.
    #[arg(long, short = 'r', default_value = "daily")]
    pub recurrence: String,

    /// Weekdays the habit is due on, 0 = Sunday (e.g. 1,3,5).
    #[arg(long, value_delimiter = ',')]
    pub days: Vec<u8>,

    /// Record a number per day instead of a checkmark.
    #[arg(long)]
    pub numeric: bool,

    /// Daily target for numeric habits.
    #[arg(long, requires = "numeric")]
    pub target: Option<f64>,

    /// First day of the habit (YYYY-MM-DD, today, yesterday). Default: today.
    #[arg(long)]
    pub created: Option<String>,
}

#[derive(Args, Debug)]
pub struct HabitListArgs {
    /// Include deactivated habits.
    #[arg(long, short = 'a')]
    pub all: bool,
}

#[derive(Args, Debug)]
pub struct HabitIdArgs {
    /// Habit ID.
    pub id: String,
}

// ---------------------------------------------------------------------------
// records
// ---------------------------------------------------------------------------

#[derive(Args, Debug)]
pub struct MarkArgs {
    /// Habit ID.
    pub habit: String,

    /// Day to mark (YYYY-MM-DD, today, yesterday). Default: today.
    pub date: Option<String>,

    /// Mark the day as not done.
    #[arg(long)]
    pub undo: bool,

    /// Value for numeric habits.
    #[arg(long)]
    pub value: Option<f64>,

    /// Free-form note.
    #[arg(long, short = 'n')]
    pub notes: Option<String>,
}

#[derive(Args, Debug)]
pub struct RetroArgs {
    /// Habit ID.
    pub habit: String,

    /// Day to edit (YYYY-MM-DD, today, yesterday).
    pub date: String,

    /// Mark the day as not done.
    #[arg(long)]
    pub undo: bool,

    /// Value for numeric habits.
    #[arg(long)]
    pub value: Option<f64>,

    /// Free-form note.
    #[arg(long, short = 'n')]
    pub notes: Option<String>,
}

#[derive(Args, Debug)]
pub struct RecordArgs {
    /// Habit ID.
    pub habit: String,

    /// Day to look up (YYYY-MM-DD, today, yesterday).
    pub date: String,
}

#[derive(Args, Debug)]
pub struct RecordsArgs {
    /// Habit ID.
    pub habit: String,

    /// First day, inclusive.
    #[arg(long)]
    pub from: String,

    /// Last day, inclusive. Default: today.
    #[arg(long)]
    pub to: Option<String>,
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Habit ID.
    pub habit: String,

    /// Only records on or after this day.
    #[arg(long)]
    pub from: Option<String>,

    /// Only records on or before this day.
    #[arg(long)]
    pub to: Option<String>,

    /// Page size (1-100, default 30).
    #[arg(long, short = 'n')]
    pub limit: Option<u32>,

    /// Records to skip.
    #[arg(long, default_value_t = 0)]
    pub offset: u64,
}

#[derive(Args, Debug)]
pub struct RebuildArgs {
    /// Habit ID.
    pub habit: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_mark_with_flags() {
        let cli = Cli::try_parse_from([
            "hb", "--user", "alice", "mark", "hb-abc123", "2024-01-02", "--value", "3.5",
        ])
        .unwrap();
        assert_eq!(cli.global.user.as_deref(), Some("alice"));
        match cli.command {
            Some(Commands::Mark(args)) => {
                assert_eq!(args.habit, "hb-abc123");
                assert_eq!(args.date.as_deref(), Some("2024-01-02"));
                assert_eq!(args.value, Some(3.5));
                assert!(!args.undo);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_weekday_list() {
        let cli = Cli::try_parse_from([
            "hb", "habit", "add", "Gym", "--recurrence", "weekly", "--days", "1,3,5",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Habit(HabitArgs {
                command: HabitCommands::Add(args),
            })) => {
                assert_eq!(args.recurrence, "weekly");
                assert_eq!(args.days, vec![1, 3, 5]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn target_requires_numeric() {
        let result = Cli::try_parse_from(["hb", "habit", "add", "Read", "--target", "20"]);
        assert!(result.is_err());
    }
}
