use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};

pub const DEFAULT_CONFIG_PATH: &str = "schedule.toml";
pub const DEFAULT_STATE_PATH: &str = "schedule.state.json";

/// Keep a declared PagerDuty on-call schedule in sync with the service.
#[derive(Parser, Debug, Clone)]
#[command(name = "schedsync", version, about, long_about = None)]
pub struct Cli {
    /// Declared schedule (TOML).
    #[arg(
        long,
        global = true,
        default_value = DEFAULT_CONFIG_PATH,
        value_hint = ValueHint::FilePath
    )]
    pub config: String,

    /// Applied state written after every successful apply or import.
    #[arg(
        long,
        global = true,
        default_value = DEFAULT_STATE_PATH,
        value_hint = ValueHint::FilePath
    )]
    pub state: String,

    /// Log to stderr only, without the JSON log file.
    #[arg(long = "no-log-file", global = true, action = ArgAction::SetTrue)]
    pub no_log_file: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Supported subcommands.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Check the declared schedule without contacting the service.
    Validate,
    /// Show what apply would change.
    Plan,
    /// Create or update the remote schedule.
    Apply,
    /// Refresh and print the applied schedule.
    Show,
    /// Adopt an existing remote schedule.
    Import(ImportArgs),
    /// Delete the remote schedule, detaching escalation policies first.
    #[command(alias = "delete")]
    Destroy,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct ImportArgs {
    /// Remote schedule id, e.g. PABC123.
    #[arg(value_name = "ID")]
    pub id: String,
}
