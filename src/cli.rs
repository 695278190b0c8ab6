use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version = env!("APP_VERSION"), about, propagate_version = true)]
pub struct Args {
    /// Configuration file; the default locations are searched when absent.
    #[clap(long, short, global = true, env = "STEPCHARGE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Load and validate the configuration, then list the enabled charging paths.
    #[clap(name = "check")]
    Check,

    /// Feed a recorded telemetry trace through the step-charging engine.
    #[clap(name = "replay")]
    Replay(ReplayArgs),
}

#[derive(Parser)]
pub struct ReplayArgs {
    /// JSON-lines trace, one sample per line.
    #[clap(long, short)]
    pub trace: PathBuf,

    /// Print the report as JSON instead of a table.
    #[clap(long)]
    pub json: bool,
}
