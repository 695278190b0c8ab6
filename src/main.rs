mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use stepcharge::Config;
use stepcharge::controls::ChargingControls;
use stepcharge::logging::init_logging;
use stepcharge::policy::ChargingPath;
use stepcharge::replay::{load_trace, replay};
use stepcharge::vote::VoteArbiter;
use tracing::info;

use crate::cli::{Args, Command};

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => Config::load().context("failed to load configuration")?,
    };
    init_logging(&config.logging).context("failed to initialize logging")?;
    info!(version = env!("APP_VERSION"), "stepcharge starting");

    match args.command {
        Command::Check => {
            config.validate()?;
            let controls = ChargingControls::new(&config, Arc::new(VoteArbiter::new()))?;
            for path in ChargingPath::ALL {
                let state = if controls.is_enabled(path) {
                    "enabled"
                } else {
                    "disabled"
                };
                println!("{path}: {state}");
            }
            println!("age steps: {}", config.aging.num_age_steps());
        }
        Command::Replay(replay_args) => {
            let samples = load_trace(&replay_args.trace)
                .with_context(|| format!("failed to read {}", replay_args.trace.display()))?;
            let report = replay(&config, &samples)?;
            if replay_args.json {
                println!("{}", report.to_json()?);
            } else {
                println!("{}", report.build_table());
                info!(
                    samples = report.records.len(),
                    changes = report.changes(),
                    "replay finished"
                );
            }
        }
    }
    Ok(())
}
