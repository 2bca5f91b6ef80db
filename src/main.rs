mod agent;
mod config;
mod engine;
mod grid;
mod kitchen;
mod manager;
mod pathfinder;
mod recipe;
mod stats;

use crate::agent::Strategy;
use crate::manager::Manager;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    #[arg(long)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Play one session with the configured agents.
    Run,

    /// Compare order-selection strategies over several sessions.
    Bench {
        #[arg(long, default_value_t = 10)]
        sessions: usize,

        #[arg(
            long,
            value_enum,
            value_delimiter = ',',
            default_values = ["naive", "simple", "complex"]
        )]
        strategies: Vec<Strategy>,
    },
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let mgr = Manager::new(&args.config).context("failed to construct mgr")?;

    match args.command {
        Command::Run => {
            mgr.run_session().context("failed to run session")?;
        }
        Command::Bench {
            sessions,
            strategies,
        } => {
            mgr.run_benchmark(sessions, &strategies)
                .context("failed to run benchmark")?;
        }
    }

    Ok(())
}
