//! Vector clock simulation CLI
//!
//! Outer driver for the simulation engine: single runs that write a merged
//! log, repeated VC/SK comparisons, and parameter-file generation.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{
    compare::{handle_compare, CompareArgs},
    gen_params::{handle_gen_params, GenParamsArgs},
    run::{handle_run, RunArgs},
};

#[derive(Parser)]
#[command(name = "vcsim")]
#[command(about = "Vector clock simulator comparing full and differential clock payloads", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Run settings file (TOML); flags given on the command line win
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one simulation from a parameter file and write the merged log
    Run(RunArgs),

    /// Compare VC and SK over a range of process counts
    Compare(CompareArgs),

    /// Write a parameter file for a generated topology
    GenParams(GenParamsArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Run(args) => handle_run(args, config).await?,
        Commands::Compare(args) => handle_compare(args, config).await?,
        Commands::GenParams(args) => handle_gen_params(args)?,
    }

    Ok(())
}
