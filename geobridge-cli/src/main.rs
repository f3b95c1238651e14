//! Geobridge CLI - replay geofence deliveries against the bridge
//!
//! Drives the library's dispatcher with the simulated provider and the
//! in-process event bus, printing what the embedding runtime would receive.

mod commands;
mod error;
mod trace;

use std::process;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::simulate::SimulateArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "geobridge", version, about = "Bridge OS geofence transitions into an event bus")]
struct Cli {
    /// Log at debug level (RUST_LOG still takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Replay a JSON-lines delivery trace and print the emitted events
    Simulate(SimulateArgs),

    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Simulate(args) => commands::simulate::run(args, cli.verbose),
        Commands::Config(command) => commands::config::run(command),
    }
}
