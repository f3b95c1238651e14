//! Configuration inspection commands.
//!
//! Provides `config path` and `config show`.

use std::path::PathBuf;

use clap::Subcommand;
use geobridge::app::GeofenceConfig;

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the default configuration file path
    Path,

    /// Show the effective configuration and the regions it declares
    Show {
        /// Configuration file (defaults to the user config)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Path => run_path(),
        ConfigCommands::Show { config } => run_show(config),
    }
}

fn run_path() -> Result<(), CliError> {
    let path = GeofenceConfig::default_path().ok_or_else(|| {
        CliError::Config("No configuration directory on this platform".to_string())
    })?;
    println!("{}", path.display());
    Ok(())
}

fn run_show(path: Option<PathBuf>) -> Result<(), CliError> {
    let path = path.or_else(|| GeofenceConfig::default_path().filter(|p| p.exists()));

    let (config, regions) = match &path {
        Some(path) => (
            GeofenceConfig::load(path)?,
            GeofenceConfig::load_regions(path)?,
        ),
        None => (GeofenceConfig::default(), Vec::new()),
    };

    match &path {
        Some(path) => println!("# {}", path.display()),
        None => println!("# defaults (no configuration file)"),
    }
    print!("{}", config.to_ini_string());

    if !regions.is_empty() {
        println!();
        println!("# {} region(s)", regions.len());
        for region in &regions {
            println!(
                "#   {} ({}, {}) radius {} m",
                region.identifier, region.latitude, region.longitude, region.radius
            );
        }
    }

    Ok(())
}
