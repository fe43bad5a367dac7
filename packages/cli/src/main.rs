#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line entry point for the crash map pipeline.
//!
//! Each subcommand runs one part of the pipeline against the inputs named
//! in `crash_map.toml`; `run` chains them all. With no subcommand, an
//! interactive menu picks one.
//!
//! Uses `indicatif-log-bridge` (via [`crash_map_cli_utils::init_logger`])
//! so log lines and progress bars never fight for the terminal.

mod config;
mod pipeline;
mod setup;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dialoguer::Select;

use crate::config::PipelineConfig;

#[derive(Parser)]
#[command(name = "crash_map_cli", about = "Crash aggregation onto street segments and roads")]
struct Cli {
    /// Config file (defaults to `$CRASH_MAP_CONFIG`, then `crash_map.toml`)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Create or update the config file interactively
    Setup,
    /// Geocode crashes and write crash location files
    Locate,
    /// Aggregate crashes onto street segments
    Segments,
    /// Build same-name roads and their statistics
    Roads,
    /// Load `roads.csv` into `DuckDB`
    Upload,
    /// Run every stage
    Run {
        /// Skip loading the road table into `DuckDB`
        #[arg(long)]
        no_upload: bool,
    },
}

impl Commands {
    const MENU: &[Self] = &[
        Self::Run { no_upload: false },
        Self::Setup,
        Self::Locate,
        Self::Segments,
        Self::Roads,
        Self::Upload,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Run { .. } => "Run full pipeline",
            Self::Setup => "Setup",
            Self::Locate => "Locate crashes",
            Self::Segments => "Segment statistics",
            Self::Roads => "Road statistics",
            Self::Upload => "Upload roads to DuckDB",
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = crash_map_cli_utils::init_logger();
    let cli = Cli::parse();
    let config_path = PipelineConfig::resolve_path(cli.config.as_deref());

    let command = match cli.command {
        Some(command) => command,
        None => {
            println!("Crash Map");
            println!();
            let labels: Vec<&str> = Commands::MENU.iter().map(Commands::label).collect();
            let idx = Select::new()
                .with_prompt("What would you like to do?")
                .items(&labels)
                .default(0)
                .interact()?;
            Commands::MENU[idx]
        }
    };

    let load = || PipelineConfig::load(&config_path);

    match command {
        Commands::Setup => {
            setup::run(&config_path)?;
        }
        Commands::Locate => report(&pipeline::run_locate(&load()?, &multi)?),
        Commands::Segments => report(&pipeline::run_segments(&load()?, &multi)?),
        Commands::Roads => report(&pipeline::run_roads(&load()?, &multi)?),
        Commands::Upload => {
            let config = load()?;
            let rows = pipeline::run_upload(&config)?;
            println!("Loaded {rows} roads into {}", config.duckdb_path.display());
        }
        Commands::Run { no_upload } => pipeline::run_all(&load()?, &multi, !no_upload)?,
    }

    Ok(())
}

fn report(paths: &[PathBuf]) {
    for path in paths {
        println!("  {}", path.display());
    }
}
