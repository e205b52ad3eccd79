//! Binary entry point for launchgap.
//!
//! Every command prints JSON on stdout; logs go to stderr.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// CLI output goes to stdout/stderr directly
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use launchgap::config::LaunchgapConfig;
use launchgap::storage::open_store;
use launchgap::{Engine, Error, PredictionRequest, Result, observability};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Launchgap - HDB price prediction and launch-gap recommendations.
#[derive(Parser)]
#[command(name = "launchgap")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging for launchgap.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "LAUNCHGAP_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// `SQLite` database, overriding `data.db_path`.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Predict resale and BTO prices for a flat.
    Predict {
        /// Town name, e.g. "WOODLANDS".
        #[arg(long)]
        town: String,

        /// Flat type, e.g. "4 ROOM".
        #[arg(long)]
        flat_type: String,

        /// Floor area in square metres.
        #[arg(long)]
        floor_area: f64,

        /// Storey number.
        #[arg(long)]
        storey: u32,

        /// Lease commencement year.
        #[arg(long)]
        lease_commence_year: i32,
    },

    /// Profile a town's resale market.
    Analyze {
        /// Town name.
        town: String,
    },

    /// Rank towns for the next launch.
    Recommend {
        /// Number of towns to return.
        #[arg(short = 'n', long)]
        top_n: Option<usize>,
    },

    /// List towns present in the store.
    Towns,

    /// List flat types present in the store.
    FlatTypes,

    /// Show model and data health.
    Health,

    /// Import a resale CSV export into the `SQLite` store.
    Import {
        /// CSV file to import.
        path: PathBuf,
    },
}

/// Main entry point.
#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };
    if let Some(db) = cli.db.clone() {
        config.data.db_path = Some(db);
    }

    let _observability = match observability::init(&config.logging, &config.metrics, cli.verbose)
    {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to initialize observability: {e}");
            return ExitCode::FAILURE;
        },
    };

    match run_command(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            if e.is_client_error() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        },
    }
}

/// Runs the selected command.
async fn run_command(command: Commands, config: LaunchgapConfig) -> Result<()> {
    if let Commands::Import { path } = command {
        return cmd_import(path, config).await;
    }

    // Engine setup does blocking I/O and may build blocking HTTP clients.
    let engine = tokio::task::spawn_blocking(move || Engine::from_config(&config))
        .await
        .map_err(|e| Error::operation("engine_init", e))??;

    let outcome = match command {
        Commands::Predict {
            town,
            flat_type,
            floor_area,
            storey,
            lease_commence_year,
        } => {
            let request = PredictionRequest {
                town,
                flat_type,
                floor_area_sqm: floor_area,
                storey,
                lease_commence_year,
            };
            print_json(&engine.predict(request).await?)
        },
        Commands::Analyze { town } => print_json(&engine.analyze(&town).await?),
        Commands::Recommend { top_n } => {
            let top_n = top_n.unwrap_or_else(|| engine.default_top_n());
            print_json(&engine.recommend(top_n).await?)
        },
        Commands::Towns => print_json(&engine.list_towns().await?),
        Commands::FlatTypes => print_json(&engine.list_flat_types().await?),
        Commands::Health => print_json(&engine.health().await),
        Commands::Import { .. } => Ok(()),
    };

    // Blocking HTTP clients must not be dropped on an async worker.
    let _ = tokio::task::spawn_blocking(move || drop(engine)).await;
    outcome
}

/// Imports a CSV file into the configured `SQLite` store.
async fn cmd_import(path: PathBuf, config: LaunchgapConfig) -> Result<()> {
    let Some(db_path) = config.data.db_path else {
        return Err(Error::invalid_input(
            "db_path",
            "import needs --db or data.db_path; the in-memory store is not persisted",
        ));
    };

    let report = tokio::task::spawn_blocking(move || {
        let store = open_store(Some(&db_path))?;
        launchgap::io::import_csv_file(&path, store.as_ref())
    })
    .await
    .map_err(|e| Error::operation("import", e))??;

    print_json(&report)
}

/// Loads configuration from an explicit path or the default locations.
fn load_config(path: Option<&Path>) -> Result<LaunchgapConfig> {
    match path {
        Some(path) => LaunchgapConfig::load_from_file(path),
        None => LaunchgapConfig::load_default(),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered =
        serde_json::to_string_pretty(value).map_err(|e| Error::operation("render_json", e))?;
    println!("{rendered}");
    Ok(())
}
