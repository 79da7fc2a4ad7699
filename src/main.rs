//! STEMgraph CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use config::{FileConfig, ServeArgs, StoreArgs};

#[derive(Parser)]
#[command(name = "stemgraph")]
#[command(about = "HTTP API over the STEMgraph challenge dependency graph", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve(ServeArgs),
    /// Ping the graph store, load the graph once and print its size
    Check(StoreArgs),
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("stemgraph={0},tower_http={0}", log_level)));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("STEMgraph v{}", env!("CARGO_PKG_VERSION"));
    if let Ok(path) = dotenv {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    let file = FileConfig::load_optional(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve(args) => commands::serve(&file, args).await,
        Commands::Check(args) => commands::check(&file, args).await,
        Commands::Version => {
            println!("STEMgraph v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
