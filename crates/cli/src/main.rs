//! incarforge CLI: the main entry point.
//!
//! Commands:
//! - `onboard`: Write the default config
//! - `status`: Show the effective configuration
//! - `doctor`: Check config and backend health
//! - `catalog`: List categories, tasks and standard sections
//! - `generate`: Build an INCAR from task selections in one shot
//! - `shell`: Interactive selection session

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "incarforge",
    about = "incarforge - assemble VASP INCAR files from task selections",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration file
    Onboard,

    /// Show the effective configuration
    Status,

    /// Check configuration and backend health
    Doctor,

    /// List categories, tasks and standard sections
    Catalog {
        /// Read the catalog from a JSON file instead of the backend
        #[arg(long, value_name = "FILE")]
        offline: Option<PathBuf>,
    },

    /// Generate an INCAR file from task selections
    Generate(commands::generate::GenerateArgs),

    /// Start an interactive selection session
    Shell {
        /// Read the catalog from a JSON file instead of the backend
        #[arg(long, value_name = "FILE")]
        offline: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Status => commands::status::run().await?,
        Commands::Doctor => commands::doctor::run().await?,
        Commands::Catalog { offline } => commands::catalog::run(offline).await?,
        Commands::Generate(args) => commands::generate::run(args).await?,
        Commands::Shell { offline } => commands::shell::run(offline).await?,
    }

    Ok(())
}
