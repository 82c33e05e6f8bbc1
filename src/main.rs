//! Visa Tracker - Main Server
//!
//! REST service tracking per-client visa processing stages on MongoDB.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use visa_tracker::{mongo::MongoStore, Config};

#[derive(Parser)]
#[command(name = "visa-tracker")]
#[command(about = "Visa processing tracker server")]
struct Cli {
    /// Path to the YAML config file (defaults to ./config.yaml)
    #[arg(short, long, global = true, env = "VISA_TRACKER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on (overrides config and SERVER_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Create the configured default branch if no branch exists
    SeedBranch,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,visa_tracker=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::from_yaml_and_env(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server_port = port;
            }
            visa_tracker::start_server(config).await
        }
        Commands::SeedBranch => run_seed_branch(config).await,
    }
}

async fn run_seed_branch(config: Config) -> Result<()> {
    let store = MongoStore::connect(&config.mongo_uri, &config.mongo_database).await?;
    match visa_tracker::seed_default_branch(&store, config.default_branch.as_ref()).await? {
        Some(branch) => {
            tracing::info!(
                "Default branch: {} ({}) [{}]",
                branch.branch_name,
                branch.branch_location,
                branch.id
            );
            Ok(())
        }
        None => bail!("No branch exists and no default_branch is configured"),
    }
}
