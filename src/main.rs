//! FMIACP Server
//!
//! Run with: cargo run -- [--config PATH] [serve]
//!
//! # Commands
//!
//! - `serve` (default): Run the REST API with periodic cache reloads
//! - `check-store`: Connect to the configured store and count its rows
//! - `config`: Print or write a default config file
//!
//! `RUST_LOG` takes precedence over the configured log level.

use anyhow::Context;
use clap::{Parser, Subcommand};
use fmiacp::api::{serve, ApiConfig, AppState};
use fmiacp::cache::{CacheEngine, ReloadCoordinator};
use fmiacp::config::{generate_default_config, Config, ConfigOrigin, LoggingConfig};
use fmiacp::store::{Connector, SqliteConnector};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "fmiacp")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Machine-status event service with cached log and latest-state views")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file (default: search the standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the API server
    Serve,

    /// Connect to the record store and report how many rows it holds
    CheckStore,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Config { output }) = &cli.command {
        return write_default_config(output.as_deref());
    }

    let (config, origin) = match &cli.config {
        Some(path) => {
            let config = Config::load_with_env(path)?;
            let origin = ConfigOrigin {
                path: Some(path.clone()),
                ..Default::default()
            };
            (config, origin)
        }
        None => Config::load_default(),
    };
    init_tracing(&config.logging);
    origin.log();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server(config).await,
        Commands::CheckStore => check_store(config).await,
        Commands::Config { .. } => Ok(()),
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("fmiacp={},tower_http=info", logging.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn connector(config: &Config) -> Arc<dyn Connector> {
    Arc::new(
        SqliteConnector::new(&config.store.path)
            .busy_timeout(Duration::from_millis(config.store.busy_timeout_ms)),
    )
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    tracing::info!("Starting FMIACP v{}", env!("CARGO_PKG_VERSION"));
    let connector = connector(&config);
    tracing::info!("Record store: {}", connector.describe());

    let engine = Arc::new(CacheEngine::new(connector));
    let coordinator = Arc::new(ReloadCoordinator::new(Arc::clone(&engine)));

    // First tick loads the views
    let reload_every = Duration::from_secs(config.cache.reload_interval_secs.max(1));
    let timer = Arc::clone(&coordinator).start_periodic(reload_every);

    let api_config = ApiConfig::from(&config.api);
    let state = AppState::new(
        Arc::clone(&engine),
        coordinator,
        api_config.clone(),
        config.auth.users.clone(),
    );

    let result = serve(state, &api_config).await;

    tracing::info!("Stopping periodic reload and closing the store");
    timer.abort();
    engine.shutdown().await;

    result.context("API server failed")?;
    tracing::info!("FMIACP stopped");
    Ok(())
}

async fn check_store(config: Config) -> anyhow::Result<()> {
    let connector = connector(&config);
    println!("Connecting to {}", connector.describe());

    let handle = connector
        .connect()
        .await
        .context("Could not connect to the record store")?;
    let rows = handle.fetch_all().await;
    handle.close().await;

    let rows = rows.context("Bulk query failed")?;
    println!("Connected. {} records in store", rows.len());
    if let Some(newest) = rows.first() {
        println!(
            "Newest: ID {} {} {} = {}",
            newest.id.unwrap_or_default(),
            newest.machine_name,
            newest.signal_type,
            newest.value.as_deref().unwrap_or("null")
        );
    }
    Ok(())
}

fn write_default_config(output: Option<&Path>) -> anyhow::Result<()> {
    let config = generate_default_config();

    match output {
        Some(path) => {
            // Create parent directory if needed
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &config)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Config written to {:?}", path);
        }
        None => print!("{}", config),
    }
    Ok(())
}
