//! Crossmem Daemon - session memory engine with a local HTTP API

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crossmem::MemoryEngine;
use crossmem::api;
use crossmem::config::Config;
use crossmem::error::Result;
use crossmem::scheduler::GcScheduler;
use crossmem::storage::snapshot::{JsonFileSnapshot, SnapshotStore};

/// Crossmem - Session memory that follows a conversation across models
#[derive(Parser)]
#[command(name = "crossmem")]
#[command(about = "Session memory engine that carries context between LLM backends")]
#[command(version)]
pub struct Cli {
    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the daemon (default command)
    #[command(name = "serve")]
    Serve,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => serve(cli.config).await,
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,crossmem=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn serve(config_path: Option<PathBuf>) -> Result<()> {
    tracing::info!("Starting crossmem daemon");

    let config = Config::load(config_path.as_deref())?;
    tracing::debug!("Config loaded: {:?}", config);

    let snapshots: Arc<dyn SnapshotStore> = Arc::new(JsonFileSnapshot::new(config.snapshot_path()));
    let engine = Arc::new(MemoryEngine::open(&config, snapshots.as_ref()).await?);

    let stats = engine.get_memory_stats().await;
    tracing::info!(
        "Engine ready: {} entries across {} sessions",
        stats.total_entries,
        stats.sessions_count
    );

    let scheduler = GcScheduler::spawn(
        engine.clone(),
        config.storage.save_on_gc.then(|| snapshots.clone()),
    );

    let served = api::serve(engine.clone(), &config.api).await;

    scheduler.shutdown().await;
    snapshots.save(&engine.snapshot().await).await?;

    served?;
    tracing::info!("Crossmem daemon stopped");
    Ok(())
}
