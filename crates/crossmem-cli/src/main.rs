use std::path::PathBuf;

use clap::{Parser, Subcommand};
use crossmem_cli::commands::{
    ConfigCommand, GcCommand, MemoryCommand, RecommendCommand, SessionCommand, SimilarityCommand,
    StatsCommand, SummaryCommand, TransferCommand,
};
use crossmem_cli::error::CliResult;
use crossmem_cli::output::OutputFormat;
use crossmem_cli::workspace::Workspace;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "crossmem-cli")]
#[command(about = "Crossmem CLI - Inspect and manage the crossmem memory snapshot")]
#[command(version)]
pub struct Cli {
    #[clap(long, short, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[clap(long, short = 'd', global = true, help = "Path to data directory")]
    pub data_dir: Option<PathBuf>,

    #[clap(long, short = 'c', global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "Memory entry commands")]
    Memory(MemoryCommand),

    #[clap(about = "Session commands")]
    Session(SessionCommand),

    #[clap(about = "Context summary commands")]
    Summary(SummaryCommand),

    #[clap(about = "Transfer context between models")]
    Transfer(TransferCommand),

    #[clap(about = "Compare the context of two sessions")]
    Similarity(SimilarityCommand),

    #[clap(about = "Recommend a model for a session")]
    Recommend(RecommendCommand),

    #[clap(about = "Run garbage collection now")]
    Gc(GcCommand),

    #[clap(about = "Show memory statistics")]
    Stats(StatsCommand),

    #[clap(about = "Configuration commands")]
    Config(ConfigCommand),
}

impl Command {
    fn is_read_only(&self) -> bool {
        match self {
            Command::Memory(cmd) => cmd.is_read_only(),
            Command::Session(cmd) => cmd.is_read_only(),
            Command::Summary(cmd) => cmd.is_read_only(),
            Command::Transfer(cmd) => cmd.is_read_only(),
            Command::Similarity(_) | Command::Recommend(_) | Command::Stats(_) => true,
            Command::Gc(_) => false,
            Command::Config(_) => true,
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run() -> CliResult<()> {
    init_logging();
    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Table
    };

    if let Command::Config(cmd) = &cli.command {
        return cmd
            .execute(cli.config.as_deref(), cli.data_dir.clone(), format)
            .await;
    }

    let workspace = Workspace::open(cli.config.as_deref(), cli.data_dir.clone()).await?;
    let engine = &workspace.engine;

    let outcome = match &cli.command {
        Command::Memory(cmd) => cmd.execute(engine, format).await,
        Command::Session(cmd) => cmd.execute(engine, format).await,
        Command::Summary(cmd) => cmd.execute(engine, format).await,
        Command::Transfer(cmd) => cmd.execute(engine, format).await,
        Command::Similarity(cmd) => cmd.execute(engine, format).await,
        Command::Recommend(cmd) => cmd.execute(engine, format).await,
        Command::Gc(cmd) => cmd.execute(engine, format).await,
        Command::Stats(cmd) => cmd.execute(engine, format).await,
        Command::Config(_) => unreachable!(),
    };

    if !cli.command.is_read_only() {
        workspace.save().await?;
    }

    outcome
}
