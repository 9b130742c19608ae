use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use riskfuse_config::{Config, ConfigLoader};
use riskfuse_core::FusionPolicy;
use riskfuse_model::{ConcurrencyLimit, DateWindow, HistoryEntryId, ScoreBand, StatusTab};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod history;
mod scan;

#[derive(Parser)]
#[command(name = "riskfusectl", about = "Batch file risk scanner")]
struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Env file to load before resolving configuration
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan one or more files and print a fused risk score for each
    Scan {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Pipelines allowed in flight at once (1-10)
        #[arg(long, value_parser = parse_concurrency)]
        concurrency: Option<ConcurrencyLimit>,
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,
        /// Do not record results in the scan history
        #[arg(long)]
        no_history: bool,
    },
    /// Inspect or edit the scan history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// List entries, newest first
    List {
        #[arg(long, default_value = "all")]
        status: StatusTab,
        #[arg(long, default_value = "all")]
        band: ScoreBand,
        /// Case-insensitive match on file name or SHA-256
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value = "all")]
        since: DateWindow,
        /// Print raw JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Counts per risk band
    Stats,
    /// Delete a single entry
    Remove { id: HistoryEntryId },
    /// Delete every entry
    Clear,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    FourSignal,
    TwoSignal,
}

impl PolicyArg {
    fn resolve(self, configured: FusionPolicy) -> FusionPolicy {
        match (self, configured) {
            (PolicyArg::FourSignal, _) => FusionPolicy::FourSignal,
            // Keep configured weights when the file already selects two-signal.
            (PolicyArg::TwoSignal, policy @ FusionPolicy::TwoSignal { .. }) => policy,
            (PolicyArg::TwoSignal, FusionPolicy::FourSignal) => FusionPolicy::two_signal(),
        }
    }
}

fn parse_concurrency(raw: &str) -> Result<ConcurrencyLimit, String> {
    let value: usize = raw.parse().map_err(|e| format!("{e}"))?;
    ConcurrencyLimit::new(value).map_err(|e| e.to_string())
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_config_path(path);
    }
    if let Some(path) = &cli.env_file {
        loader = loader.with_env_file(path);
    }
    loader.load().context("failed to load configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,riskfuse_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = load_config(&cli)?;
    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = config.metadata.source.path() {
        info!(path = %path.display(), "configuration file loaded");
    }

    match cli.command {
        Command::Scan {
            files,
            concurrency,
            policy,
            no_history,
        } => {
            if let Some(limit) = concurrency {
                config.batch.concurrency_limit = limit;
            }
            if let Some(policy) = policy {
                config.fusion = policy.resolve(config.fusion);
            }
            scan::run(&config, files, !no_history).await
        }
        Command::History { action } => {
            let store = config.history.open_store();
            match action {
                HistoryAction::List {
                    status,
                    band,
                    search,
                    since,
                    json,
                } => history::list(&store, status, band, search, since, json).await,
                HistoryAction::Stats => history::stats(&store).await,
                HistoryAction::Remove { id } => history::remove(&store, id).await,
                HistoryAction::Clear => history::clear(&store).await,
            }
        }
    }
}
