// CycleCare Control CLI
// Record observations, deliver suggestions and feed back how they went

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use cycle_memory::MemoryStore;
use cycle_rl_agent::NotificationEngine;
use cycle_rl_core::{CyclePhase, SharedRng, StateEncoder};

mod commands;
mod config;
mod populate;

use config::CycleConfig;

/// Data directory used when neither the config nor the command line names one
const DEFAULT_DATA_DIR: &str = "cyclecare-data";

#[derive(Parser)]
#[command(name = "cyclectl")]
#[command(about = "CycleCare personalized self-care notifications", version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the store snapshot
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record today's observation for a user
    Observe {
        /// User id
        #[arg(short, long)]
        user: String,

        /// Cycle phase (menstrual, follicular, ovulation, luteal)
        #[arg(short, long)]
        phase: CyclePhase,

        #[arg(long)]
        sleep: u8,

        #[arg(long)]
        mood: u8,

        #[arg(long)]
        stress: u8,

        #[arg(long)]
        pain: u8,

        #[arg(long)]
        energy: u8,
    },

    /// Propose a self-care suggestion for a user's current state
    Propose {
        /// User id
        #[arg(short, long)]
        user: String,
    },

    /// Give feedback on a delivered notification
    Feedback {
        /// Notification id
        id: u64,

        /// The suggestion was not acted on
        #[arg(long)]
        skipped: bool,

        /// How well it helped (0-10)
        #[arg(short, long)]
        effectiveness: f64,

        /// Next-day energy level (1-10)
        #[arg(long)]
        energy: u8,

        /// Next-day mood (1-10)
        #[arg(long)]
        mood: u8,
    },

    /// Show which suggestions work best for a user
    Analytics {
        /// User id
        #[arg(short, long)]
        user: String,
    },

    /// Dump a user's learned Q-values
    Qtable {
        /// User id
        #[arg(short, long)]
        user: String,
    },

    /// Show a user's learning history
    History {
        /// User id
        #[arg(short, long)]
        user: String,

        /// Number of most recent entries to show
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },

    /// Populate the store with sample users and data
    Seed {
        /// Number of users
        #[arg(long, default_value = "5")]
        users: usize,

        /// Days of observations per user
        #[arg(long, default_value = "30")]
        days: u32,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Everything a command needs
pub(crate) struct App {
    pub engine: NotificationEngine<MemoryStore>,
    pub rng: SharedRng,
    pub json: bool,
}

async fn build_app(cli: &Cli) -> Result<App> {
    let mut config = match &cli.config {
        Some(path) => CycleConfig::load(path)?,
        None => CycleConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.store.data_dir = Some(dir.clone());
    }
    if config.store.data_dir.is_none() {
        config.store.data_dir = Some(PathBuf::from(DEFAULT_DATA_DIR));
    }

    let store = MemoryStore::open(&config.store)
        .await
        .context("Failed to open store")?;
    tracing::debug!(snapshot = ?store.snapshot_path(), "store opened");

    let rng = SharedRng::from_seed_opt(config.seed);
    let engine = NotificationEngine::new(Arc::new(store), config.agent, StateEncoder::default(), rng.clone())?;

    Ok(App { engine, rng, json: cli.json })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let app = build_app(&cli).await?;
    commands::handle_command(&app, cli.command).await
}
