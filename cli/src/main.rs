//! spotmover - moves a music library into Spotify
//!
//! `dump` snapshots a Spotify library to a JSON file, `load` recreates a
//! snapshot's albums and playlists in the configured account, and `cache`
//! inspects the lookup cache kept between `load` runs.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use spotmover::ReconcileOptions;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;
mod prompt;

use commands::LoadArgs;
use config::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "spotmover")]
#[command(about = "Move a music library between streaming services")]
#[command(version)]
struct Cli {
    /// Config file (default: <config dir>/spotmover/config.toml)
    #[arg(short, long, global = true, env = "SPOTMOVER_CONFIG")]
    config: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Provider {
    Spotify,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a provider's library to a dump file
    Dump {
        provider: Provider,

        /// Dump file to write
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Load a dump file into a provider
    Load {
        provider: Provider,

        /// Dump file to read
        input: PathBuf,

        /// Never ask, import every playlist even when songs are missing
        #[arg(short, long)]
        force: bool,

        /// Create playlists even when one with the same name exists
        #[arg(short = 'p', long)]
        force_playlists: bool,

        /// Keep lookups in memory for this run only
        #[arg(long)]
        no_cache: bool,

        #[arg(long)]
        skip_albums: bool,

        #[arg(long)]
        skip_playlists: bool,
    },
    /// Inspect the lookup cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Print every cached key
    List {
        /// Cache id (default: engine.cache_id)
        #[arg(long)]
        id: Option<String>,
    },
    /// Delete every cached lookup
    Clear {
        /// Cache id (default: engine.cache_id)
        #[arg(long)]
        id: Option<String>,
    },
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("warn,spotmover={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn config_path(cli: &Cli) -> Result<PathBuf> {
    match &cli.config {
        Some(path) => Ok(path.clone()),
        None => AppConfig::default_path().context("No config directory on this system, use --config"),
    }
}

/// The cache commands run without a config file, on defaults.
fn optional_config(cli: &Cli) -> Result<AppConfig> {
    let path = config_path(cli)?;
    if cli.config.is_none() && !path.exists() {
        debug!("No config file at {}, using defaults", path.display());
        return Ok(AppConfig::default());
    }
    AppConfig::load(&path)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Command::Dump {
            provider: Provider::Spotify,
            output,
        } => {
            let config = AppConfig::load(&config_path(&cli)?)?;
            commands::dump(&config, output).await
        }
        Command::Load {
            provider: Provider::Spotify,
            input,
            force,
            force_playlists,
            no_cache,
            skip_albums,
            skip_playlists,
        } => {
            let config = AppConfig::load(&config_path(&cli)?)?;
            let args = LoadArgs {
                options: ReconcileOptions {
                    force: *force,
                    force_playlists: *force_playlists,
                },
                no_cache: *no_cache,
                skip_albums: *skip_albums,
                skip_playlists: *skip_playlists,
            };
            commands::load(&config, input, args).await
        }
        Command::Cache { action } => {
            let config = optional_config(&cli)?;
            match action {
                CacheAction::List { id } => commands::list_cache(&config.engine, id.as_deref()),
                CacheAction::Clear { id } => commands::clear_cache(&config.engine, id.as_deref()),
            }
        }
    }
}
