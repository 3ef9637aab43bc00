//! Lyra daemon - streaming chat relay with web-search augmentation

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use lyra::config::Config;
use lyra::error::Result;
use lyra::server::ChatServer;

/// Lyra - streaming chat relay server
#[derive(Parser)]
#[command(name = "lyra")]
#[command(about = "Streaming chat relay with web-search augmentation and bounded memory")]
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
    /// Start the relay server (default command)
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
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,lyra=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    if let Some(path) = config_path {
        tracing::info!("Loading config from: {}", path.display());
        return read_config(&path);
    }

    let default_paths = [
        dirs::home_dir().map(|h| h.join(".lyra").join("config.toml")),
        dirs::config_dir().map(|c| c.join("lyra").join("config.toml")),
        Some(PathBuf::from("config.toml")),
    ];

    for path in default_paths.iter().flatten() {
        if path.exists() {
            tracing::info!("Loading config from: {}", path.display());
            return read_config(path);
        }
    }

    tracing::info!("No config file found, using defaults");
    Ok(Config::default())
}

fn read_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        lyra::LyraError::Config(format!(
            "Failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;
    toml::from_str(&content)
        .map_err(|e| lyra::LyraError::Config(format!("Failed to parse config: {e}")))
}

async fn serve(config_path: Option<PathBuf>) -> Result<()> {
    tracing::info!("Starting Lyra daemon");

    let mut config = load_config(config_path)?;
    config.apply_env_overrides();
    tracing::debug!("Config loaded: {:?}", config);

    ChatServer::new(config).serve().await
}
