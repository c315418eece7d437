pub mod cli;
pub mod core;
pub mod error;
pub mod providers;
pub mod store;
pub mod sync;

use crate::core::config::AppConfig;
use crate::store::RateStore;
use anyhow::{Context, Result};
use tracing::{debug, info};

pub enum AppCommand {
    Sync { force: bool },
    Rates { code: String },
    Convert { amount: f64, from: String, to: String },
    Status,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("fxsync starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let data_path = config.data_path()?;
    let store = RateStore::open(&data_path)
        .with_context(|| format!("Failed to open rate store at {}", data_path.display()))?;
    store
        .seed_defaults_if_empty()
        .context("Failed to seed default exchange rates")?;

    match command {
        AppCommand::Sync { force } => cli::sync::run(&config, &store, force).await,
        AppCommand::Rates { code } => cli::rates::show_rates(&store, &code),
        AppCommand::Convert { amount, from, to } => {
            cli::rates::show_conversion(&store, amount, &from, &to)
        }
        AppCommand::Status => cli::rates::show_status(&config, &store),
    }
}
