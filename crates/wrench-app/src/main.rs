//! Wrench application binary - composition root.
//!
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Install tracing
//! 3. Run the requested subcommand:
//!    - `providers`: build the provider registry and report every chain
//!    - `sweep`: open the session database and time out idle sessions
//!      until Ctrl-C

mod cli;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use wrench_chat::{Persona, SessionStore, SessionSweeper};
use wrench_core::config::WrenchConfig;
use wrench_provider::{Eligibility, ProviderRegistry};
use wrench_storage::{Database, SqliteSessionRepository};

use cli::{CliArgs, Command};

/// Expand a leading `~` to the home directory.
fn resolve_data_dir(data_dir: &str) -> PathBuf {
    match data_dir.strip_prefix("~/") {
        Some(rest) => {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(rest)
        }
        None => PathBuf::from(data_dir),
    }
}

/// Print every chain. Returns false if some chain cannot serve requests.
fn report_providers(registry: &ProviderRegistry) -> bool {
    let chains = registry.chains();
    if chains.is_empty() {
        println!("No providers configured.");
        return false;
    }

    let mut all_served = true;
    for chain in chains {
        let eligible = registry.list_eligible(&chain).len();
        println!("chain {} ({} eligible)", chain, eligible);
        for provider in registry.list_all(&chain) {
            let status = match &provider.eligibility {
                Eligibility::Eligible => "eligible".to_string(),
                Eligibility::SkippedInvalidCredential { reason } => format!("skipped: {}", reason),
            };
            println!(
                "  {:>3}  {:<24} {:<8} {:<7} {}",
                provider.priority,
                provider.id.as_str(),
                provider.kind.as_str(),
                format!("{:?}", provider.dialect).to_lowercase(),
                status
            );
        }
        if eligible == 0 {
            tracing::error!(chain = %chain, "Chain has no eligible providers");
            all_served = false;
        }
    }
    all_served
}

async fn run_sweeper(config: &WrenchConfig) -> Result<(), Box<dyn std::error::Error>> {
    let data_dir = resolve_data_dir(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    let db_path = data_dir.join("wrench.db");
    let db = Arc::new(Database::new(&db_path)?);
    tracing::info!(path = %db_path.display(), "Session database opened");

    let store = Arc::new(SessionStore::new(
        Arc::new(SqliteSessionRepository::new(db)),
        Arc::new(Persona::new(config.persona.clone())),
        config.session.clone(),
    ));

    // Catch up on anything that expired while nothing was running.
    let expired = store.sweep()?;
    tracing::info!(count = expired.len(), "Initial sweep complete");

    let sweeper = Arc::new(SessionSweeper::new(
        store,
        Duration::from_secs(config.session.sweep_interval_secs.max(1)),
    ));
    let runner = Arc::clone(&sweeper);
    let handle = tokio::spawn(async move { runner.run().await });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");
    sweeper.shutdown();
    handle.await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let config_file = args.resolve_config_path();
    let mut config = WrenchConfig::load_or_default(&config_file);
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    if let Some(level) = args.resolve_log_level() {
        config.general.log_level = level;
    }

    // Tracing: RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting Wrench v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), providers = config.providers.len(), "Configuration loaded");

    match args.command {
        Command::Providers => {
            let registry = ProviderRegistry::from_config(&config.providers)?;
            if report_providers(&registry) {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        Command::Sweep => {
            run_sweeper(&config).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
