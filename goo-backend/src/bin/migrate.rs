//! Goo migrate
//!
//! Applies or reverts the database migrations outside the server.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use goo_backend::config_helpers::database_config_from_config;
use goo_backend::tracing_setup::install_tracing_from_config;
use goo_db::Database;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "goo-migrate", version, about = "Run Goo database migrations")]
struct Cli {
    /// Path to configuration file (toml, yaml or json)
    #[arg(short = 'c', long, env = "GOO_CONFIG_PATH")]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply all pending migrations
    Up,
    /// Revert all migrations
    Down,
    /// Migrate up or down to the given version
    To { version: u32 },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("failed to load .env: {e}");
        }
    }
    let cli = Cli::parse();

    let config = goo_config::load_config(cli.config_path.as_deref()).map_err(|e| {
        eprintln!("failed to load configuration: {e}");
        anyhow::anyhow!(e.to_string())
    })?;
    goo_config::validate_config(&config).context("invalid configuration")?;
    install_tracing_from_config(&config.logging);

    if let Err(e) = migrate(&config, cli.command).await {
        error!(error = %format!("{e:#}"), "Error migrating");
        return Err(e);
    }
    Ok(())
}

async fn migrate(config: &goo_config::Config, command: Command) -> anyhow::Result<()> {
    let pool = goo_db::create_pool(&database_config_from_config(config))
        .await
        .context("creating database pool")?;
    let db = Database::new(pool);

    match command {
        Command::Up => db.migrate_up().await?,
        Command::Down => db.migrate_down().await?,
        Command::To { version } => db.migrate_to(i64::from(version)).await?,
    }

    let version = db.migration_version().await?;
    info!(version, "Migrated");
    Ok(())
}
