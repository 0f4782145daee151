//! taskdeck
//!
//! Personal task tracker with a server-rendered UI, a JSON REST API, and a
//! background scheduler for reminder emails.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use taskdeck::config::Config;
use taskdeck::db::Database;
use taskdeck::mail::LogTransport;
use taskdeck::reminder;
use taskdeck::web;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "taskdeck", version, about)]
struct Cli {
    /// Path to the config file (defaults to .taskdeck/config.yaml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the database path.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Override the HTTP port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(),
    };
    if let Some(db_path) = cli.db {
        config.server.db_path = db_path;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    config.ensure_db_dir()?;
    let db = Arc::new(Database::open(&config.server.db_path)?);
    info!("database ready at {}", config.server.db_path.display());

    let config = Arc::new(config);

    let (scheduler_handle, scheduler_shutdown) = reminder::start_scheduler(
        Arc::clone(&db),
        Arc::new(LogTransport),
        config.reminders.clone(),
    );

    let (server_shutdown, addr) = web::start_server(Arc::clone(&db), Arc::clone(&config)).await?;
    info!("serving on http://{}", addr);

    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    let _ = server_shutdown.send(());
    let _ = scheduler_shutdown.send(());
    let _ = scheduler_handle.await;

    Ok(())
}
