//! HTTP server command
//!
//! Waits for the database, then serves the API until Ctrl+C/SIGTERM.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;

use dcpm_server::{run_server, wait_until_ready, Database, ReadinessConfig, ServerConfig};

use crate::config::{DbArgs, ReadyArgs};

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind to
    #[arg(long, short = 'b', env = "DCPM_BIND", default_value = "0.0.0.0:8000")]
    pub bind: SocketAddr,

    /// Allow permissive CORS (all origins) - use with caution
    #[arg(long)]
    pub cors_permissive: bool,

    #[command(flatten)]
    pub db: DbArgs,

    #[command(flatten)]
    pub ready: ReadyArgs,
}

/// Run the HTTP server
pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let db = Database::new(args.db.into());
    let ready = ReadinessConfig::from(args.ready);

    tracing::info!(
        database = %db.config().redacted_url(),
        max_attempts = ready.max_attempts,
        "Waiting for database"
    );

    // Never bind the listener without a reachable database
    wait_until_ready(&db, ready.max_attempts, ready.delay)
        .await
        .context("Database is unreachable, refusing to start")?;

    let config = ServerConfig {
        bind_addr: args.bind,
        cors_permissive: args.cors_permissive,
    };

    tracing::info!("Starting DCPM server on {}", config.bind_addr);

    // Run server (blocks until shutdown, then closes the pool)
    run_server(db, config).await.context("Server error")?;

    Ok(())
}
