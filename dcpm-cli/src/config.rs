//! Command-line configuration
//!
//! Every setting can be given as a flag or through its environment
//! variable. A `.env` file in the working directory is loaded first and
//! never overrides variables that are already set.

use std::time::Duration;

use clap::Args;
use dcpm_server::config::{
    DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_MAX_CONNECTIONS, DEFAULT_MIN_CONNECTIONS,
};
use dcpm_server::{DatabaseConfig, ReadinessConfig};
use tracing::debug;

/// Load `.env` from the current directory if present.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => debug!("Loaded .env from {}", path.display()),
        Err(e) if e.not_found() => debug!("No .env file found, using environment only"),
        Err(e) => debug!("Failed to load .env: {}", e),
    }
}

/// PostgreSQL connection flags
#[derive(Args, Debug, Clone)]
pub struct DbArgs {
    /// Database user
    #[arg(long = "db-user", env = "POSTGRES_USER", default_value = "dcpm_user")]
    pub user: String,

    /// Database password
    #[arg(
        long = "db-password",
        env = "POSTGRES_PASSWORD",
        default_value = "dcpm_pass",
        hide_env_values = true
    )]
    pub password: String,

    /// Database name
    #[arg(long = "db-name", env = "POSTGRES_DB", default_value = "dcpm_db")]
    pub database: String,

    /// Database host
    #[arg(long = "db-host", env = "POSTGRES_HOST", default_value = "postgres")]
    pub host: String,

    /// Database port
    #[arg(long = "db-port", env = "POSTGRES_PORT", default_value_t = 5432)]
    pub port: u16,

    /// Minimum pooled connections
    #[arg(long, env = "DCPM_DB_MIN_CONNECTIONS", default_value_t = DEFAULT_MIN_CONNECTIONS)]
    pub min_connections: u32,

    /// Maximum pooled connections
    #[arg(long, env = "DCPM_DB_MAX_CONNECTIONS", default_value_t = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: u32,

    /// Seconds to wait for a free connection
    #[arg(long, env = "DCPM_DB_ACQUIRE_TIMEOUT", default_value_t = DEFAULT_ACQUIRE_TIMEOUT.as_secs())]
    pub acquire_timeout: u64,
}

impl From<DbArgs> for DatabaseConfig {
    fn from(args: DbArgs) -> Self {
        Self {
            user: args.user,
            password: args.password,
            database: args.database,
            host: args.host,
            port: args.port,
            min_connections: args.min_connections,
            max_connections: args.max_connections.max(args.min_connections).max(1),
            acquire_timeout: Duration::from_secs(args.acquire_timeout),
        }
    }
}

/// Startup readiness flags
#[derive(Args, Debug, Clone)]
pub struct ReadyArgs {
    /// Connectivity attempts before giving up
    #[arg(long, env = "DCPM_DB_RETRIES", default_value_t = 10)]
    pub db_retries: u32,

    /// Seconds between connectivity attempts
    #[arg(long, env = "DCPM_DB_RETRY_DELAY", default_value_t = 2)]
    pub db_retry_delay: u64,
}

impl From<ReadyArgs> for ReadinessConfig {
    fn from(args: ReadyArgs) -> Self {
        Self {
            max_attempts: args.db_retries,
            delay: Duration::from_secs(args.db_retry_delay),
        }
    }
}
