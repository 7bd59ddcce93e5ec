//! Database and readiness configuration
//!
//! Values come from the `POSTGRES_*` environment variables, each with a
//! default matching the compose deployment.

use std::time::Duration;

/// Default minimum number of pooled connections.
pub const DEFAULT_MIN_CONNECTIONS: u32 = 1;

/// Default maximum number of pooled connections.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Default time a caller waits for a free connection.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of startup connectivity attempts.
pub const DEFAULT_READY_ATTEMPTS: u32 = 10;

/// Default pause between startup connectivity attempts.
pub const DEFAULT_READY_DELAY: Duration = Duration::from_secs(2);

/// PostgreSQL connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub user: String,
    pub password: String,
    pub database: String,
    pub host: String,
    pub port: u16,
    pub min_connections: u32,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            user: "dcpm_user".to_string(),
            password: "dcpm_pass".to_string(),
            database: "dcpm_db".to_string(),
            host: "postgres".to_string(),
            port: 5432,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }
}

impl DatabaseConfig {
    /// Read settings from the process environment.
    ///
    /// Unset variables fall back to the defaults. An unparsable
    /// `POSTGRES_PORT` also falls back, with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary lookup function.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = match lookup("POSTGRES_PORT") {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "invalid POSTGRES_PORT, using {}", defaults.port);
                defaults.port
            }),
            None => defaults.port,
        };

        Self {
            user: lookup("POSTGRES_USER").unwrap_or(defaults.user),
            password: lookup("POSTGRES_PASSWORD").unwrap_or(defaults.password),
            database: lookup("POSTGRES_DB").unwrap_or(defaults.database),
            host: lookup("POSTGRES_HOST").unwrap_or(defaults.host),
            port,
            ..defaults
        }
    }

    /// Compose the settings into a single connection string.
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            urlencoding::encode(&self.user),
            urlencoding::encode(&self.password),
            self.host,
            self.port,
            urlencoding::encode(&self.database),
        )
    }

    /// Connection string with the password masked, for logs.
    pub fn redacted_url(&self) -> String {
        format!(
            "postgres://{}:***@{}:{}/{}",
            urlencoding::encode(&self.user),
            self.host,
            self.port,
            urlencoding::encode(&self.database),
        )
    }
}

/// Startup readiness gate settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessConfig {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_READY_ATTEMPTS,
            delay: DEFAULT_READY_DELAY,
        }
    }
}
