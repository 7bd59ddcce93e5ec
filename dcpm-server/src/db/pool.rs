//! Database connection pool management
//!
//! `Database` owns a lazily created sqlx `PgPool`. It is constructed once at
//! process start, cloned into every component that needs it, and closed by
//! the shutdown hook.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sqlx::pool::PoolConnection;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Connection, PgConnection, PgPool, Postgres, Transaction};
use tokio::sync::OnceCell;

use super::DbError;
use crate::config::DatabaseConfig;

/// Shared handle to the connection pool.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

struct DatabaseInner {
    config: DatabaseConfig,
    pool: OnceCell<PgPool>,
    closed: AtomicBool,
}

impl Database {
    /// Create a handle. No connection is made until first use.
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            inner: Arc::new(DatabaseInner {
                config,
                pool: OnceCell::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.inner.config
    }

    /// Whether `shutdown` has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Get the pool, creating it on first call.
    ///
    /// Concurrent first calls share one initialization. A failed
    /// initialization leaves the cell empty so the next call retries.
    async fn pool(&self) -> Result<&PgPool, DbError> {
        if self.is_closed() {
            return Err(DbError::PoolUnavailable);
        }

        let config = &self.inner.config;
        let pool = self
            .inner
            .pool
            .get_or_try_init(|| async move {
                tracing::debug!(url = %config.redacted_url(), "creating connection pool");
                PgPoolOptions::new()
                    .min_connections(config.min_connections)
                    .max_connections(config.max_connections)
                    .acquire_timeout(config.acquire_timeout)
                    .connect(&config.connection_url())
                    .await
            })
            .await?;

        // shutdown() may have run while the pool was being created
        if self.is_closed() {
            pool.close().await;
            return Err(DbError::PoolUnavailable);
        }

        Ok(pool)
    }

    /// Borrow one pooled connection.
    ///
    /// Waits for a free connection when the pool is exhausted, up to the
    /// configured acquire timeout.
    pub async fn acquire_session(&self) -> Result<Session, DbError> {
        let pool = self.pool().await?;
        match pool.acquire().await {
            Ok(conn) => Ok(Session { conn }),
            Err(sqlx::Error::PoolClosed) => Err(DbError::PoolUnavailable),
            Err(e) => Err(e.into()),
        }
    }

    /// Close all pooled connections and refuse further sessions.
    pub async fn shutdown(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(pool) = self.inner.pool.get() {
            pool.close().await;
            tracing::info!("database pool closed");
        }
    }
}

/// A borrowed pool connection, returned to the pool when dropped.
pub struct Session {
    conn: PoolConnection<Postgres>,
}

impl Session {
    /// Open a transaction on this session's connection.
    ///
    /// Dropping the transaction without committing rolls it back.
    pub async fn begin(&mut self) -> Result<Transaction<'_, Postgres>, sqlx::Error> {
        Connection::begin(&mut *self.conn).await
    }
}

impl Deref for Session {
    type Target = PgConnection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl DerefMut for Session {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}
