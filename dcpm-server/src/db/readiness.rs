//! Startup readiness gate
//!
//! Database containers often come up after the API process. The gate
//! retries a trivial query with a fixed delay before the server binds its
//! listener.

use std::time::Duration;

use async_trait::async_trait;

use super::{Database, DbError};

/// Upper bound on a single connectivity check.
pub const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Something whose connectivity can be checked with one cheap round-trip.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn ping(&self) -> Result<(), DbError>;
}

#[async_trait]
impl ConnectivityProbe for Database {
    /// Acquire a session and run `SELECT 1`, bounded by [`PING_TIMEOUT`].
    async fn ping(&self) -> Result<(), DbError> {
        let probe = async {
            let mut session = self.acquire_session().await?;
            sqlx::query("SELECT 1").execute(&mut *session).await?;
            Ok::<(), DbError>(())
        };

        tokio::time::timeout(PING_TIMEOUT, probe)
            .await
            .unwrap_or(Err(DbError::Sqlx(sqlx::Error::PoolTimedOut)))
    }
}

/// Retry `probe` until it succeeds or `max_attempts` are used.
///
/// Sleeps `delay` between failed attempts (not after the last one), so the
/// total wait is bounded by `max_attempts * delay` plus probe time. Returns
/// the number of attempts it took. A `max_attempts` of zero still makes one
/// attempt.
///
/// # Errors
///
/// Returns [`DbError::DatabaseUnreachable`] carrying the last failure when
/// every attempt fails.
pub async fn wait_until_ready<P>(
    probe: &P,
    max_attempts: u32,
    delay: Duration,
) -> Result<u32, DbError>
where
    P: ConnectivityProbe + ?Sized,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match probe.ping().await {
            Ok(()) => {
                tracing::info!(attempt, "database is reachable");
                return Ok(attempt);
            }
            Err(err) if attempt >= max_attempts => {
                tracing::error!(attempt, error = %err, "database unreachable, giving up");
                return Err(DbError::DatabaseUnreachable {
                    attempts: attempt,
                    source: Box::new(err),
                });
            }
            Err(err) => {
                tracing::warn!(
                    attempt,
                    max_attempts,
                    error = %err,
                    "waiting for database"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
