//! On-demand liveness probe

use std::time::Duration;

use super::readiness::ConnectivityProbe;
use super::Database;

/// Upper bound on a health check round-trip.
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(3);

/// Check database connectivity with one short query.
///
/// Never fails: any connectivity error, query error or timeout yields
/// `false`. Independent of the startup gate.
pub async fn check_health(db: &Database) -> bool {
    match tokio::time::timeout(HEALTH_TIMEOUT, db.ping()).await {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            tracing::debug!(error = %err, "health probe failed");
            false
        }
        Err(_) => {
            tracing::debug!("health probe timed out");
            false
        }
    }
}
