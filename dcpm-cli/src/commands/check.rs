//! One-shot database connectivity check

use anyhow::{bail, Result};
use clap::Parser;

use dcpm_server::{check_health, Database};

use crate::config::DbArgs;

/// Arguments for the check command
#[derive(Parser, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub db: DbArgs,
}

/// Probe the database once. Fails when it is unreachable.
pub async fn run_check(args: CheckArgs) -> Result<()> {
    let db = Database::new(args.db.into());
    let target = db.config().redacted_url();

    let healthy = check_health(&db).await;
    db.shutdown().await;

    if !healthy {
        bail!("database at {} is unreachable", target);
    }

    println!("database at {} is reachable", target);
    Ok(())
}
