//! dcpm-server: record-keeping API with an audit trail
//!
//! Accepts ingestion, classification and storage records over HTTP,
//! persists them in PostgreSQL, and appends an immutable audit entry for
//! every write in the same transaction as the write.

pub mod config;
pub mod db;
pub mod http;
pub mod models;

pub use config::{DatabaseConfig, ReadinessConfig};
pub use db::{check_health, wait_until_ready, Database, DbError};
pub use http::{run_server, ServerConfig};
