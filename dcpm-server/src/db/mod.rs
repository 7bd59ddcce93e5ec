//! Database layer - connection pool, readiness, and repositories
//!
//! # Design Principles
//!
//! - One owned `Database` handle per process, passed into every repository
//! - Every write and its audit entry commit or roll back together
//! - Referential checks happen in the repositories, before the transaction
//! - Health checks degrade to `false`, they never return errors

pub mod error;
pub mod health;
pub mod pool;
pub mod readiness;
pub mod repos;

pub use error::{DbError, TxCause, TxStep};
pub use health::check_health;
pub use pool::{Database, Session};
pub use readiness::{wait_until_ready, ConnectivityProbe};
pub use repos::*;
