//! Database error types

use std::fmt;

use super::repos::audit::AuditError;

/// Step of a write transaction at which it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStep {
    Begin,
    Insert,
    Audit,
    Commit,
}

impl fmt::Display for TxStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Begin => "begin",
            Self::Insert => "insert",
            Self::Audit => "audit",
            Self::Commit => "commit",
        };
        f.write_str(name)
    }
}

/// Underlying cause of a rolled-back write
#[derive(Debug, thiserror::Error)]
pub enum TxCause {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Audit(#[from] AuditError),
}

/// Database error type
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// A referenced record did not exist at write time
    #[error("{resource} '{id}' not found")]
    ReferenceNotFound { resource: &'static str, id: String },

    /// The pool was shut down
    #[error("connection pool is unavailable")]
    PoolUnavailable,

    /// Startup connectivity checks exhausted their attempts
    #[error("database unreachable after {attempts} attempt(s): {source}")]
    DatabaseUnreachable {
        attempts: u32,
        #[source]
        source: Box<DbError>,
    },

    /// Insert-plus-audit sequence failed and was rolled back
    #[error("transaction rolled back at {step}: {source}")]
    TransactionFailure {
        step: TxStep,
        #[source]
        source: TxCause,
    },
}

impl DbError {
    /// Build a `map_err` adapter tagging a failure with its transaction step.
    pub(crate) fn tx<E>(step: TxStep) -> impl FnOnce(E) -> Self
    where
        E: Into<TxCause>,
    {
        move |err| Self::TransactionFailure {
            step,
            source: err.into(),
        }
    }

    /// Whether the error means the database could not be reached at all.
    pub fn is_connectivity(&self) -> bool {
        match self {
            Self::PoolUnavailable | Self::DatabaseUnreachable { .. } => true,
            Self::Sqlx(e) => matches!(
                e,
                sqlx::Error::Io(_)
                    | sqlx::Error::Tls(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
            ),
            _ => false,
        }
    }

    pub(crate) fn reference(resource: &'static str, id: impl ToString) -> Self {
        Self::ReferenceNotFound {
            resource,
            id: id.to_string(),
        }
    }
}
