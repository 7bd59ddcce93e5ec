//! Repository implementations for database access
//!
//! Each entity writer follows the same shape:
//! - Reference checks run before the write transaction opens
//! - Insert and audit append share one transaction
//! - Lookups return `None` for a missing row, not an error

pub mod audit;
pub mod ingestion;
pub mod classification;
pub mod storage;

pub use audit::{AuditAction, AuditError, AuditLogEntry, AuditRepo, EntityType, NewAuditEntry};
pub use ingestion::{IngestionRecord, IngestionRepo, NewIngestion};
pub use classification::{ClassificationRecord, ClassificationRepo, NewClassification};
pub use storage::{
    NewStorage, PassthroughNormalizer, PayloadNormalizer, StorageRecord, StorageRepo,
};
