//! Audit trail
//!
//! Append-only log of state changes. Entries are written inside the
//! transaction of the change they document and are never updated or
//! deleted.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use crate::db::{Database, DbError};
use crate::models::{Limit, ValidationError};

/// Actor recorded when a change is made by the service itself
pub const SYSTEM_ACTOR: &str = "system";

/// Audited action tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    IngestionCreated,
    ClassificationCreated,
    StorageCreated,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IngestionCreated => "INGESTION_CREATED",
            Self::ClassificationCreated => "CLASSIFICATION_CREATED",
            Self::StorageCreated => "STORAGE_CREATED",
        }
    }

    /// Entity type the action applies to.
    pub fn entity_type(&self) -> EntityType {
        match self {
            Self::IngestionCreated => EntityType::Ingestion,
            Self::ClassificationCreated => EntityType::Classification,
            Self::StorageCreated => EntityType::Storage,
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of record an audit entry refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Ingestion,
    Classification,
    Storage,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ingestion => "ingestion",
            Self::Classification => "classification",
            Self::Storage => "storage",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ingestion" => Ok(Self::Ingestion),
            "classification" => Ok(Self::Classification),
            "storage" => Ok(Self::Storage),
            other => Err(ValidationError::InvalidVariant {
                field: "entity_type",
                value: other.to_owned(),
            }),
        }
    }
}

/// Audit entry to append. `M` is any serializable metadata.
#[derive(Debug, Clone)]
pub struct NewAuditEntry<'a, M = Value> {
    pub action: AuditAction,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub actor: &'a str,
    pub metadata: M,
}

impl<M> NewAuditEntry<'static, M> {
    /// Entry attributed to the service itself.
    pub fn system(action: AuditAction, entity_id: impl ToString, metadata: M) -> Self {
        Self {
            action,
            entity_type: action.entity_type(),
            entity_id: entity_id.to_string(),
            actor: SYSTEM_ACTOR,
            metadata,
        }
    }
}

/// Audit append failure. Either variant must abort the caller's transaction.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("failed to encode audit field '{field}': {source}")]
    Encode {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write audit entry: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Encode a structured audit field for a nullable `jsonb` column.
///
/// Null and empty objects/strings are stored as SQL NULL rather than as an
/// empty JSON value.
pub fn encode_nullable<T>(field: &'static str, value: &T) -> Result<Option<Value>, AuditError>
where
    T: Serialize + ?Sized,
{
    let value =
        serde_json::to_value(value).map_err(|source| AuditError::Encode { field, source })?;

    let empty = match &value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    };

    Ok((!empty).then_some(value))
}

/// Append one audit entry.
///
/// `conn` must be inside a transaction owned by the caller; this function
/// never begins, commits or rolls back. The id is generated here and
/// `created_at` is assigned by the store.
pub async fn append<M>(conn: &mut PgConnection, entry: &NewAuditEntry<'_, M>) -> Result<(), AuditError>
where
    M: Serialize,
{
    let actor = encode_nullable("actor", entry.actor)?;
    let metadata = encode_nullable("metadata", &entry.metadata)?;

    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, action, entity_type, entity_id, actor, metadata)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(entry.action.as_str())
    .bind(entry.entity_type.as_str())
    .bind(&entry.entity_id)
    .bind(actor)
    .bind(metadata)
    .execute(&mut *conn)
    .await?;

    tracing::debug!(
        action = %entry.action,
        entity_id = %entry.entity_id,
        "audit entry appended"
    );
    Ok(())
}

/// Audit entry as stored
#[derive(Debug, Clone, FromRow)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub actor: Option<Value>,
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
}

/// Read access to the audit trail
pub struct AuditRepo<'a> {
    db: &'a Database,
}

impl<'a> AuditRepo<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Most recent entries, newest first.
    pub async fn list(&self, limit: Limit) -> Result<Vec<AuditLogEntry>, DbError> {
        let mut session = self.db.acquire_session().await?;
        let entries = sqlx::query_as(
            r#"
            SELECT id, action, entity_type, entity_id, actor, metadata, created_at
            FROM audit_logs
            ORDER BY created_at DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(limit.as_i64())
        .fetch_all(&mut *session)
        .await?;

        Ok(entries)
    }

    /// Full history of one entity, newest first.
    pub async fn list_for_entity(
        &self,
        entity_type: EntityType,
        entity_id: &str,
    ) -> Result<Vec<AuditLogEntry>, DbError> {
        let mut session = self.db.acquire_session().await?;
        let entries = sqlx::query_as(
            r#"
            SELECT id, action, entity_type, entity_id, actor, metadata, created_at
            FROM audit_logs
            WHERE entity_type = $1 AND entity_id = $2
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(entity_type.as_str())
        .bind(entity_id)
        .fetch_all(&mut *session)
        .await?;

        Ok(entries)
    }
}
