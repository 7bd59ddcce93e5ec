//! Storage repository
//!
//! Stored form of an ingestion. The normalized payload is derived from the
//! referenced ingestion through a [`PayloadNormalizer`].

use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::FromRow;
use uuid::Uuid;

use super::audit::{self, AuditAction, NewAuditEntry};
use super::{classification, ingestion, IngestionRecord};
use crate::db::{Database, DbError, TxStep};
use crate::models::{JsonObject, Limit};

/// Derives the stored payload from an ingestion record.
pub trait PayloadNormalizer: Send + Sync {
    fn normalize(&self, ingestion: &IngestionRecord) -> JsonObject;
}

/// Stores the ingestion payload unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughNormalizer;

impl PayloadNormalizer for PassthroughNormalizer {
    fn normalize(&self, ingestion: &IngestionRecord) -> JsonObject {
        ingestion.payload.clone()
    }
}

/// Storage record from database
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct StorageRecord {
    pub id: Uuid,
    pub ingestion_id: Uuid,
    pub classification_id: Option<Uuid>,
    #[sqlx(json)]
    pub normalized_payload: JsonObject,
    pub created_at: DateTime<Utc>,
}

/// Input for a new storage record
#[derive(Debug, Clone)]
pub struct NewStorage {
    pub ingestion_id: Uuid,
    pub classification_id: Option<Uuid>,
}

const SELECT_COLUMNS: &str =
    "id, ingestion_id, classification_id, normalized_payload, created_at";

/// Storage repository
pub struct StorageRepo<'a> {
    db: &'a Database,
    normalizer: &'a dyn PayloadNormalizer,
}

impl<'a> StorageRepo<'a> {
    /// Repository using [`PassthroughNormalizer`].
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            normalizer: &PassthroughNormalizer,
        }
    }

    pub fn with_normalizer(db: &'a Database, normalizer: &'a dyn PayloadNormalizer) -> Self {
        Self { db, normalizer }
    }

    /// Store a normalized copy of an ingestion, with audit entry, atomically.
    ///
    /// The ingestion, and the classification when given, are resolved
    /// before the transaction opens.
    ///
    /// # Errors
    ///
    /// [`DbError::ReferenceNotFound`] when either reference is missing;
    /// nothing is written in that case.
    pub async fn create(&self, new: NewStorage) -> Result<StorageRecord, DbError> {
        let mut session = self.db.acquire_session().await?;

        let source = ingestion::fetch(&mut session, new.ingestion_id)
            .await?
            .ok_or_else(|| DbError::reference("ingestion", new.ingestion_id))?;

        if let Some(classification_id) = new.classification_id {
            if !classification::exists(&mut session, classification_id).await? {
                return Err(DbError::reference("classification", classification_id));
            }
        }

        let normalized = self.normalizer.normalize(&source);

        let mut tx = session.begin().await.map_err(DbError::tx(TxStep::Begin))?;

        let outcome = async {
            let record: StorageRecord = sqlx::query_as(&format!(
                r#"
                INSERT INTO storage_records (id, ingestion_id, classification_id, normalized_payload)
                VALUES ($1, $2, $3, $4)
                RETURNING {SELECT_COLUMNS}
                "#
            ))
            .bind(Uuid::new_v4())
            .bind(new.ingestion_id)
            .bind(new.classification_id)
            .bind(sqlx::types::Json(&normalized))
            .fetch_one(&mut *tx)
            .await
            .map_err(DbError::tx(TxStep::Insert))?;

            let entry = NewAuditEntry::system(
                AuditAction::StorageCreated,
                record.id,
                json!({
                    "ingestion_id": record.ingestion_id,
                    "classification_id": record.classification_id,
                }),
            );
            audit::append(&mut tx, &entry)
                .await
                .map_err(DbError::tx(TxStep::Audit))?;

            Ok::<_, DbError>(record)
        }
        .await;

        let record = match outcome {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(error = %err, "storage create rolled back");
                if let Err(e) = tx.rollback().await {
                    tracing::debug!(error = %e, "rollback failed, dropping transaction");
                }
                return Err(err);
            }
        };

        tx.commit().await.map_err(DbError::tx(TxStep::Commit))?;
        tracing::info!(
            storage_id = %record.id,
            ingestion_id = %record.ingestion_id,
            "storage record created"
        );
        Ok(record)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<StorageRecord>, DbError> {
        let mut session = self.db.acquire_session().await?;
        let record = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM storage_records WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *session)
        .await?;

        Ok(record)
    }

    /// Most recent records, newest first.
    pub async fn list(&self, limit: Limit) -> Result<Vec<StorageRecord>, DbError> {
        let mut session = self.db.acquire_session().await?;
        let records = sqlx::query_as(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM storage_records
            ORDER BY created_at DESC, id DESC
            LIMIT $1
            "#
        ))
        .bind(limit.as_i64())
        .fetch_all(&mut *session)
        .await?;

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingestion_with(payload: serde_json::Value) -> IngestionRecord {
        IngestionRecord {
            id: Uuid::new_v4(),
            source: "api".to_string(),
            payload: payload.as_object().cloned().unwrap_or_default(),
            classification: JsonObject::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn passthrough_copies_payload() {
        let ingestion = ingestion_with(json!({"x": 1, "nested": {"y": [true, null]}}));
        assert_eq!(PassthroughNormalizer.normalize(&ingestion), ingestion.payload);
    }

    #[test]
    fn custom_normalizer_is_pluggable() {
        struct KeysOnly;

        impl PayloadNormalizer for KeysOnly {
            fn normalize(&self, ingestion: &IngestionRecord) -> JsonObject {
                ingestion
                    .payload
                    .keys()
                    .map(|k| (k.clone(), serde_json::Value::Bool(true)))
                    .collect()
            }
        }

        let ingestion = ingestion_with(json!({"a": 1, "b": 2}));
        let normalized = KeysOnly.normalize(&ingestion);
        assert_eq!(serde_json::Value::Object(normalized), json!({"a": true, "b": true}));
    }
}
