//! Classification repository
//!
//! Each record classifies one ingestion. The referenced ingestion must
//! exist at write time.

use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use super::audit::{self, AuditAction, NewAuditEntry};
use super::ingestion;
use crate::db::{Database, DbError, TxStep};
use crate::models::{ClassificationLevel, JsonObject, Limit};

/// Classification record from database
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ClassificationRecord {
    pub id: Uuid,
    pub ingestion_id: Uuid,
    pub level: String,
    #[sqlx(json)]
    pub tags: JsonObject,
    pub created_at: DateTime<Utc>,
}

/// Validated input for a new classification
#[derive(Debug, Clone)]
pub struct NewClassification {
    pub ingestion_id: Uuid,
    pub level: ClassificationLevel,
    pub tags: JsonObject,
}

const SELECT_COLUMNS: &str = "id, ingestion_id, level, tags, created_at";

pub(crate) async fn exists(conn: &mut PgConnection, id: Uuid) -> Result<bool, sqlx::Error> {
    let (found,): (bool,) =
        sqlx::query_as("SELECT EXISTS(SELECT 1 FROM classification_records WHERE id = $1)")
            .bind(id)
            .fetch_one(&mut *conn)
            .await?;
    Ok(found)
}

/// Classification repository
pub struct ClassificationRepo<'a> {
    db: &'a Database,
}

impl<'a> ClassificationRepo<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Classify an existing ingestion, with audit entry, atomically.
    ///
    /// # Errors
    ///
    /// [`DbError::ReferenceNotFound`] when the ingestion does not exist;
    /// nothing is written in that case.
    pub async fn create(&self, new: NewClassification) -> Result<ClassificationRecord, DbError> {
        let mut session = self.db.acquire_session().await?;

        if !ingestion::exists(&mut session, new.ingestion_id).await? {
            return Err(DbError::reference("ingestion", new.ingestion_id));
        }

        let mut tx = session.begin().await.map_err(DbError::tx(TxStep::Begin))?;

        let outcome = async {
            let record: ClassificationRecord = sqlx::query_as(&format!(
                r#"
                INSERT INTO classification_records (id, ingestion_id, level, tags)
                VALUES ($1, $2, $3, $4)
                RETURNING {SELECT_COLUMNS}
                "#
            ))
            .bind(Uuid::new_v4())
            .bind(new.ingestion_id)
            .bind(new.level.as_str())
            .bind(sqlx::types::Json(&new.tags))
            .fetch_one(&mut *tx)
            .await
            .map_err(DbError::tx(TxStep::Insert))?;

            let entry = NewAuditEntry::system(
                AuditAction::ClassificationCreated,
                record.id,
                json!({
                    "ingestion_id": record.ingestion_id,
                    "level": record.level,
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
                tracing::warn!(error = %err, "classification create rolled back");
                if let Err(e) = tx.rollback().await {
                    tracing::debug!(error = %e, "rollback failed, dropping transaction");
                }
                return Err(err);
            }
        };

        tx.commit().await.map_err(DbError::tx(TxStep::Commit))?;
        tracing::info!(
            classification_id = %record.id,
            ingestion_id = %record.ingestion_id,
            "classification created"
        );
        Ok(record)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<ClassificationRecord>, DbError> {
        let mut session = self.db.acquire_session().await?;
        let record = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM classification_records WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *session)
        .await?;

        Ok(record)
    }

    /// All classifications of one ingestion, newest first.
    pub async fn list_for_ingestion(
        &self,
        ingestion_id: Uuid,
    ) -> Result<Vec<ClassificationRecord>, DbError> {
        let mut session = self.db.acquire_session().await?;
        let records = sqlx::query_as(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM classification_records
            WHERE ingestion_id = $1
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(ingestion_id)
        .fetch_all(&mut *session)
        .await?;

        Ok(records)
    }

    /// Most recent classifications, newest first.
    pub async fn list(&self, limit: Limit) -> Result<Vec<ClassificationRecord>, DbError> {
        let mut session = self.db.acquire_session().await?;
        let records = sqlx::query_as(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM classification_records
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
