//! Ingestion repository
//!
//! Raw records as received from callers. Created once, never updated.

use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use super::audit::{self, AuditAction, NewAuditEntry};
use crate::db::{Database, DbError, TxStep};
use crate::models::{JsonObject, Limit, SourceTag};

/// Ingestion record from database
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct IngestionRecord {
    pub id: Uuid,
    pub source: String,
    #[sqlx(json)]
    pub payload: JsonObject,
    #[sqlx(json)]
    pub classification: JsonObject,
    pub created_at: DateTime<Utc>,
}

/// Validated input for a new ingestion record
#[derive(Debug, Clone)]
pub struct NewIngestion {
    pub source: SourceTag,
    pub payload: JsonObject,
    pub classification: JsonObject,
}

const SELECT_COLUMNS: &str = "id, source, payload, classification, created_at";

/// Whether an ingestion record with this id exists.
pub(crate) async fn exists(conn: &mut PgConnection, id: Uuid) -> Result<bool, sqlx::Error> {
    let (found,): (bool,) =
        sqlx::query_as("SELECT EXISTS(SELECT 1 FROM ingestion_records WHERE id = $1)")
            .bind(id)
            .fetch_one(&mut *conn)
            .await?;
    Ok(found)
}

/// Look up one record on an already acquired connection.
pub(crate) async fn fetch(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<Option<IngestionRecord>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {SELECT_COLUMNS} FROM ingestion_records WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
}

/// Ingestion repository
pub struct IngestionRepo<'a> {
    db: &'a Database,
}

impl<'a> IngestionRepo<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Insert a record and its `INGESTION_CREATED` audit entry atomically.
    pub async fn create(&self, new: NewIngestion) -> Result<IngestionRecord, DbError> {
        let mut session = self.db.acquire_session().await?;
        let mut tx = session.begin().await.map_err(DbError::tx(TxStep::Begin))?;

        let outcome = async {
            let record: IngestionRecord = sqlx::query_as(&format!(
                r#"
                INSERT INTO ingestion_records (id, source, payload, classification)
                VALUES ($1, $2, $3, $4)
                RETURNING {SELECT_COLUMNS}
                "#
            ))
            .bind(Uuid::new_v4())
            .bind(new.source.as_str())
            .bind(sqlx::types::Json(&new.payload))
            .bind(sqlx::types::Json(&new.classification))
            .fetch_one(&mut *tx)
            .await
            .map_err(DbError::tx(TxStep::Insert))?;

            let entry = NewAuditEntry::system(
                AuditAction::IngestionCreated,
                record.id,
                json!({
                    "ingestion_id": record.id,
                    "source": record.source,
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
                tracing::warn!(error = %err, "ingestion create rolled back");
                if let Err(e) = tx.rollback().await {
                    tracing::debug!(error = %e, "rollback failed, dropping transaction");
                }
                return Err(err);
            }
        };

        tx.commit().await.map_err(DbError::tx(TxStep::Commit))?;
        tracing::info!(ingestion_id = %record.id, source = %record.source, "ingestion created");
        Ok(record)
    }

    /// Get a single record by id. `None` when absent.
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<IngestionRecord>, DbError> {
        let mut session = self.db.acquire_session().await?;
        Ok(fetch(&mut session, id).await?)
    }

    /// Most recent records, newest first.
    pub async fn list(&self, limit: Limit) -> Result<Vec<IngestionRecord>, DbError> {
        let mut session = self.db.acquire_session().await?;
        let records = sqlx::query_as(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM ingestion_records
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
