//! Storage endpoints

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::repos::{NewStorage, StorageRecord, StorageRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{JsonBody, ValidLimit, ValidUuid};
use crate::http::server::AppState;
use crate::models::JsonObject;

/// Create storage request
#[derive(Deserialize)]
pub struct CreateStorageRequest {
    pub ingestion_id: Uuid,
    pub classification_id: Option<Uuid>,
}

/// Storage response
#[derive(Debug, Serialize)]
pub struct StorageResponse {
    pub storage_id: Uuid,
    pub ingestion_id: Uuid,
    pub classification_id: Option<Uuid>,
    pub normalized_payload: JsonObject,
    pub created_at: String,
}

impl From<StorageRecord> for StorageResponse {
    fn from(r: StorageRecord) -> Self {
        Self {
            storage_id: r.id,
            ingestion_id: r.ingestion_id,
            classification_id: r.classification_id,
            normalized_payload: r.normalized_payload,
            created_at: r.created_at.to_rfc3339(),
        }
    }
}

fn repo(state: &AppState) -> StorageRepo<'_> {
    StorageRepo::with_normalizer(&state.db, state.normalizer.as_ref())
}

/// POST /storage/storage - 404 when either reference is unresolved
async fn create_storage(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<CreateStorageRequest>,
) -> Result<Json<StorageResponse>, ApiError> {
    let new = NewStorage {
        ingestion_id: req.ingestion_id,
        classification_id: req.classification_id,
    };

    let record = repo(&state).create(new).await?;
    Ok(Json(StorageResponse::from(record)))
}

/// GET /storage/storage/{id}
async fn get_storage(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
) -> Result<Json<StorageResponse>, ApiError> {
    let record = repo(&state)
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound {
            resource: "storage",
            id: id.to_string(),
        })?;

    Ok(Json(StorageResponse::from(record)))
}

/// GET /storage/storage?limit=N
async fn list_storage(
    State(state): State<Arc<AppState>>,
    ValidLimit(limit): ValidLimit,
) -> Result<Json<Vec<StorageResponse>>, ApiError> {
    let records = repo(&state).list(limit).await?;
    Ok(Json(records.into_iter().map(StorageResponse::from).collect()))
}

/// Storage routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/storage/storage", get(list_storage).post(create_storage))
        .route("/storage/storage/{id}", get(get_storage))
}
