//! Ingestion endpoints

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::repos::{IngestionRecord, IngestionRepo, NewIngestion};
use crate::http::error::ApiError;
use crate::http::extractors::{JsonBody, ValidLimit, ValidUuid};
use crate::http::server::AppState;
use crate::models::{JsonObject, SourceTag};

/// Create ingestion request
#[derive(Deserialize)]
pub struct CreateIngestionRequest {
    pub source: String,
    pub payload: JsonObject,
    pub classification: JsonObject,
}

/// Ingestion response
#[derive(Debug, Serialize)]
pub struct IngestionResponse {
    pub ingestion_id: Uuid,
    pub source: String,
    pub payload: JsonObject,
    pub classification: JsonObject,
    pub created_at: String,
}

impl From<IngestionRecord> for IngestionResponse {
    fn from(r: IngestionRecord) -> Self {
        Self {
            ingestion_id: r.id,
            source: r.source,
            payload: r.payload,
            classification: r.classification,
            created_at: r.created_at.to_rfc3339(),
        }
    }
}

/// POST /ingestion
async fn create_ingestion(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<CreateIngestionRequest>,
) -> Result<(StatusCode, Json<IngestionResponse>), ApiError> {
    let new = NewIngestion {
        source: SourceTag::new(&req.source)?,
        payload: req.payload,
        classification: req.classification,
    };

    let record = IngestionRepo::new(&state.db).create(new).await?;
    Ok((StatusCode::CREATED, Json(IngestionResponse::from(record))))
}

/// GET /ingestion/{id}
async fn get_ingestion(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
) -> Result<Json<IngestionResponse>, ApiError> {
    let record = IngestionRepo::new(&state.db)
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound {
            resource: "ingestion",
            id: id.to_string(),
        })?;

    Ok(Json(IngestionResponse::from(record)))
}

/// GET /ingestion?limit=N
async fn list_ingestions(
    State(state): State<Arc<AppState>>,
    ValidLimit(limit): ValidLimit,
) -> Result<Json<Vec<IngestionResponse>>, ApiError> {
    let records = IngestionRepo::new(&state.db).list(limit).await?;
    Ok(Json(records.into_iter().map(IngestionResponse::from).collect()))
}

/// Ingestion routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ingestion", get(list_ingestions).post(create_ingestion))
        .route("/ingestion/{id}", get(get_ingestion))
}
