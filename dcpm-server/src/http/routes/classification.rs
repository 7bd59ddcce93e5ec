//! Classification endpoints

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::repos::{ClassificationRecord, ClassificationRepo, NewClassification};
use crate::http::error::ApiError;
use crate::http::extractors::{JsonBody, ValidLimit, ValidUuid};
use crate::http::server::AppState;
use crate::models::{ClassificationLevel, JsonObject};

/// Create classification request
#[derive(Deserialize)]
pub struct CreateClassificationRequest {
    pub ingestion_id: Uuid,
    pub level: String,
    #[serde(default)]
    pub tags: JsonObject,
}

/// Classification response
#[derive(Debug, Serialize)]
pub struct ClassificationResponse {
    pub classification_id: Uuid,
    pub ingestion_id: Uuid,
    pub level: String,
    pub tags: JsonObject,
    pub created_at: String,
}

impl From<ClassificationRecord> for ClassificationResponse {
    fn from(r: ClassificationRecord) -> Self {
        Self {
            classification_id: r.id,
            ingestion_id: r.ingestion_id,
            level: r.level,
            tags: r.tags,
            created_at: r.created_at.to_rfc3339(),
        }
    }
}

/// POST /classification/classification - 404 when the ingestion is unknown
async fn create_classification(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<CreateClassificationRequest>,
) -> Result<Json<ClassificationResponse>, ApiError> {
    let new = NewClassification {
        ingestion_id: req.ingestion_id,
        level: ClassificationLevel::new(&req.level)?,
        tags: req.tags,
    };

    let record = ClassificationRepo::new(&state.db).create(new).await?;
    Ok(Json(ClassificationResponse::from(record)))
}

/// GET /classification/classification/{ingestion_id}
async fn list_for_ingestion(
    State(state): State<Arc<AppState>>,
    ValidUuid(ingestion_id): ValidUuid,
) -> Result<Json<Vec<ClassificationResponse>>, ApiError> {
    let records = ClassificationRepo::new(&state.db)
        .list_for_ingestion(ingestion_id)
        .await?;
    Ok(Json(records.into_iter().map(ClassificationResponse::from).collect()))
}

/// GET /classification/classification?limit=N
async fn list_classifications(
    State(state): State<Arc<AppState>>,
    ValidLimit(limit): ValidLimit,
) -> Result<Json<Vec<ClassificationResponse>>, ApiError> {
    let records = ClassificationRepo::new(&state.db).list(limit).await?;
    Ok(Json(records.into_iter().map(ClassificationResponse::from).collect()))
}

/// Classification routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/classification/classification",
            get(list_classifications).post(create_classification),
        )
        .route(
            "/classification/classification/{ingestion_id}",
            get(list_for_ingestion),
        )
}
