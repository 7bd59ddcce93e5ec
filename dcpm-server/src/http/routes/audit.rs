//! Audit trail read endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::db::repos::{AuditLogEntry, AuditRepo, EntityType};
use crate::http::error::ApiError;
use crate::http::extractors::ValidLimit;
use crate::http::server::AppState;

/// Audit entry response
#[derive(Debug, Serialize)]
pub struct AuditEntryResponse {
    pub audit_id: Uuid,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub actor: Option<Value>,
    pub metadata: Option<Value>,
    pub created_at: String,
}

impl From<AuditLogEntry> for AuditEntryResponse {
    fn from(e: AuditLogEntry) -> Self {
        Self {
            audit_id: e.id,
            action: e.action,
            entity_type: e.entity_type,
            entity_id: e.entity_id,
            actor: e.actor,
            metadata: e.metadata,
            created_at: e.created_at.to_rfc3339(),
        }
    }
}

/// GET /audit?limit=N
async fn list_audit(
    State(state): State<Arc<AppState>>,
    ValidLimit(limit): ValidLimit,
) -> Result<Json<Vec<AuditEntryResponse>>, ApiError> {
    let entries = AuditRepo::new(&state.db).list(limit).await?;
    Ok(Json(entries.into_iter().map(AuditEntryResponse::from).collect()))
}

/// GET /audit/{entity_type}/{entity_id}
async fn entity_history(
    State(state): State<Arc<AppState>>,
    Path((entity_type, entity_id)): Path<(String, String)>,
) -> Result<Json<Vec<AuditEntryResponse>>, ApiError> {
    let entity_type: EntityType = entity_type.parse()?;
    let entries = AuditRepo::new(&state.db)
        .list_for_entity(entity_type, &entity_id)
        .await?;
    Ok(Json(entries.into_iter().map(AuditEntryResponse::from).collect()))
}

/// Audit routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/audit", get(list_audit))
        .route("/audit/{entity_type}/{entity_id}", get(entity_history))
}
