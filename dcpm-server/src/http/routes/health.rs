//! Service banner and health check endpoints

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

use crate::db::check_health;
use crate::http::server::AppState;

/// Service name reported by the banner
pub const SERVICE_NAME: &str = "DCPM Core API";

/// GET / response
#[derive(Serialize)]
pub struct BannerResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub status: &'static str,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub version: &'static str,
}

/// GET /
async fn banner() -> Json<BannerResponse> {
    Json(BannerResponse {
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        status: "running",
    })
}

/// GET /health - 503 when the database cannot be reached
async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    if check_health(&state.db).await {
        (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                database: "reachable",
                version: env!("CARGO_PKG_VERSION"),
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "error",
                database: "unreachable",
                version: env!("CARGO_PKG_VERSION"),
            }),
        )
    }
}

/// Banner and health routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(banner))
        .route("/health", get(health))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn banner_reports_running() {
        let Json(body) = banner().await;
        assert_eq!(body.service, "DCPM Core API");
        assert_eq!(body.status, "running");
    }
}
