/// Health check endpoint
///
/// ```text
/// GET /api/health
/// ```
///
/// Always answers 200; a database outage shows up as `"database": "disconnected"`.

use crate::{app::AppState, error::ApiResult, response::ApiResponse};
use axum::extract::State;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub version: String,
}

pub async fn health_check(State(state): State<AppState>) -> ApiResult<HealthResponse> {
    let database = match fintrack_shared::db::pool::health_check(&state.db).await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            "disconnected"
        }
    };

    Ok(ApiResponse::success(HealthResponse {
        status: "ok".to_string(),
        database: database.to_string(),
        version: fintrack_shared::VERSION.to_string(),
    }))
}
