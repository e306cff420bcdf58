use std::time::SystemTime;

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};

use crate::{
    dto::cleanup::{CleanupResponse, CleanupStatusResponse},
    error::AppError,
    services::expiration_service,
    state::SharedState,
};

/// On-demand reclamation routes.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/bible-games/cleanup-expired", post(cleanup_expired))
        .route("/bible-games/cleanup-status", get(cleanup_status))
}

/// Delete expired games and completed games past their grace period.
#[utoipa::path(
    post,
    path = "/bible-games/cleanup-expired",
    tag = "maintenance",
    responses((status = 200, description = "Games deleted", body = CleanupResponse))
)]
pub async fn cleanup_expired(
    State(state): State<SharedState>,
) -> Result<Json<CleanupResponse>, AppError> {
    let swept = expiration_service::cleanup_expired(&state, SystemTime::now()).await?;
    Ok(Json(swept))
}

/// List what the next cleanup would delete, and why.
#[utoipa::path(
    get,
    path = "/bible-games/cleanup-status",
    tag = "maintenance",
    responses((status = 200, description = "Deletion candidates", body = CleanupStatusResponse))
)]
pub async fn cleanup_status(
    State(state): State<SharedState>,
) -> Result<Json<CleanupStatusResponse>, AppError> {
    let status = expiration_service::cleanup_status(&state, SystemTime::now()).await?;
    Ok(Json(status))
}
