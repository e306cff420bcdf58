use std::time::SystemTime;

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::{
        completion::{FinishStatusResponse, FinishedPlayersResponse, ParticipantResponse},
        game::GuestRequest,
    },
    error::AppError,
    routes::caller::Caller,
    services::completion_service,
    state::SharedState,
};

/// Completion protocol routes.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/bible-games/{id}/set-finished", post(set_finished))
        .route("/bible-games/{id}/register-finished", post(register_finished))
        .route("/bible-games/{id}/check-finished", get(check_finished))
        .route("/bible-games/{id}/finished-players", get(finished_players))
        .route("/bible-games/{id}/force-complete", post(force_complete))
}

/// Flag the caller as having answered every question.
#[utoipa::path(
    post,
    path = "/bible-games/{id}/set-finished",
    tag = "completion",
    params(("id" = Uuid, Path, description = "Game identifier")),
    request_body = GuestRequest,
    responses(
        (status = 200, description = "Participant flagged", body = ParticipantResponse),
        (status = 403, description = "Caller is not a participant")
    )
)]
pub async fn set_finished(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    caller: Caller,
    payload: Option<Json<GuestRequest>>,
) -> Result<Json<ParticipantResponse>, AppError> {
    let Json(payload) = payload.unwrap_or_default();
    let identity = caller.identity(payload.guest_id)?;
    let flagged =
        completion_service::set_finished(&state, id, identity, SystemTime::now()).await?;
    Ok(Json(flagged))
}

/// Flag the caller as finished and run the completion check.
#[utoipa::path(
    post,
    path = "/bible-games/{id}/register-finished",
    tag = "completion",
    params(("id" = Uuid, Path, description = "Game identifier")),
    request_body = GuestRequest,
    responses(
        (status = 200, description = "Finish status", body = FinishStatusResponse),
        (status = 403, description = "Caller is not a participant")
    )
)]
pub async fn register_finished(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    caller: Caller,
    payload: Option<Json<GuestRequest>>,
) -> Result<Json<FinishStatusResponse>, AppError> {
    let Json(payload) = payload.unwrap_or_default();
    let identity = caller.identity(payload.guest_id)?;
    let status =
        completion_service::register_finished(&state, id, identity, SystemTime::now()).await?;
    Ok(Json(status))
}

/// Who has finished; completes the game when everyone has or it is deadlocked.
#[utoipa::path(
    get,
    path = "/bible-games/{id}/check-finished",
    tag = "completion",
    params(("id" = Uuid, Path, description = "Game identifier")),
    responses(
        (status = 200, description = "Finish status", body = FinishStatusResponse),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn check_finished(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<FinishStatusResponse>, AppError> {
    let status = completion_service::check_finished(&state, id, SystemTime::now()).await?;
    Ok(Json(status))
}

/// Participants that have finished.
#[utoipa::path(
    get,
    path = "/bible-games/{id}/finished-players",
    tag = "completion",
    params(("id" = Uuid, Path, description = "Game identifier")),
    responses(
        (status = 200, description = "Finished participants", body = FinishedPlayersResponse),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn finished_players(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<FinishedPlayersResponse>, AppError> {
    Ok(Json(
        completion_service::list_finished_players(&state, id).await?,
    ))
}

/// Complete the game now, whoever has finished.
#[utoipa::path(
    post,
    path = "/bible-games/{id}/force-complete",
    tag = "completion",
    params(("id" = Uuid, Path, description = "Game identifier")),
    request_body = GuestRequest,
    responses(
        (status = 200, description = "Game completed", body = FinishStatusResponse),
        (status = 403, description = "Caller is not a participant"),
        (status = 409, description = "Game is not being played")
    )
)]
pub async fn force_complete(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    caller: Caller,
    payload: Option<Json<GuestRequest>>,
) -> Result<Json<FinishStatusResponse>, AppError> {
    let Json(payload) = payload.unwrap_or_default();
    let identity = caller.identity(payload.guest_id)?;
    let status =
        completion_service::force_complete(&state, id, identity, SystemTime::now()).await?;
    Ok(Json(status))
}
