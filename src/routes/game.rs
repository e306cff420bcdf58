use std::time::SystemTime;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        game::{
            AnswerGuestRequest, AnswerRequest, AnswerResponse, CreateGameRequest,
            GameDetailsResponse, GameListResponse, GuestRequest, JoinGuestRequest, JoinRequest,
            JoinResponse, LeaveResponse, ListGamesQuery, ProgressResponse, QuestionsResponse,
            ResultsResponse, StartGuestRequest, StartResponse,
        },
        leaderboard::LeaderboardResponse,
    },
    error::AppError,
    routes::caller::Caller,
    services::game_service,
    state::{
        SharedState,
        identity::{GuestSlot, Identity, Joiner},
    },
};

/// Game lifecycle routes: creation, admission, start-up, answers and results.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/bible-games", get(list_games))
        .route("/bible-games/create", post(create_game))
        .route("/bible-games/leaderboard", get(leaderboard))
        .route("/bible-games/{id}", get(get_game))
        .route("/bible-games/{id}/join", post(join_game))
        .route("/bible-games/{id}/join-guest", post(join_game_guest))
        .route("/bible-games/{id}/start", post(start_game))
        .route("/bible-games/{id}/start-guest", post(start_game_guest))
        .route("/bible-games/{id}/leave", post(leave_game))
        .route("/bible-games/{id}/questions", get(list_questions))
        .route(
            "/bible-games/{id}/questions/{question_id}/answer",
            post(submit_answer),
        )
        .route(
            "/bible-games/{id}/questions/{question_id}/answer-guest",
            post(submit_answer_guest),
        )
        .route("/bible-games/{id}/progress", get(progress))
        .route("/bible-games/{id}/results", get(results))
}

/// Open a new game; the caller becomes its creator.
#[utoipa::path(
    post,
    path = "/bible-games/create",
    tag = "games",
    params(("x-user-id" = Option<i64>, Header, description = "Authenticated user; omit to create anonymously")),
    request_body = CreateGameRequest,
    responses(
        (status = 200, description = "Game created", body = GameDetailsResponse),
        (status = 400, description = "Invalid payload")
    )
)]
pub async fn create_game(
    State(state): State<SharedState>,
    caller: Caller,
    Json(payload): Json<CreateGameRequest>,
) -> Result<Json<GameDetailsResponse>, AppError> {
    payload.validate()?;
    let created =
        game_service::create_game(&state, caller.user, payload, SystemTime::now()).await?;
    Ok(Json(created))
}

/// List games, optionally filtered by status.
#[utoipa::path(
    get,
    path = "/bible-games",
    tag = "games",
    params(ListGamesQuery),
    responses((status = 200, description = "Games", body = GameListResponse))
)]
pub async fn list_games(
    State(state): State<SharedState>,
    Query(query): Query<ListGamesQuery>,
) -> Result<Json<GameListResponse>, AppError> {
    Ok(Json(game_service::list_games(&state, query.status).await?))
}

/// Retrieve a game with its participants.
#[utoipa::path(
    get,
    path = "/bible-games/{id}",
    tag = "games",
    params(("id" = Uuid, Path, description = "Game identifier")),
    responses(
        (status = 200, description = "Game", body = GameDetailsResponse),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn get_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<GameDetailsResponse>, AppError> {
    Ok(Json(game_service::get_game(&state, id).await?))
}

/// Join as an authenticated user. Joining twice returns the same seat.
#[utoipa::path(
    post,
    path = "/bible-games/{id}/join",
    tag = "games",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("x-user-id" = i64, Header, description = "Authenticated user")
    ),
    request_body = JoinRequest,
    responses(
        (status = 200, description = "Seat taken", body = JoinResponse),
        (status = 400, description = "Game full"),
        (status = 403, description = "Anonymous caller"),
        (status = 409, description = "Game no longer accepts players")
    )
)]
pub async fn join_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    caller: Caller,
    payload: Option<Json<JoinRequest>>,
) -> Result<Json<JoinResponse>, AppError> {
    let user = caller.require_user()?;
    let Json(payload) = payload.unwrap_or_default();
    payload.validate()?;
    let name = payload
        .player_name
        .or(caller.name)
        .unwrap_or_else(|| format!("Player {}", user.0));
    let joined =
        game_service::join_game(&state, id, Joiner::User(user), &name, SystemTime::now()).await?;
    Ok(Json(joined))
}

/// Join anonymously and receive a guest slot.
#[utoipa::path(
    post,
    path = "/bible-games/{id}/join-guest",
    tag = "games",
    params(("id" = Uuid, Path, description = "Game identifier")),
    request_body = JoinGuestRequest,
    responses(
        (status = 200, description = "Seat taken", body = JoinResponse),
        (status = 400, description = "Game full or invalid payload"),
        (status = 409, description = "Game no longer accepts players")
    )
)]
pub async fn join_game_guest(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<JoinGuestRequest>,
) -> Result<Json<JoinResponse>, AppError> {
    payload.validate()?;
    let joiner = Joiner::Guest {
        requested: payload.guest_id.map(GuestSlot::new),
    };
    let joined =
        game_service::join_game(&state, id, joiner, &payload.player_name, SystemTime::now())
            .await?;
    Ok(Json(joined))
}

/// Start the game as its authenticated creator.
#[utoipa::path(
    post,
    path = "/bible-games/{id}/start",
    tag = "games",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("x-user-id" = i64, Header, description = "Authenticated user")
    ),
    responses(
        (status = 200, description = "Questions provisioned", body = StartResponse),
        (status = 403, description = "Caller is not the creator"),
        (status = 409, description = "Game already started or expired"),
        (status = 500, description = "Not enough questions available")
    )
)]
pub async fn start_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    caller: Caller,
) -> Result<Json<StartResponse>, AppError> {
    let user = caller.require_user()?;
    let started =
        game_service::start_game(&state, id, Identity::User(user), SystemTime::now()).await?;
    Ok(Json(started))
}

/// Start the game as its anonymous creator (`guestId` 0).
#[utoipa::path(
    post,
    path = "/bible-games/{id}/start-guest",
    tag = "games",
    params(("id" = Uuid, Path, description = "Game identifier")),
    request_body = StartGuestRequest,
    responses(
        (status = 200, description = "Questions provisioned", body = StartResponse),
        (status = 403, description = "Caller is not the creator"),
        (status = 409, description = "Game already started or expired"),
        (status = 500, description = "Not enough questions available")
    )
)]
pub async fn start_game_guest(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StartGuestRequest>,
) -> Result<Json<StartResponse>, AppError> {
    let identity = Identity::Guest(GuestSlot::new(payload.guest_id));
    let started = game_service::start_game(&state, id, identity, SystemTime::now()).await?;
    Ok(Json(started))
}

/// Leave a game. The anonymous creator leaving deletes it.
#[utoipa::path(
    post,
    path = "/bible-games/{id}/leave",
    tag = "games",
    params(("id" = Uuid, Path, description = "Game identifier")),
    request_body = GuestRequest,
    responses(
        (status = 200, description = "Participant removed", body = LeaveResponse),
        (status = 403, description = "Caller is not a participant"),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn leave_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    caller: Caller,
    payload: Option<Json<GuestRequest>>,
) -> Result<Json<LeaveResponse>, AppError> {
    let Json(payload) = payload.unwrap_or_default();
    let identity = caller.identity(payload.guest_id)?;
    Ok(Json(game_service::leave_game(&state, id, identity).await?))
}

/// Questions of a game, correct answers withheld.
#[utoipa::path(
    get,
    path = "/bible-games/{id}/questions",
    tag = "games",
    params(("id" = Uuid, Path, description = "Game identifier")),
    responses(
        (status = 200, description = "Questions in order", body = QuestionsResponse),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn list_questions(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<QuestionsResponse>, AppError> {
    Ok(Json(game_service::list_questions(&state, id).await?))
}

/// Answer a question as an authenticated participant.
#[utoipa::path(
    post,
    path = "/bible-games/{id}/questions/{question_id}/answer",
    tag = "games",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("question_id" = Uuid, Path, description = "Question identifier"),
        ("x-user-id" = i64, Header, description = "Authenticated user")
    ),
    request_body = AnswerRequest,
    responses(
        (status = 200, description = "Answer stored", body = AnswerResponse),
        (status = 400, description = "Invalid option"),
        (status = 403, description = "Caller is not a participant"),
        (status = 409, description = "Game is not being played")
    )
)]
pub async fn submit_answer(
    State(state): State<SharedState>,
    Path((id, question_id)): Path<(Uuid, Uuid)>,
    caller: Caller,
    Json(payload): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, AppError> {
    let user = caller.require_user()?;
    payload.validate()?;
    let answer = game_service::submit_answer(
        &state,
        id,
        question_id,
        Identity::User(user),
        payload.selected_answer,
        payload.time_taken,
        SystemTime::now(),
    )
    .await?;
    Ok(Json(answer))
}

/// Answer a question as a guest.
#[utoipa::path(
    post,
    path = "/bible-games/{id}/questions/{question_id}/answer-guest",
    tag = "games",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("question_id" = Uuid, Path, description = "Question identifier")
    ),
    request_body = AnswerGuestRequest,
    responses(
        (status = 200, description = "Answer stored", body = AnswerResponse),
        (status = 400, description = "Invalid option"),
        (status = 403, description = "Caller is not a participant"),
        (status = 409, description = "Game is not being played")
    )
)]
pub async fn submit_answer_guest(
    State(state): State<SharedState>,
    Path((id, question_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<AnswerGuestRequest>,
) -> Result<Json<AnswerResponse>, AppError> {
    payload.validate()?;
    let answer = game_service::submit_answer(
        &state,
        id,
        question_id,
        Identity::Guest(GuestSlot::new(payload.guest_id)),
        payload.selected_answer,
        payload.time_taken,
        SystemTime::now(),
    )
    .await?;
    Ok(Json(answer))
}

/// Provisioning progress, polled while the game is starting.
#[utoipa::path(
    get,
    path = "/bible-games/{id}/progress",
    tag = "games",
    params(("id" = Uuid, Path, description = "Game identifier")),
    responses(
        (status = 200, description = "Progress", body = ProgressResponse),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn progress(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProgressResponse>, AppError> {
    Ok(Json(game_service::progress(&state, id).await?))
}

/// Ranked participants.
#[utoipa::path(
    get,
    path = "/bible-games/{id}/results",
    tag = "games",
    params(("id" = Uuid, Path, description = "Game identifier")),
    responses(
        (status = 200, description = "Results", body = ResultsResponse),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn results(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ResultsResponse>, AppError> {
    Ok(Json(game_service::results(&state, id).await?))
}

/// Best scores of completed games per difficulty.
#[utoipa::path(
    get,
    path = "/bible-games/leaderboard",
    tag = "games",
    responses((status = 200, description = "Leaderboard", body = LeaderboardResponse))
)]
pub async fn leaderboard(
    State(state): State<SharedState>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    Ok(Json(game_service::leaderboard(&state).await?))
}
