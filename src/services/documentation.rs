use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the Bible games backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::game::create_game,
        crate::routes::game::list_games,
        crate::routes::game::get_game,
        crate::routes::game::join_game,
        crate::routes::game::join_game_guest,
        crate::routes::game::start_game,
        crate::routes::game::start_game_guest,
        crate::routes::game::leave_game,
        crate::routes::game::list_questions,
        crate::routes::game::submit_answer,
        crate::routes::game::submit_answer_guest,
        crate::routes::game::progress,
        crate::routes::game::results,
        crate::routes::game::leaderboard,
        crate::routes::completion::set_finished,
        crate::routes::completion::register_finished,
        crate::routes::completion::check_finished,
        crate::routes::completion::finished_players,
        crate::routes::completion::force_complete,
        crate::routes::cleanup::cleanup_expired,
        crate::routes::cleanup::cleanup_status,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::game::CreateGameRequest,
            crate::dto::game::JoinRequest,
            crate::dto::game::JoinGuestRequest,
            crate::dto::game::GuestRequest,
            crate::dto::game::StartGuestRequest,
            crate::dto::game::AnswerRequest,
            crate::dto::game::AnswerGuestRequest,
            crate::dto::game::GameDetailsResponse,
            crate::dto::game::GameListResponse,
            crate::dto::game::JoinResponse,
            crate::dto::game::StartResponse,
            crate::dto::game::QuestionsResponse,
            crate::dto::game::AnswerResponse,
            crate::dto::game::LeaveResponse,
            crate::dto::game::ProgressResponse,
            crate::dto::game::ResultsResponse,
            crate::dto::completion::FinishStatusResponse,
            crate::dto::completion::FinishedPlayersResponse,
            crate::dto::completion::ParticipantResponse,
            crate::dto::cleanup::CleanupResponse,
            crate::dto::cleanup::CleanupStatusResponse,
            crate::dto::leaderboard::LeaderboardResponse,
            crate::dao::models::GameStatus,
            crate::dao::models::Difficulty,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "games", description = "Game lifecycle: creation, admission, start-up and answers"),
        (name = "completion", description = "Completion and deadlock detection"),
        (name = "maintenance", description = "Expired game reclamation"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_game_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/bible-games/create",
            "/bible-games/{id}/start-guest",
            "/bible-games/{id}/check-finished",
            "/bible-games/cleanup-status",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
