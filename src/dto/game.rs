use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{
        AnswerEntity, Difficulty, GameEntity, GameListItemEntity, GameStatus, ParticipantEntity,
        QuestionEntity,
    },
    dto::format_system_time,
};

fn default_time_per_question() -> u32 {
    30
}

/// Payload used to open a new game.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub difficulty: Difficulty,
    #[validate(range(min = 1, max = 20))]
    pub max_players: u32,
    #[validate(range(min = 1, max = 30))]
    pub questions_per_game: u32,
    /// Seconds allowed per question.
    #[serde(default = "default_time_per_question")]
    #[validate(range(min = 5, max = 300))]
    pub time_per_question: u32,
    /// Display name of the creator.
    #[validate(length(min = 1, max = 50))]
    pub player_name: String,
}

/// Filter accepted by the game listing.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListGamesQuery {
    /// Only return games in this status.
    pub status: Option<GameStatus>,
}

/// Authenticated join; the display name falls back to the `x-user-name` header.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 50))]
    pub player_name: Option<String>,
}

/// Anonymous join.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct JoinGuestRequest {
    #[validate(length(min = 1, max = 50))]
    pub player_name: String,
    /// Slot returned by an earlier join; re-joining with it is idempotent.
    #[serde(default)]
    pub guest_id: Option<u32>,
}

/// Body of guest-capable endpoints; `guestId` is ignored for authenticated callers.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GuestRequest {
    #[serde(default)]
    pub guest_id: Option<u32>,
}

/// Body of `start-guest`.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartGuestRequest {
    pub guest_id: u32,
}

/// Answer submitted by an authenticated participant.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    #[validate(length(min = 1, max = 500))]
    pub selected_answer: String,
    /// Seconds spent on the question.
    #[serde(default)]
    #[validate(range(min = 0.0, max = 3600.0))]
    pub time_taken: f64,
}

/// Answer submitted by a guest.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AnswerGuestRequest {
    #[validate(length(min = 1, max = 500))]
    pub selected_answer: String,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 3600.0))]
    pub time_taken: f64,
    pub guest_id: u32,
}

/// Public view of a game row.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameView {
    pub id: Uuid,
    pub name: String,
    pub difficulty: Difficulty,
    pub creator_user_id: Option<i64>,
    pub is_anonymous: bool,
    pub max_players: u32,
    pub questions_per_game: u32,
    pub time_per_question: u32,
    pub status: GameStatus,
    pub created_at: String,
    pub expires_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

impl From<&GameEntity> for GameView {
    fn from(game: &GameEntity) -> Self {
        Self {
            id: game.id,
            name: game.name.clone(),
            difficulty: game.difficulty,
            creator_user_id: game.creator_user_id.map(|id| id.0),
            is_anonymous: game.is_anonymous(),
            max_players: game.max_players,
            questions_per_game: game.questions_per_game,
            time_per_question: game.time_per_question,
            status: game.status,
            created_at: format_system_time(game.created_at),
            expires_at: format_system_time(game.expires_at),
            started_at: game.started_at.map(format_system_time),
            completed_at: game.completed_at.map(format_system_time),
        }
    }
}

/// Game row in listings.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameListEntry {
    #[serde(flatten)]
    pub game: GameView,
    pub participant_count: u32,
}

impl From<&GameListItemEntity> for GameListEntry {
    fn from(item: &GameListItemEntity) -> Self {
        Self {
            game: GameView::from(&item.game),
            participant_count: item.participant_count,
        }
    }
}

/// Public view of a participant.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantView {
    pub id: Uuid,
    pub user_id: Option<i64>,
    /// Guest slot; `0` is the anonymous creator.
    pub guest_id: Option<u32>,
    pub display_name: String,
    pub is_creator: bool,
    pub score: i64,
    pub correct_answers: u32,
    pub finished_all_questions: bool,
    pub joined_at: String,
    pub last_activity: String,
}

impl From<&ParticipantEntity> for ParticipantView {
    fn from(participant: &ParticipantEntity) -> Self {
        Self {
            id: participant.id,
            user_id: participant.user_id.map(|id| id.0),
            guest_id: participant.guest_slot.map(|slot| slot.value()),
            display_name: participant.display_name.clone(),
            is_creator: participant.is_creator,
            score: participant.score,
            correct_answers: participant.correct_answers,
            finished_all_questions: participant.finished_all_questions,
            joined_at: format_system_time(participant.joined_at),
            last_activity: format_system_time(participant.last_activity),
        }
    }
}

/// Question as shown to players; the correct answer is withheld.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub id: Uuid,
    pub question_number: u32,
    pub question_text: String,
    pub options: Vec<String>,
    pub source_reference: String,
    pub difficulty: Difficulty,
    pub points: u32,
}

impl From<&QuestionEntity> for QuestionView {
    fn from(question: &QuestionEntity) -> Self {
        Self {
            id: question.id,
            question_number: question.question_number,
            question_text: question.question_text.clone(),
            options: question.options.clone(),
            source_reference: question.source_reference.clone(),
            difficulty: question.difficulty,
            points: question.points,
        }
    }
}

/// Stored answer.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnswerView {
    pub id: Uuid,
    pub question_id: Uuid,
    pub participant_id: Uuid,
    pub selected_answer: String,
    pub is_correct: bool,
    pub points_awarded: u32,
    /// Seconds spent on the question.
    pub time_taken: f64,
    pub answered_at: String,
}

impl From<&AnswerEntity> for AnswerView {
    fn from(answer: &AnswerEntity) -> Self {
        Self {
            id: answer.id,
            question_id: answer.question_id,
            participant_id: answer.participant_id,
            selected_answer: answer.selected_answer.clone(),
            is_correct: answer.is_correct,
            points_awarded: answer.points_awarded,
            time_taken: answer.time_taken_ms as f64 / 1000.0,
            answered_at: format_system_time(answer.answered_at),
        }
    }
}

/// Game together with its participants.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameDetailsResponse {
    pub success: bool,
    pub game: GameView,
    pub participants: Vec<ParticipantView>,
}

impl GameDetailsResponse {
    pub fn new(game: &GameEntity, participants: &[ParticipantEntity]) -> Self {
        Self {
            success: true,
            game: game.into(),
            participants: participants.iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GameListResponse {
    pub success: bool,
    pub games: Vec<GameListEntry>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub success: bool,
    pub participant: ParticipantView,
    /// The caller already had a seat; nothing was changed.
    pub already_joined: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub success: bool,
    pub game: GameView,
    pub question_count: u32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct QuestionsResponse {
    pub success: bool,
    pub questions: Vec<QuestionView>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AnswerResponse {
    pub success: bool,
    pub answer: AnswerView,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaveResponse {
    pub success: bool,
    /// The anonymous creator left and the game was removed.
    pub game_deleted: bool,
    /// The last participant left and the game was cancelled.
    pub game_cancelled: bool,
}

/// Provisioning progress as polled by waiting players.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressView {
    pub total: u32,
    pub generated: u32,
    pub status: GameStatus,
    pub is_ready: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProgressResponse {
    pub success: bool,
    pub progress: ProgressView,
}

/// Standing of one participant.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResultEntry {
    pub rank: u32,
    pub participant: ParticipantView,
    pub answered: u32,
    pub total_questions: u32,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResultsResponse {
    pub success: bool,
    pub status: GameStatus,
    pub results: Vec<ResultEntry>,
}
