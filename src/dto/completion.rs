use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::{GameStatus, ParticipantEntity},
    dto::game::ParticipantView,
};

/// Participant that reported having answered every question.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinishedPlayer {
    pub id: Uuid,
    pub display_name: String,
    pub score: i64,
    pub correct_answers: u32,
}

impl From<&ParticipantEntity> for FinishedPlayer {
    fn from(participant: &ParticipantEntity) -> Self {
        Self {
            id: participant.id,
            display_name: participant.display_name.clone(),
            score: participant.score,
            correct_answers: participant.correct_answers,
        }
    }
}

/// Outcome of a completion check.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinishStatusResponse {
    pub success: bool,
    pub status: GameStatus,
    pub all_finished: bool,
    pub finished_count: u32,
    pub total_players: u32,
    pub finished_players: Vec<FinishedPlayer>,
    /// The game was completed without every participant finishing.
    pub force_completed: bool,
    /// Abandoned participants were detected on this check.
    pub deadlock_detected: bool,
    /// This request performed the transition to `completed`.
    pub completed_by_this_call: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ParticipantResponse {
    pub success: bool,
    pub participant: ParticipantView,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinishedPlayersResponse {
    pub success: bool,
    pub finished_players: Vec<FinishedPlayer>,
}
