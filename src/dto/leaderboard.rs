use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{dao::models::LeaderboardEntryEntity, dto::format_system_time};

/// One finished player's standing.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub game_id: Uuid,
    pub game_name: String,
    pub player_name: String,
    pub user_id: Option<i64>,
    pub score: i64,
    pub correct_answers: u32,
    pub total_questions: u32,
    pub completed_at: String,
}

impl From<&LeaderboardEntryEntity> for LeaderboardEntry {
    fn from(entry: &LeaderboardEntryEntity) -> Self {
        Self {
            game_id: entry.game_id,
            game_name: entry.game_name.clone(),
            player_name: entry.player_name.clone(),
            user_id: entry.user_id.map(|id| id.0),
            score: entry.score,
            correct_answers: entry.correct_answers,
            total_questions: entry.total_questions,
            completed_at: format_system_time(entry.completed_at),
        }
    }
}

/// Best scores grouped by difficulty.
#[derive(Debug, Default, Serialize, ToSchema)]
pub struct LeaderboardView {
    pub easy: Vec<LeaderboardEntry>,
    pub medium: Vec<LeaderboardEntry>,
    pub hard: Vec<LeaderboardEntry>,
    pub expert: Vec<LeaderboardEntry>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardResponse {
    pub success: bool,
    pub leaderboard: LeaderboardView,
}
