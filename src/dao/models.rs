use serde::{Deserialize, Serialize};
use std::{
    fmt,
    str::FromStr,
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::identity::{GuestSlot, Identity, UserId};

/// Error returned when a persisted enum column holds an unknown value.
#[derive(Debug, Clone, Error)]
#[error("unknown {kind} `{value}`")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

/// `at` truncated to the millisecond precision timestamps are stored with.
///
/// Entities built from a clock reading must go through this so the value
/// handed back to callers equals the one read back from the store later.
pub fn stored_instant(at: SystemTime) -> SystemTime {
    match at.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => UNIX_EPOCH + Duration::from_millis(elapsed.as_millis() as u64),
        Err(_) => UNIX_EPOCH,
    }
}

/// Lifecycle status of a game row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Created,
    Starting,
    InProgress,
    Completed,
    Cancelled,
    Expired,
}

impl GameStatus {
    /// Column representation used by the storage layer and the HTTP API.
    pub fn as_str(self) -> &'static str {
        match self {
            GameStatus::Created => "created",
            GameStatus::Starting => "starting",
            GameStatus::InProgress => "in_progress",
            GameStatus::Completed => "completed",
            GameStatus::Cancelled => "cancelled",
            GameStatus::Expired => "expired",
        }
    }

    /// Whether players are currently answering questions.
    pub fn is_playing(self) -> bool {
        matches!(self, GameStatus::Starting | GameStatus::InProgress)
    }

    /// `cancelled` and `expired` never transition again.
    pub fn is_absorbing(self) -> bool {
        matches!(self, GameStatus::Cancelled | GameStatus::Expired)
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameStatus {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "created" => Ok(GameStatus::Created),
            "starting" => Ok(GameStatus::Starting),
            "in_progress" => Ok(GameStatus::InProgress),
            "completed" => Ok(GameStatus::Completed),
            "cancelled" => Ok(GameStatus::Cancelled),
            "expired" => Ok(GameStatus::Expired),
            other => Err(UnknownVariant::new("game status", other)),
        }
    }
}

/// Difficulty tag shared by games, questions and the fallback pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Expert,
}

impl Difficulty {
    /// Every difficulty, in leaderboard order.
    pub const ALL: [Difficulty; 4] = [
        Difficulty::Easy,
        Difficulty::Medium,
        Difficulty::Hard,
        Difficulty::Expert,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
            Difficulty::Expert => "expert",
        }
    }

    /// Points awarded for a correct answer at this difficulty.
    pub fn points(self) -> u32 {
        match self {
            Difficulty::Easy => 10,
            Difficulty::Medium => 20,
            Difficulty::Hard => 30,
            Difficulty::Expert => 40,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            "expert" => Ok(Difficulty::Expert),
            _ => Err(UnknownVariant::new("difficulty", value)),
        }
    }
}

/// Top-level category of the scripture corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Testament {
    Old,
    New,
}

impl Testament {
    pub fn as_str(self) -> &'static str {
        match self {
            Testament::Old => "old",
            Testament::New => "new",
        }
    }

    /// The other half of the corpus.
    pub fn other(self) -> Self {
        match self {
            Testament::Old => Testament::New,
            Testament::New => Testament::Old,
        }
    }
}

impl FromStr for Testament {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "old" => Ok(Testament::Old),
            "new" => Ok(Testament::New),
            other => Err(UnknownVariant::new("testament", other)),
        }
    }
}

/// Provenance of a persisted question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum QuestionSource {
    Generated,
    Pool,
}

impl QuestionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionSource::Generated => "generated",
            QuestionSource::Pool => "pool",
        }
    }
}

impl FromStr for QuestionSource {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "generated" => Ok(QuestionSource::Generated),
            "pool" => Ok(QuestionSource::Pool),
            other => Err(UnknownVariant::new("question source", other)),
        }
    }
}

/// Persisted game row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameEntity {
    /// Primary key of the game.
    pub id: Uuid,
    /// Display name chosen by the creator.
    pub name: String,
    pub difficulty: Difficulty,
    /// Authenticated creator, `None` for games created anonymously.
    pub creator_user_id: Option<UserId>,
    pub max_players: u32,
    pub questions_per_game: u32,
    /// Time budget per question, in seconds.
    pub time_per_question: u32,
    pub status: GameStatus,
    pub created_at: SystemTime,
    pub expires_at: SystemTime,
    pub started_at: Option<SystemTime>,
    pub completed_at: Option<SystemTime>,
}

impl GameEntity {
    /// A game created without an authenticated user is owned by guest slot 0.
    pub fn is_anonymous(&self) -> bool {
        self.creator_user_id.is_none()
    }

    /// Past `expires_at` and not completed.
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        self.status != GameStatus::Completed && now >= self.expires_at
    }
}

/// Game row together with its current participant count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameListItemEntity {
    pub game: GameEntity,
    pub participant_count: u32,
}

/// Persisted participant row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantEntity {
    pub id: Uuid,
    pub game_id: Uuid,
    pub user_id: Option<UserId>,
    pub guest_slot: Option<GuestSlot>,
    pub display_name: String,
    pub is_creator: bool,
    pub score: i64,
    pub correct_answers: u32,
    pub finished_all_questions: bool,
    pub joined_at: SystemTime,
    pub last_activity: SystemTime,
}

impl ParticipantEntity {
    /// Identity this participant answers to.
    ///
    /// Rows always carry exactly one of `user_id` / `guest_slot` (enforced by a
    /// table constraint); the guest branch is the fallback.
    pub fn identity(&self) -> Identity {
        match (self.user_id, self.guest_slot) {
            (Some(user_id), _) => Identity::User(user_id),
            (None, Some(slot)) => Identity::Guest(slot),
            (None, None) => Identity::Guest(GuestSlot::CREATOR),
        }
    }
}

/// Persisted question belonging to one game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionEntity {
    pub id: Uuid,
    pub game_id: Uuid,
    /// Position within the game, 1..=N.
    pub question_number: u32,
    pub question_text: String,
    pub correct_answer: String,
    /// Two to four options, correct answer included, already shuffled.
    pub options: Vec<String>,
    /// Scripture citation the question was derived from; unique per game.
    pub source_reference: String,
    pub book: String,
    pub testament: Testament,
    pub difficulty: Difficulty,
    pub points: u32,
    pub source: QuestionSource,
    pub created_at: SystemTime,
}

/// Persisted answer of one participant to one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerEntity {
    pub id: Uuid,
    pub game_id: Uuid,
    pub participant_id: Uuid,
    pub question_id: Uuid,
    pub selected_answer: String,
    /// Computed against the stored correct answer when the answer was written.
    pub is_correct: bool,
    pub time_taken_ms: u64,
    pub points_awarded: u32,
    pub answered_at: SystemTime,
}

/// Global usage record of a scripture reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageRecordEntity {
    pub reference: String,
    pub last_used: SystemTime,
    pub frequency: u32,
}

/// Pre-populated question used when generation is unavailable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolQuestionEntity {
    pub question_text: String,
    pub correct_answer: String,
    pub incorrect_answers: Vec<String>,
    pub source_reference: String,
    pub book: String,
    pub testament: Testament,
    pub difficulty: Difficulty,
}

/// Final standing of a participant, written once when a game completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntryEntity {
    pub id: Uuid,
    pub game_id: Uuid,
    pub game_name: String,
    pub difficulty: Difficulty,
    pub player_name: String,
    pub user_id: Option<UserId>,
    pub score: i64,
    pub correct_answers: u32,
    pub total_questions: u32,
    pub completed_at: SystemTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_column_text() {
        for status in [
            GameStatus::Created,
            GameStatus::Starting,
            GameStatus::InProgress,
            GameStatus::Completed,
            GameStatus::Cancelled,
            GameStatus::Expired,
        ] {
            assert_eq!(status.as_str().parse::<GameStatus>().unwrap(), status);
        }
        assert!("paused".parse::<GameStatus>().is_err());
    }

    #[test]
    fn difficulty_parsing_is_case_insensitive() {
        assert_eq!("Hard".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert!("legendary".parse::<Difficulty>().is_err());
    }

    #[test]
    fn completed_games_never_count_as_expired() {
        let now = SystemTime::now();
        let mut game = GameEntity {
            id: Uuid::new_v4(),
            name: "Quiz".into(),
            difficulty: Difficulty::Easy,
            creator_user_id: None,
            max_players: 1,
            questions_per_game: 5,
            time_per_question: 30,
            status: GameStatus::InProgress,
            created_at: now,
            expires_at: now,
            started_at: None,
            completed_at: None,
        };
        assert!(game.is_expired_at(now));
        game.status = GameStatus::Completed;
        assert!(!game.is_expired_at(now));
    }
}
