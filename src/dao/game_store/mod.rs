#[cfg(test)]
pub(crate) mod fixtures;
pub mod sqlite;

use std::time::SystemTime;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::{
    dao::{
        models::{
            AnswerEntity, Difficulty, GameEntity, GameListItemEntity, GameStatus,
            LeaderboardEntryEntity, ParticipantEntity, PoolQuestionEntity, QuestionEntity,
            UsageRecordEntity,
        },
        storage::StorageResult,
    },
    state::{
        identity::{Identity, Joiner},
        state_machine::Deadlock,
    },
};

/// Result of an admission attempt, decided inside one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined(ParticipantEntity),
    /// The identity already had a participant row; it is returned unchanged.
    AlreadyJoined(ParticipantEntity),
    Full { capacity: u32 },
    /// The game no longer admits players.
    NotJoinable(GameStatus),
    /// The game was past `expires_at`; it has been marked expired.
    Expired,
    GameMissing,
}

/// Result of removing a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The anonymous creator left: the game and all of its children are gone.
    GameDeleted,
    Removed { game_cancelled: bool },
    NotParticipant,
    GameMissing,
}

/// Answer write request.
#[derive(Debug, Clone)]
pub struct AnswerSubmission {
    pub game_id: Uuid,
    pub identity: Identity,
    pub question_id: Uuid,
    pub selected_answer: String,
    pub time_taken_ms: u64,
    pub answered_at: SystemTime,
}

/// Result of an answer write, decided inside one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerOutcome {
    Recorded {
        answer: AnswerEntity,
        participant: ParticipantEntity,
    },
    /// The participant had already answered this question; nothing changed.
    Duplicate(AnswerEntity),
    NotParticipant,
    QuestionMissing,
    InvalidOption,
    NotAnswerable(GameStatus),
    GameMissing,
}

/// Evaluated inside the completion transaction when not every participant
/// has finished; `Some` completes the game anyway.
pub type DeadlockRule =
    Box<dyn FnOnce(&GameEntity, &[ParticipantEntity]) -> Option<Deadlock> + Send>;

/// State of a game after a completion check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    /// The game as left by the transaction.
    pub game: GameEntity,
    pub participants: Vec<ParticipantEntity>,
    /// Set when the rule fired for a game that was still being played.
    pub deadlock: Option<Deadlock>,
    /// This call performed the `completed` transition.
    pub completed_by_this_call: bool,
}

/// Result of [`GameStore::settle_game`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettleOutcome {
    Settled(Settlement),
    NotParticipant,
    GameMissing,
}

/// Abstraction over the relational persistence layer.
///
/// Every method is a single atomic unit against the backing store, so
/// concurrent request handlers never observe or produce half-applied changes.
pub trait GameStore: Send + Sync {
    /// Insert a game together with its creator participant.
    fn create_game(
        &self,
        game: GameEntity,
        creator: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    fn list_games(
        &self,
        status: Option<GameStatus>,
    ) -> BoxFuture<'static, StorageResult<Vec<GameListItemEntity>>>;
    fn list_participants(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>>;
    fn find_participant(
        &self,
        game_id: Uuid,
        identity: Identity,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>>;
    fn join_game(
        &self,
        game_id: Uuid,
        joiner: Joiner,
        display_name: String,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<JoinOutcome>>;
    fn leave_game(
        &self,
        game_id: Uuid,
        identity: Identity,
    ) -> BoxFuture<'static, StorageResult<LeaveOutcome>>;

    /// Insert questions, skipping any whose number or reference is already
    /// taken in the game. Returns how many rows were written.
    fn insert_questions(
        &self,
        game_id: Uuid,
        questions: Vec<QuestionEntity>,
    ) -> BoxFuture<'static, StorageResult<usize>>;
    fn list_questions(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>>;

    /// `created -> starting`, only when the persisted question count equals
    /// `questions_per_game`. Returns whether this call moved the game.
    fn mark_starting(&self, game_id: Uuid, now: SystemTime)
    -> BoxFuture<'static, StorageResult<bool>>;
    /// `starting -> in_progress`. Returns whether this call moved the game.
    fn mark_in_progress(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    /// Mark a non-completed, non-absorbing game as expired.
    fn mark_expired(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;

    fn record_answer(
        &self,
        submission: AnswerSubmission,
    ) -> BoxFuture<'static, StorageResult<AnswerOutcome>>;
    fn list_answers(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<AnswerEntity>>>;

    /// Flag a participant as finished (idempotent). `None` when the identity
    /// has no participant row in the game.
    fn mark_finished(
        &self,
        game_id: Uuid,
        identity: Identity,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>>;
    /// Conditional `starting|in_progress -> completed`. When this call performs
    /// the transition it also writes the leaderboard entries, and returns `true`.
    fn complete_game(&self, game_id: Uuid, now: SystemTime)
    -> BoxFuture<'static, StorageResult<bool>>;

    /// One completion check: optionally flag `finisher` as finished, then
    /// complete the game if everybody has finished or `deadlock` fires.
    fn settle_game(
        &self,
        game_id: Uuid,
        finisher: Option<Identity>,
        now: SystemTime,
        deadlock: DeadlockRule,
    ) -> BoxFuture<'static, StorageResult<SettleOutcome>>;

    /// Games past `expires_at`, or completed before `completed_before`.
    fn find_cleanup_candidates(
        &self,
        now: SystemTime,
        completed_before: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>>;
    /// Delete games by id, cascading to their children. Returns rows deleted.
    fn delete_games(&self, ids: Vec<Uuid>) -> BoxFuture<'static, StorageResult<u64>>;

    fn load_usage(
        &self,
        since: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Vec<UsageRecordEntity>>>;
    /// Upsert a usage record, bumping its frequency and last-use timestamp.
    fn record_usage(
        &self,
        reference: String,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn purge_usage(&self, before: SystemTime) -> BoxFuture<'static, StorageResult<u64>>;

    fn list_pool(
        &self,
        difficulty: Difficulty,
    ) -> BoxFuture<'static, StorageResult<Vec<PoolQuestionEntity>>>;
    /// Insert pool questions not already present. Returns rows written.
    fn seed_pool(
        &self,
        questions: Vec<PoolQuestionEntity>,
    ) -> BoxFuture<'static, StorageResult<usize>>;

    /// Best entries per difficulty, highest score first.
    fn leaderboard(
        &self,
        per_difficulty: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<LeaderboardEntryEntity>>>;

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
