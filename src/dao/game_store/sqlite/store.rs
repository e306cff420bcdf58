use std::{
    sync::{Arc, Mutex},
    time::SystemTime,
};

use futures::future::BoxFuture;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::{
        game_store::{
            AnswerOutcome, AnswerSubmission, DeadlockRule, GameStore, JoinOutcome, LeaveOutcome,
            SettleOutcome, Settlement,
        },
        models::{
            AnswerEntity, Difficulty, GameEntity, GameListItemEntity, GameStatus,
            LeaderboardEntryEntity, ParticipantEntity, PoolQuestionEntity, QuestionEntity,
            UsageRecordEntity, stored_instant,
        },
        storage::StorageResult,
    },
    state::{
        identity::{GuestSlot, Identity, Joiner},
        state_machine::GameEvent,
    },
};

use super::{
    config::SqliteConfig,
    error::{SqliteDaoError, SqliteResult},
    migrations::run_migrations,
    rows::{
        ANSWER_COLUMNS, GAME_COLUMNS, LEADERBOARD_COLUMNS, PARTICIPANT_COLUMNS, POOL_COLUMNS,
        QUESTION_COLUMNS, answer_from_row, encode_list, game_from_row, leaderboard_from_row,
        participant_from_row, pool_from_row, question_from_row, to_millis, usage_from_row,
    },
};

/// [`GameStore`] backed by a single SQLite connection.
///
/// Statements run on the blocking thread pool; every trait method opens one
/// `IMMEDIATE` transaction so the write lock is taken before the first read.
#[derive(Clone)]
pub struct SqliteGameStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteGameStore {
    /// Open (or create) the database and bring its schema up to date.
    pub fn open(config: SqliteConfig) -> SqliteResult<Self> {
        let conn = match &config {
            SqliteConfig::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(|source| {
                        SqliteDaoError::PrepareDirectory {
                            path: parent.to_path_buf(),
                            source,
                        }
                    })?;
                }
                let conn = Connection::open(path).map_err(|source| SqliteDaoError::Open {
                    path: path.display().to_string(),
                    source,
                })?;
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                    row.get::<_, String>(0)
                })
                .map_err(|source| SqliteDaoError::Open {
                    path: path.display().to_string(),
                    source,
                })?;
                conn
            }
            SqliteConfig::InMemory => {
                Connection::open_in_memory().map_err(|source| SqliteDaoError::Open {
                    path: ":memory:".to_owned(),
                    source,
                })?
            }
        };

        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
            .map_err(|source| SqliteDaoError::Query {
                operation: "configure connection",
                source,
            })?;
        run_migrations(&conn)?;

        info!(database = ?config, "SQLite game store ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Fresh private database; each call gets its own.
    pub fn open_in_memory() -> SqliteResult<Self> {
        Self::open(SqliteConfig::InMemory)
    }

    async fn with_conn<T, F>(&self, operation: &'static str, work: F) -> SqliteResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| SqliteDaoError::Poisoned)?;
            work(&mut guard).map_err(|source| SqliteDaoError::Query { operation, source })
        })
        .await
        .map_err(|source| SqliteDaoError::Worker { operation, source })?
    }

    /// Run `work` inside one `IMMEDIATE` transaction, committing on success.
    async fn in_transaction<T, F>(&self, operation: &'static str, work: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        self.with_conn(operation, move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let value = work(&tx)?;
            tx.commit()?;
            Ok(value)
        })
        .await
        .map_err(Into::into)
    }
}

fn select_game(conn: &Connection, id: Uuid) -> rusqlite::Result<Option<GameEntity>> {
    conn.query_row(
        &format!("SELECT {GAME_COLUMNS} FROM games WHERE id = ?1"),
        params![id.to_string()],
        game_from_row,
    )
    .optional()
}

fn select_participant(
    conn: &Connection,
    game_id: Uuid,
    identity: Identity,
) -> rusqlite::Result<Option<ParticipantEntity>> {
    let (column, value) = match identity {
        Identity::User(user_id) => ("user_id", user_id.0),
        Identity::Guest(slot) => ("guest_slot", i64::from(slot.value())),
    };
    conn.query_row(
        &format!("SELECT {PARTICIPANT_COLUMNS} FROM participants WHERE game_id = ?1 AND {column} = ?2"),
        params![game_id.to_string(), value],
        participant_from_row,
    )
    .optional()
}

fn select_participant_by_id(conn: &Connection, id: Uuid) -> rusqlite::Result<ParticipantEntity> {
    conn.query_row(
        &format!("SELECT {PARTICIPANT_COLUMNS} FROM participants WHERE id = ?1"),
        params![id.to_string()],
        participant_from_row,
    )
}

fn select_participants(conn: &Connection, game_id: Uuid) -> rusqlite::Result<Vec<ParticipantEntity>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PARTICIPANT_COLUMNS} FROM participants WHERE game_id = ?1 \
         ORDER BY is_creator DESC, joined_at ASC, id ASC"
    ))?;
    let rows = stmt.query_map(params![game_id.to_string()], participant_from_row)?;
    rows.collect()
}

fn count_participants(conn: &Connection, game_id: Uuid) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT COUNT(*) FROM participants WHERE game_id = ?1",
        params![game_id.to_string()],
        |row| row.get(0),
    )
}

fn count_questions(conn: &Connection, game_id: Uuid) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT COUNT(*) FROM questions WHERE game_id = ?1",
        params![game_id.to_string()],
        |row| row.get(0),
    )
}

fn insert_participant(conn: &Connection, participant: &ParticipantEntity) -> rusqlite::Result<()> {
    conn.execute(
        &format!("INSERT INTO participants ({PARTICIPANT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"),
        params![
            participant.id.to_string(),
            participant.game_id.to_string(),
            participant.user_id.map(|id| id.0),
            participant.guest_slot.map(GuestSlot::value),
            participant.display_name,
            participant.is_creator,
            participant.score,
            participant.correct_answers,
            participant.finished_all_questions,
            to_millis(participant.joined_at),
            to_millis(participant.last_activity),
        ],
    )?;
    Ok(())
}

fn next_guest_slot(conn: &Connection, game_id: Uuid) -> rusqlite::Result<GuestSlot> {
    let highest: Option<u32> = conn.query_row(
        "SELECT MAX(guest_slot) FROM participants WHERE game_id = ?1",
        params![game_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(highest
        .map(|slot| GuestSlot::new(slot).next())
        .unwrap_or_else(GuestSlot::first_joiner))
}

/// Status update guarded by the statuses `event` may leave from.
fn transition(conn: &Connection, game_id: Uuid, event: GameEvent) -> rusqlite::Result<bool> {
    let allowed = event
        .sources()
        .iter()
        .map(|status| format!("'{}'", status.as_str()))
        .collect::<Vec<_>>()
        .join(", ");
    let changed = conn.execute(
        &format!("UPDATE games SET status = ?1 WHERE id = ?2 AND status IN ({allowed})"),
        params![event.target().as_str(), game_id.to_string()],
    )?;
    Ok(changed == 1)
}

fn expire(conn: &Connection, game_id: Uuid) -> rusqlite::Result<bool> {
    transition(conn, game_id, GameEvent::Expire)
}

fn join(
    conn: &Connection,
    game_id: Uuid,
    joiner: Joiner,
    display_name: String,
    now: SystemTime,
) -> rusqlite::Result<JoinOutcome> {
    let now = stored_instant(now);
    let Some(game) = select_game(conn, game_id)? else {
        return Ok(JoinOutcome::GameMissing);
    };

    let existing = match joiner {
        Joiner::User(user_id) => select_participant(conn, game_id, Identity::User(user_id))?,
        Joiner::Guest {
            requested: Some(slot),
        } => select_participant(conn, game_id, Identity::Guest(slot))?,
        Joiner::Guest { requested: None } => None,
    };
    if let Some(participant) = existing {
        return Ok(JoinOutcome::AlreadyJoined(participant));
    }

    if game.status == GameStatus::Created && game.is_expired_at(now) {
        expire(conn, game_id)?;
        return Ok(JoinOutcome::Expired);
    }
    if game.status != GameStatus::Created {
        return Ok(JoinOutcome::NotJoinable(game.status));
    }
    if count_participants(conn, game_id)? >= game.max_players {
        return Ok(JoinOutcome::Full {
            capacity: game.max_players,
        });
    }

    let (user_id, guest_slot) = match joiner {
        Joiner::User(user_id) => (Some(user_id), None),
        Joiner::Guest { .. } => (None, Some(next_guest_slot(conn, game_id)?)),
    };
    let participant = ParticipantEntity {
        id: Uuid::new_v4(),
        game_id,
        user_id,
        guest_slot,
        display_name,
        is_creator: false,
        score: 0,
        correct_answers: 0,
        finished_all_questions: false,
        joined_at: now,
        last_activity: now,
    };
    insert_participant(conn, &participant)?;
    Ok(JoinOutcome::Joined(participant))
}

fn leave(conn: &Connection, game_id: Uuid, identity: Identity) -> rusqlite::Result<LeaveOutcome> {
    let Some(game) = select_game(conn, game_id)? else {
        return Ok(LeaveOutcome::GameMissing);
    };
    let Some(participant) = select_participant(conn, game_id, identity)? else {
        return Ok(LeaveOutcome::NotParticipant);
    };

    if game.is_anonymous() && participant.is_creator {
        conn.execute("DELETE FROM games WHERE id = ?1", params![game_id.to_string()])?;
        return Ok(LeaveOutcome::GameDeleted);
    }

    conn.execute(
        "DELETE FROM participants WHERE id = ?1",
        params![participant.id.to_string()],
    )?;
    let game_cancelled = count_participants(conn, game_id)? == 0
        && transition(conn, game_id, GameEvent::Cancel)?;
    Ok(LeaveOutcome::Removed { game_cancelled })
}

fn insert_question(conn: &Connection, question: &QuestionEntity) -> rusqlite::Result<usize> {
    conn.execute(
        &format!("INSERT OR IGNORE INTO questions ({QUESTION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"),
        params![
            question.id.to_string(),
            question.game_id.to_string(),
            question.question_number,
            question.question_text,
            question.correct_answer,
            encode_list(&question.options),
            question.source_reference,
            question.book,
            question.testament.as_str(),
            question.difficulty.as_str(),
            question.points,
            question.source.as_str(),
            to_millis(question.created_at),
        ],
    )
}

fn select_answer(
    conn: &Connection,
    participant_id: Uuid,
    question_id: Uuid,
) -> rusqlite::Result<Option<AnswerEntity>> {
    conn.query_row(
        &format!("SELECT {ANSWER_COLUMNS} FROM answers WHERE participant_id = ?1 AND question_id = ?2"),
        params![participant_id.to_string(), question_id.to_string()],
        answer_from_row,
    )
    .optional()
}

fn record_answer(conn: &Connection, submission: AnswerSubmission) -> rusqlite::Result<AnswerOutcome> {
    let AnswerSubmission {
        game_id,
        identity,
        question_id,
        selected_answer,
        time_taken_ms,
        answered_at,
    } = submission;
    let answered_at = stored_instant(answered_at);

    let Some(game) = select_game(conn, game_id)? else {
        return Ok(AnswerOutcome::GameMissing);
    };
    if !game.status.is_playing() {
        return Ok(AnswerOutcome::NotAnswerable(game.status));
    }
    let Some(participant) = select_participant(conn, game_id, identity)? else {
        return Ok(AnswerOutcome::NotParticipant);
    };
    let question = conn
        .query_row(
            &format!("SELECT {QUESTION_COLUMNS} FROM questions WHERE id = ?1 AND game_id = ?2"),
            params![question_id.to_string(), game_id.to_string()],
            question_from_row,
        )
        .optional()?;
    let Some(question) = question else {
        return Ok(AnswerOutcome::QuestionMissing);
    };
    if !question.options.iter().any(|option| *option == selected_answer) {
        return Ok(AnswerOutcome::InvalidOption);
    }
    if let Some(existing) = select_answer(conn, participant.id, question_id)? {
        return Ok(AnswerOutcome::Duplicate(existing));
    }

    let is_correct = selected_answer == question.correct_answer;
    let answer = AnswerEntity {
        id: Uuid::new_v4(),
        game_id,
        participant_id: participant.id,
        question_id,
        selected_answer,
        is_correct,
        time_taken_ms,
        points_awarded: if is_correct { question.points } else { 0 },
        answered_at,
    };
    conn.execute(
        &format!("INSERT INTO answers ({ANSWER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
        params![
            answer.id.to_string(),
            game_id.to_string(),
            participant.id.to_string(),
            question_id.to_string(),
            answer.selected_answer,
            answer.is_correct,
            i64::try_from(answer.time_taken_ms).unwrap_or(i64::MAX),
            answer.points_awarded,
            to_millis(answered_at),
        ],
    )?;
    conn.execute(
        "UPDATE participants SET score = score + ?1, correct_answers = correct_answers + ?2, \
         last_activity = ?3 WHERE id = ?4",
        params![
            answer.points_awarded,
            u32::from(is_correct),
            to_millis(answered_at),
            participant.id.to_string(),
        ],
    )?;
    if game.status == GameStatus::Starting {
        transition(conn, game_id, GameEvent::ItemsReady)?;
    }

    let participant = select_participant_by_id(conn, participant.id)?;
    Ok(AnswerOutcome::Recorded {
        answer,
        participant,
    })
}

fn complete(conn: &Connection, game_id: Uuid, now: SystemTime) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE games SET status = ?1, completed_at = ?2 \
         WHERE id = ?3 AND status IN ('starting', 'in_progress')",
        params![
            GameStatus::Completed.as_str(),
            to_millis(now),
            game_id.to_string()
        ],
    )?;
    if changed != 1 {
        return Ok(false);
    }

    let Some(game) = select_game(conn, game_id)? else {
        return Ok(false);
    };
    for participant in select_participants(conn, game_id)? {
        conn.execute(
            &format!("INSERT INTO leaderboard_entries ({LEADERBOARD_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"),
            params![
                Uuid::new_v4().to_string(),
                game_id.to_string(),
                game.name,
                game.difficulty.as_str(),
                participant.display_name,
                participant.user_id.map(|id| id.0),
                participant.score,
                participant.correct_answers,
                game.questions_per_game,
                to_millis(now),
            ],
        )?;
    }
    Ok(true)
}

fn mark_participant_finished(
    conn: &Connection,
    participant_id: Uuid,
    now: SystemTime,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE participants SET finished_all_questions = 1, last_activity = ?1 WHERE id = ?2",
        params![to_millis(now), participant_id.to_string()],
    )?;
    Ok(())
}

fn settle(
    conn: &Connection,
    game_id: Uuid,
    finisher: Option<Identity>,
    now: SystemTime,
    deadlock: DeadlockRule,
) -> rusqlite::Result<SettleOutcome> {
    let Some(game) = select_game(conn, game_id)? else {
        return Ok(SettleOutcome::GameMissing);
    };
    if let Some(identity) = finisher {
        let Some(participant) = select_participant(conn, game_id, identity)? else {
            return Ok(SettleOutcome::NotParticipant);
        };
        mark_participant_finished(conn, participant.id, now)?;
    }

    let participants = select_participants(conn, game_id)?;
    let all_finished =
        !participants.is_empty() && participants.iter().all(|p| p.finished_all_questions);
    let mut fired = None;
    let mut completed_by_this_call = false;
    if game.status.is_playing() {
        if !all_finished {
            fired = deadlock(&game, &participants);
        }
        if all_finished || fired.is_some() {
            completed_by_this_call = complete(conn, game_id, now)?;
        }
    }

    let game = select_game(conn, game_id)?.unwrap_or(game);
    Ok(SettleOutcome::Settled(Settlement {
        game,
        participants,
        deadlock: fired,
        completed_by_this_call,
    }))
}

impl GameStore for SqliteGameStore {
    fn create_game(
        &self,
        game: GameEntity,
        creator: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .in_transaction("create_game", move |conn| {
                    conn.execute(
                        &format!("INSERT INTO games ({GAME_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"),
                        params![
                            game.id.to_string(),
                            game.name,
                            game.difficulty.as_str(),
                            game.creator_user_id.map(|id| id.0),
                            game.max_players,
                            game.questions_per_game,
                            game.time_per_question,
                            game.status.as_str(),
                            to_millis(game.created_at),
                            to_millis(game.expires_at),
                            game.started_at.map(to_millis),
                            game.completed_at.map(to_millis),
                        ],
                    )?;
                    insert_participant(conn, &creator)
                })
                .await
        })
    }

    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .in_transaction("find_game", move |conn| select_game(conn, id))
                .await
        })
    }

    fn list_games(
        &self,
        status: Option<GameStatus>,
    ) -> BoxFuture<'static, StorageResult<Vec<GameListItemEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .in_transaction("list_games", move |conn| {
                    let columns = GAME_COLUMNS
                        .split(", ")
                        .map(|column| format!("g.{}", column.trim()))
                        .collect::<Vec<_>>()
                        .join(", ");
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {columns}, \
                         (SELECT COUNT(*) FROM participants p WHERE p.game_id = g.id) \
                         FROM games g WHERE (?1 IS NULL OR g.status = ?1) \
                         ORDER BY g.created_at DESC"
                    ))?;
                    let rows = stmt.query_map(params![status.map(GameStatus::as_str)], |row| {
                        Ok(GameListItemEntity {
                            game: game_from_row(row)?,
                            participant_count: row.get(12)?,
                        })
                    })?;
                    rows.collect()
                })
                .await
        })
    }

    fn list_participants(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .in_transaction("list_participants", move |conn| {
                    select_participants(conn, game_id)
                })
                .await
        })
    }

    fn find_participant(
        &self,
        game_id: Uuid,
        identity: Identity,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .in_transaction("find_participant", move |conn| {
                    select_participant(conn, game_id, identity)
                })
                .await
        })
    }

    fn join_game(
        &self,
        game_id: Uuid,
        joiner: Joiner,
        display_name: String,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<JoinOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .in_transaction("join_game", move |conn| {
                    join(conn, game_id, joiner, display_name, now)
                })
                .await
        })
    }

    fn leave_game(
        &self,
        game_id: Uuid,
        identity: Identity,
    ) -> BoxFuture<'static, StorageResult<LeaveOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .in_transaction("leave_game", move |conn| leave(conn, game_id, identity))
                .await
        })
    }

    fn insert_questions(
        &self,
        game_id: Uuid,
        questions: Vec<QuestionEntity>,
    ) -> BoxFuture<'static, StorageResult<usize>> {
        let store = self.clone();
        Box::pin(async move {
            let written = store
                .in_transaction("insert_questions", move |conn| {
                    let mut written = 0;
                    for question in questions.iter().filter(|q| q.game_id == game_id) {
                        written += insert_question(conn, question)?;
                    }
                    Ok(written)
                })
                .await?;
            debug!(game_id = %game_id, written, "questions flushed");
            Ok(written)
        })
    }

    fn list_questions(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .in_transaction("list_questions", move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {QUESTION_COLUMNS} FROM questions WHERE game_id = ?1 \
                         ORDER BY question_number ASC"
                    ))?;
                    let rows = stmt.query_map(params![game_id.to_string()], question_from_row)?;
                    rows.collect()
                })
                .await
        })
    }

    fn mark_starting(
        &self,
        game_id: Uuid,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .in_transaction("mark_starting", move |conn| {
                    let changed = conn.execute(
                        "UPDATE games SET status = 'starting', started_at = ?1 \
                         WHERE id = ?2 AND status = 'created' \
                         AND questions_per_game = \
                             (SELECT COUNT(*) FROM questions WHERE game_id = ?2)",
                        params![to_millis(now), game_id.to_string()],
                    )?;
                    Ok(changed == 1)
                })
                .await
        })
    }

    fn mark_in_progress(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .in_transaction("mark_in_progress", move |conn| {
                    let Some(game) = select_game(conn, game_id)? else {
                        return Ok(false);
                    };
                    if count_questions(conn, game_id)? < game.questions_per_game {
                        return Ok(false);
                    }
                    transition(conn, game_id, GameEvent::ItemsReady)
                })
                .await
        })
    }

    fn mark_expired(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .in_transaction("mark_expired", move |conn| expire(conn, game_id))
                .await
        })
    }

    fn record_answer(
        &self,
        submission: AnswerSubmission,
    ) -> BoxFuture<'static, StorageResult<AnswerOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .in_transaction("record_answer", move |conn| record_answer(conn, submission))
                .await
        })
    }

    fn list_answers(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<AnswerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .in_transaction("list_answers", move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {ANSWER_COLUMNS} FROM answers WHERE game_id = ?1 \
                         ORDER BY answered_at ASC"
                    ))?;
                    let rows = stmt.query_map(params![game_id.to_string()], answer_from_row)?;
                    rows.collect()
                })
                .await
        })
    }

    fn mark_finished(
        &self,
        game_id: Uuid,
        identity: Identity,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .in_transaction("mark_finished", move |conn| {
                    let Some(participant) = select_participant(conn, game_id, identity)? else {
                        return Ok(None);
                    };
                    mark_participant_finished(conn, participant.id, now)?;
                    select_participant_by_id(conn, participant.id).map(Some)
                })
                .await
        })
    }

    fn complete_game(
        &self,
        game_id: Uuid,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .in_transaction("complete_game", move |conn| complete(conn, game_id, now))
                .await
        })
    }

    fn settle_game(
        &self,
        game_id: Uuid,
        finisher: Option<Identity>,
        now: SystemTime,
        deadlock: DeadlockRule,
    ) -> BoxFuture<'static, StorageResult<SettleOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .in_transaction("settle_game", move |conn| {
                    settle(conn, game_id, finisher, now, deadlock)
                })
                .await
        })
    }

    fn find_cleanup_candidates(
        &self,
        now: SystemTime,
        completed_before: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .in_transaction("find_cleanup_candidates", move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {GAME_COLUMNS} FROM games \
                         WHERE expires_at < ?1 \
                            OR (completed_at IS NOT NULL AND completed_at < ?2) \
                         ORDER BY expires_at ASC"
                    ))?;
                    let rows = stmt.query_map(
                        params![to_millis(now), to_millis(completed_before)],
                        game_from_row,
                    )?;
                    rows.collect()
                })
                .await
        })
    }

    fn delete_games(&self, ids: Vec<Uuid>) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .in_transaction("delete_games", move |conn| {
                    let mut deleted = 0u64;
                    let mut stmt = conn.prepare("DELETE FROM games WHERE id = ?1")?;
                    for id in ids {
                        deleted += stmt.execute(params![id.to_string()])? as u64;
                    }
                    Ok(deleted)
                })
                .await
        })
    }

    fn load_usage(
        &self,
        since: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Vec<UsageRecordEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .in_transaction("load_usage", move |conn| {
                    let mut stmt = conn.prepare(
                        "SELECT reference, last_used, frequency FROM verse_usage \
                         WHERE last_used >= ?1",
                    )?;
                    let rows = stmt.query_map(params![to_millis(since)], usage_from_row)?;
                    rows.collect()
                })
                .await
        })
    }

    fn record_usage(
        &self,
        reference: String,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .in_transaction("record_usage", move |conn| {
                    conn.execute(
                        "INSERT INTO verse_usage (reference, last_used, frequency) \
                         VALUES (?1, ?2, 1) \
                         ON CONFLICT(reference) DO UPDATE SET \
                            last_used = excluded.last_used, frequency = frequency + 1",
                        params![reference, to_millis(now)],
                    )?;
                    Ok(())
                })
                .await
        })
    }

    fn purge_usage(&self, before: SystemTime) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .in_transaction("purge_usage", move |conn| {
                    let purged = conn.execute(
                        "DELETE FROM verse_usage WHERE last_used < ?1",
                        params![to_millis(before)],
                    )?;
                    Ok(purged as u64)
                })
                .await
        })
    }

    fn list_pool(
        &self,
        difficulty: Difficulty,
    ) -> BoxFuture<'static, StorageResult<Vec<PoolQuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .in_transaction("list_pool", move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {POOL_COLUMNS} FROM question_pool WHERE difficulty = ?1 ORDER BY id"
                    ))?;
                    let rows = stmt.query_map(params![difficulty.as_str()], pool_from_row)?;
                    rows.collect()
                })
                .await
        })
    }

    fn seed_pool(
        &self,
        questions: Vec<PoolQuestionEntity>,
    ) -> BoxFuture<'static, StorageResult<usize>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .in_transaction("seed_pool", move |conn| {
                    let mut written = 0;
                    let mut stmt = conn.prepare(&format!(
                        "INSERT OR IGNORE INTO question_pool ({POOL_COLUMNS}) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
                    ))?;
                    for question in &questions {
                        written += stmt.execute(params![
                            question.question_text,
                            question.correct_answer,
                            encode_list(&question.incorrect_answers),
                            question.source_reference,
                            question.book,
                            question.testament.as_str(),
                            question.difficulty.as_str(),
                        ])?;
                    }
                    Ok(written)
                })
                .await
        })
    }

    fn leaderboard(
        &self,
        per_difficulty: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<LeaderboardEntryEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .in_transaction("leaderboard", move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {LEADERBOARD_COLUMNS} FROM leaderboard_entries \
                         WHERE difficulty = ?1 \
                         ORDER BY score DESC, correct_answers DESC, completed_at ASC LIMIT ?2"
                    ))?;
                    let mut entries = Vec::new();
                    for difficulty in Difficulty::ALL {
                        let rows = stmt.query_map(
                            params![difficulty.as_str(), per_difficulty],
                            leaderboard_from_row,
                        )?;
                        for row in rows {
                            entries.push(row?);
                        }
                    }
                    Ok(entries)
                })
                .await
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .with_conn("health_check", |conn| {
                    conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                        .map(|_| ())
                })
                .await
                .map_err(Into::into)
        })
    }
}
