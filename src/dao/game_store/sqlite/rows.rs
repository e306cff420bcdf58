//! Row mapping between SQLite columns and DAO entities.

use std::{
    str::FromStr,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use rusqlite::{Row, types::Type};
use uuid::Uuid;

use crate::{
    dao::models::{
        AnswerEntity, GameEntity, LeaderboardEntryEntity, ParticipantEntity, PoolQuestionEntity,
        QuestionEntity, UsageRecordEntity,
    },
    state::identity::{GuestSlot, UserId},
};

pub const GAME_COLUMNS: &str = "id, name, difficulty, creator_user_id, max_players, \
     questions_per_game, time_per_question, status, created_at, expires_at, started_at, \
     completed_at";

pub const PARTICIPANT_COLUMNS: &str = "id, game_id, user_id, guest_slot, display_name, \
     is_creator, score, correct_answers, finished_all_questions, joined_at, last_activity";

pub const QUESTION_COLUMNS: &str = "id, game_id, question_number, question_text, \
     correct_answer, options, source_reference, book, testament, difficulty, points, source, \
     created_at";

pub const ANSWER_COLUMNS: &str = "id, game_id, participant_id, question_id, selected_answer, \
     is_correct, time_taken_ms, points_awarded, answered_at";

pub const POOL_COLUMNS: &str = "question_text, correct_answer, incorrect_answers, \
     source_reference, book, testament, difficulty";

pub const LEADERBOARD_COLUMNS: &str = "id, game_id, game_name, difficulty, player_name, \
     user_id, score, correct_answers, total_questions, completed_at";

/// Milliseconds since the Unix epoch; instants before the epoch clamp to zero.
pub fn to_millis(at: SystemTime) -> i64 {
    at.duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

pub fn from_millis(millis: i64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(u64::try_from(millis).unwrap_or(0))
}

fn conversion_error(
    index: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err))
}

fn uuid_at(row: &Row<'_>, index: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(index)?;
    Uuid::parse_str(&raw).map_err(|err| conversion_error(index, err))
}

fn parsed_at<T>(row: &Row<'_>, index: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(index)?;
    raw.parse().map_err(|err| conversion_error(index, err))
}

fn json_list_at(row: &Row<'_>, index: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(index)?;
    serde_json::from_str(&raw).map_err(|err| conversion_error(index, err))
}

fn time_at(row: &Row<'_>, index: usize) -> rusqlite::Result<SystemTime> {
    row.get::<_, i64>(index).map(from_millis)
}

fn optional_time_at(row: &Row<'_>, index: usize) -> rusqlite::Result<Option<SystemTime>> {
    Ok(row.get::<_, Option<i64>>(index)?.map(from_millis))
}

fn user_id_at(row: &Row<'_>, index: usize) -> rusqlite::Result<Option<UserId>> {
    Ok(row.get::<_, Option<i64>>(index)?.map(UserId))
}

/// Encode option lists as JSON text.
pub fn encode_list(values: &[String]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_owned())
}

pub fn game_from_row(row: &Row<'_>) -> rusqlite::Result<GameEntity> {
    Ok(GameEntity {
        id: uuid_at(row, 0)?,
        name: row.get(1)?,
        difficulty: parsed_at(row, 2)?,
        creator_user_id: user_id_at(row, 3)?,
        max_players: row.get(4)?,
        questions_per_game: row.get(5)?,
        time_per_question: row.get(6)?,
        status: parsed_at(row, 7)?,
        created_at: time_at(row, 8)?,
        expires_at: time_at(row, 9)?,
        started_at: optional_time_at(row, 10)?,
        completed_at: optional_time_at(row, 11)?,
    })
}

pub fn participant_from_row(row: &Row<'_>) -> rusqlite::Result<ParticipantEntity> {
    Ok(ParticipantEntity {
        id: uuid_at(row, 0)?,
        game_id: uuid_at(row, 1)?,
        user_id: user_id_at(row, 2)?,
        guest_slot: row.get::<_, Option<u32>>(3)?.map(GuestSlot::new),
        display_name: row.get(4)?,
        is_creator: row.get(5)?,
        score: row.get(6)?,
        correct_answers: row.get(7)?,
        finished_all_questions: row.get(8)?,
        joined_at: time_at(row, 9)?,
        last_activity: time_at(row, 10)?,
    })
}

pub fn question_from_row(row: &Row<'_>) -> rusqlite::Result<QuestionEntity> {
    Ok(QuestionEntity {
        id: uuid_at(row, 0)?,
        game_id: uuid_at(row, 1)?,
        question_number: row.get(2)?,
        question_text: row.get(3)?,
        correct_answer: row.get(4)?,
        options: json_list_at(row, 5)?,
        source_reference: row.get(6)?,
        book: row.get(7)?,
        testament: parsed_at(row, 8)?,
        difficulty: parsed_at(row, 9)?,
        points: row.get(10)?,
        source: parsed_at(row, 11)?,
        created_at: time_at(row, 12)?,
    })
}

pub fn answer_from_row(row: &Row<'_>) -> rusqlite::Result<AnswerEntity> {
    Ok(AnswerEntity {
        id: uuid_at(row, 0)?,
        game_id: uuid_at(row, 1)?,
        participant_id: uuid_at(row, 2)?,
        question_id: uuid_at(row, 3)?,
        selected_answer: row.get(4)?,
        is_correct: row.get(5)?,
        time_taken_ms: row.get::<_, i64>(6).map(|ms| u64::try_from(ms).unwrap_or(0))?,
        points_awarded: row.get(7)?,
        answered_at: time_at(row, 8)?,
    })
}

pub fn usage_from_row(row: &Row<'_>) -> rusqlite::Result<UsageRecordEntity> {
    Ok(UsageRecordEntity {
        reference: row.get(0)?,
        last_used: time_at(row, 1)?,
        frequency: row.get(2)?,
    })
}

pub fn pool_from_row(row: &Row<'_>) -> rusqlite::Result<PoolQuestionEntity> {
    Ok(PoolQuestionEntity {
        question_text: row.get(0)?,
        correct_answer: row.get(1)?,
        incorrect_answers: json_list_at(row, 2)?,
        source_reference: row.get(3)?,
        book: row.get(4)?,
        testament: parsed_at(row, 5)?,
        difficulty: parsed_at(row, 6)?,
    })
}

pub fn leaderboard_from_row(row: &Row<'_>) -> rusqlite::Result<LeaderboardEntryEntity> {
    Ok(LeaderboardEntryEntity {
        id: uuid_at(row, 0)?,
        game_id: uuid_at(row, 1)?,
        game_name: row.get(2)?,
        difficulty: parsed_at(row, 3)?,
        player_name: row.get(4)?,
        user_id: user_id_at(row, 5)?,
        score: row.get(6)?,
        correct_answers: row.get(7)?,
        total_questions: row.get(8)?,
        completed_at: time_at(row, 9)?,
    })
}
