//! Builders shared by storage and service tests.

use std::time::{Duration, SystemTime};

use uuid::Uuid;

use crate::{
    dao::models::{
        Difficulty, GameEntity, GameStatus, ParticipantEntity, QuestionEntity, QuestionSource,
        Testament, stored_instant,
    },
    state::identity::{GuestSlot, UserId},
};

fn game(creator_user_id: Option<UserId>, max_players: u32, questions: u32, now: SystemTime) -> GameEntity {
    let now = stored_instant(now);
    let ttl = if max_players > 1 { 60 * 60 } else { 30 * 60 };
    GameEntity {
        id: Uuid::new_v4(),
        name: "Fixture".into(),
        difficulty: Difficulty::Easy,
        creator_user_id,
        max_players,
        questions_per_game: questions,
        time_per_question: 30,
        status: GameStatus::Created,
        created_at: now,
        expires_at: now + Duration::from_secs(ttl),
        started_at: None,
        completed_at: None,
    }
}

fn creator(game: &GameEntity, now: SystemTime) -> ParticipantEntity {
    let now = stored_instant(now);
    ParticipantEntity {
        id: Uuid::new_v4(),
        game_id: game.id,
        user_id: game.creator_user_id,
        guest_slot: game.creator_user_id.is_none().then_some(GuestSlot::CREATOR),
        display_name: "Ann".into(),
        is_creator: true,
        score: 0,
        correct_answers: 0,
        finished_all_questions: false,
        joined_at: now,
        last_activity: now,
    }
}

/// Game created by an anonymous caller, with its slot-0 creator row.
pub fn anonymous_game(
    max_players: u32,
    questions: u32,
    now: SystemTime,
) -> (GameEntity, ParticipantEntity) {
    let game = game(None, max_players, questions, now);
    let creator = creator(&game, now);
    (game, creator)
}

/// Game created by an authenticated user.
pub fn user_game(
    user_id: UserId,
    max_players: u32,
    questions: u32,
    now: SystemTime,
) -> (GameEntity, ParticipantEntity) {
    let game = game(Some(user_id), max_players, questions, now);
    let creator = creator(&game, now);
    (game, creator)
}

/// `count` distinct questions numbered from 1.
pub fn questions_for(game: &GameEntity, count: u32, now: SystemTime) -> Vec<QuestionEntity> {
    let now = stored_instant(now);
    (1..=count)
        .map(|number| QuestionEntity {
            id: Uuid::new_v4(),
            game_id: game.id,
            question_number: number,
            question_text: format!("Fixture question number {number}?"),
            correct_answer: "Jerusalem".into(),
            options: vec!["Bethlehem".into(), "Jerusalem".into(), "Nazareth".into()],
            source_reference: format!("Psalms {number}:1"),
            book: "Psalms".into(),
            testament: Testament::Old,
            difficulty: game.difficulty,
            points: game.difficulty.points(),
            source: QuestionSource::Pool,
            created_at: now,
        })
        .collect()
}
