//! Lifecycle controller: admission, start-up provisioning, answers and results.
//!
//! Every multi-step mutation is delegated to a single [`GameStore`] call so that
//! concurrent requests on the same game are serialized by the store.
//!
//! [`GameStore`]: crate::dao::game_store::GameStore

use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        game_store::{AnswerOutcome, AnswerSubmission, JoinOutcome, LeaveOutcome},
        models::{Difficulty, GameEntity, GameStatus, ParticipantEntity, stored_instant},
    },
    dto::{
        game::{
            AnswerResponse, AnswerView, CreateGameRequest, GameDetailsResponse, GameListEntry,
            GameListResponse, JoinResponse, LeaveResponse, ProgressResponse, ProgressView,
            QuestionsResponse, ResultEntry, ResultsResponse, StartResponse,
        },
        leaderboard::{LeaderboardEntry, LeaderboardResponse, LeaderboardView},
    },
    error::ServiceError,
    state::{
        SharedState,
        identity::{GuestSlot, Identity, Joiner, UserId},
        state_machine::{GameEvent, compute_transition},
    },
};

/// Trim a display name and reject blank ones.
pub(crate) fn sanitize_name(field: &str, value: &str) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::InvalidInput(format!("{field} must not be blank")));
    }
    Ok(trimmed.to_owned())
}

/// Load a game or fail with `NotFound`.
pub(crate) async fn require_game(
    state: &SharedState,
    game_id: Uuid,
) -> Result<GameEntity, ServiceError> {
    state
        .store()
        .find_game(game_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("game {game_id} not found")))
}

/// Load the caller's participant row or fail with `Forbidden`.
pub(crate) async fn require_participant(
    state: &SharedState,
    game_id: Uuid,
    identity: Identity,
) -> Result<ParticipantEntity, ServiceError> {
    state
        .store()
        .find_participant(game_id, identity)
        .await?
        .ok_or_else(|| ServiceError::Forbidden(format!("{identity} is not a participant")))
}

/// Mark a game past `expires_at` as expired and report the conflict.
async fn reject_expired(state: &SharedState, game: &GameEntity) -> ServiceError {
    match state.store().mark_expired(game.id).await {
        Ok(true) => info!(game_id = %game.id, "game expired"),
        Ok(false) => {}
        Err(err) => warn!(game_id = %game.id, error = %err, "failed to mark game expired"),
    }
    ServiceError::StateConflict(format!("game {} has expired", game.id))
}

/// Open a new game with its creator as the first participant.
pub async fn create_game(
    state: &SharedState,
    creator: Option<UserId>,
    request: CreateGameRequest,
    now: SystemTime,
) -> Result<GameDetailsResponse, ServiceError> {
    let name = sanitize_name("name", &request.name)?;
    let player_name = sanitize_name("playerName", &request.player_name)?;
    if request.max_players == 0 {
        return Err(ServiceError::InvalidInput("maxPlayers must be at least 1".into()));
    }
    if request.questions_per_game == 0 {
        return Err(ServiceError::InvalidInput(
            "questionsPerGame must be at least 1".into(),
        ));
    }

    let now = stored_instant(now);
    let ttl = state.config().lifecycle.ttl_for(request.max_players);
    let game = GameEntity {
        id: Uuid::new_v4(),
        name,
        difficulty: request.difficulty,
        creator_user_id: creator,
        max_players: request.max_players,
        questions_per_game: request.questions_per_game,
        time_per_question: request.time_per_question,
        status: GameStatus::Created,
        created_at: now,
        expires_at: now + ttl,
        started_at: None,
        completed_at: None,
    };
    let participant = ParticipantEntity {
        id: Uuid::new_v4(),
        game_id: game.id,
        user_id: creator,
        guest_slot: creator.is_none().then_some(GuestSlot::CREATOR),
        display_name: player_name,
        is_creator: true,
        score: 0,
        correct_answers: 0,
        finished_all_questions: false,
        joined_at: now,
        last_activity: now,
    };

    state
        .store()
        .create_game(game.clone(), participant.clone())
        .await?;
    info!(
        game_id = %game.id,
        difficulty = %game.difficulty,
        max_players = game.max_players,
        questions = game.questions_per_game,
        anonymous = game.is_anonymous(),
        "game created"
    );
    Ok(GameDetailsResponse::new(&game, &[participant]))
}

pub async fn list_games(
    state: &SharedState,
    status: Option<GameStatus>,
) -> Result<GameListResponse, ServiceError> {
    let games = state.store().list_games(status).await?;
    Ok(GameListResponse {
        success: true,
        games: games.iter().map(GameListEntry::from).collect(),
    })
}

pub async fn get_game(
    state: &SharedState,
    game_id: Uuid,
) -> Result<GameDetailsResponse, ServiceError> {
    let game = require_game(state, game_id).await?;
    let participants = state.store().list_participants(game_id).await?;
    Ok(GameDetailsResponse::new(&game, &participants))
}

/// Admit a participant. Joining twice with the same identity returns the
/// existing row untouched.
pub async fn join_game(
    state: &SharedState,
    game_id: Uuid,
    joiner: Joiner,
    display_name: &str,
    now: SystemTime,
) -> Result<JoinResponse, ServiceError> {
    let display_name = sanitize_name("playerName", display_name)?;
    let outcome = state
        .store()
        .join_game(game_id, joiner, display_name, now)
        .await?;
    let (participant, already_joined) = match outcome {
        JoinOutcome::Joined(participant) => {
            info!(game_id = %game_id, participant = %participant.identity(), "participant joined");
            (participant, false)
        }
        JoinOutcome::AlreadyJoined(participant) => (participant, true),
        JoinOutcome::Full { capacity } => return Err(ServiceError::Full { capacity }),
        JoinOutcome::NotJoinable(status) => {
            return Err(ServiceError::StateConflict(format!(
                "game is {status} and no longer accepts players"
            )));
        }
        JoinOutcome::Expired => {
            info!(game_id = %game_id, "game expired");
            return Err(ServiceError::StateConflict(format!(
                "game {game_id} has expired"
            )));
        }
        JoinOutcome::GameMissing => {
            return Err(ServiceError::NotFound(format!("game {game_id} not found")));
        }
    };
    Ok(JoinResponse {
        success: true,
        participant: (&participant).into(),
        already_joined,
    })
}

/// Remove a participant. The anonymous creator leaving deletes the game.
pub async fn leave_game(
    state: &SharedState,
    game_id: Uuid,
    identity: Identity,
) -> Result<LeaveResponse, ServiceError> {
    match state.store().leave_game(game_id, identity).await? {
        LeaveOutcome::GameDeleted => {
            info!(game_id = %game_id, "anonymous creator left; game deleted");
            Ok(LeaveResponse {
                success: true,
                game_deleted: true,
                game_cancelled: false,
            })
        }
        LeaveOutcome::Removed { game_cancelled } => {
            if game_cancelled {
                info!(game_id = %game_id, "last participant left; game cancelled");
            }
            Ok(LeaveResponse {
                success: true,
                game_deleted: false,
                game_cancelled,
            })
        }
        LeaveOutcome::NotParticipant => Err(ServiceError::Forbidden(format!(
            "{identity} is not a participant"
        ))),
        LeaveOutcome::GameMissing => {
            Err(ServiceError::NotFound(format!("game {game_id} not found")))
        }
    }
}

/// Provision the questions of a game and move it to `starting`.
///
/// Only the creator may start. Questions stored by an earlier failed attempt
/// are reused, so retrying after an error is safe.
pub async fn start_game(
    state: &SharedState,
    game_id: Uuid,
    identity: Identity,
    now: SystemTime,
) -> Result<StartResponse, ServiceError> {
    let game = require_game(state, game_id).await?;
    if !game.status.is_absorbing() && game.is_expired_at(now) {
        return Err(reject_expired(state, &game).await);
    }
    let participant = require_participant(state, game_id, identity).await?;
    if !participant.is_creator {
        return Err(ServiceError::Forbidden(
            "only the creator can start the game".into(),
        ));
    }
    compute_transition(game.status, GameEvent::Start)?;

    let report = state.pipeline().provision(&game).await.inspect_err(|err| {
        warn!(game_id = %game_id, error = %err, "question provisioning failed");
    })?;
    info!(
        game_id = %game_id,
        resumed = report.resumed,
        generated = report.generated,
        from_pool = report.from_pool,
        requests = report.requests,
        policy_violations = report.policy_violations,
        "questions provisioned"
    );

    if !state.store().mark_starting(game_id, now).await? {
        let current = require_game(state, game_id).await?;
        if current.status != GameStatus::Created {
            return Err(ServiceError::StateConflict(format!(
                "game is already {}",
                current.status
            )));
        }
        return Err(ServiceError::NoItemsAvailable(format!(
            "stored question count does not match {}",
            current.questions_per_game
        )));
    }

    let game = require_game(state, game_id).await?;
    info!(game_id = %game_id, "game starting");
    Ok(StartResponse {
        success: true,
        game: (&game).into(),
        question_count: game.questions_per_game,
    })
}

/// Questions of a game without their correct answers.
pub async fn list_questions(
    state: &SharedState,
    game_id: Uuid,
) -> Result<QuestionsResponse, ServiceError> {
    require_game(state, game_id).await?;
    let questions = state.store().list_questions(game_id).await?;
    Ok(QuestionsResponse {
        success: true,
        questions: questions.iter().map(Into::into).collect(),
    })
}

/// Record an answer and update the participant's score in the same write.
///
/// A second answer to the same question returns the first one unchanged.
pub async fn submit_answer(
    state: &SharedState,
    game_id: Uuid,
    question_id: Uuid,
    identity: Identity,
    selected_answer: String,
    time_taken_secs: f64,
    now: SystemTime,
) -> Result<AnswerResponse, ServiceError> {
    if selected_answer.trim().is_empty() {
        return Err(ServiceError::InvalidInput(
            "selectedAnswer must not be blank".into(),
        ));
    }
    if !time_taken_secs.is_finite() || time_taken_secs < 0.0 {
        return Err(ServiceError::InvalidInput(
            "timeTaken must be a non-negative number of seconds".into(),
        ));
    }
    let submission = AnswerSubmission {
        game_id,
        identity,
        question_id,
        selected_answer,
        time_taken_ms: Duration::from_secs_f64(time_taken_secs).as_millis() as u64,
        answered_at: now,
    };

    let answer = match state.store().record_answer(submission).await? {
        AnswerOutcome::Recorded {
            answer,
            participant,
        } => {
            debug!(
                game_id = %game_id,
                question_id = %question_id,
                correct = answer.is_correct,
                score = participant.score,
                "answer recorded"
            );
            answer
        }
        AnswerOutcome::Duplicate(answer) => answer,
        AnswerOutcome::NotParticipant => {
            return Err(ServiceError::Forbidden(format!(
                "{identity} is not a participant"
            )));
        }
        AnswerOutcome::QuestionMissing => {
            return Err(ServiceError::NotFound(format!(
                "question {question_id} not found"
            )));
        }
        AnswerOutcome::InvalidOption => {
            return Err(ServiceError::InvalidInput(
                "selected answer is not one of the options".into(),
            ));
        }
        AnswerOutcome::NotAnswerable(status) => {
            return Err(ServiceError::StateConflict(format!(
                "game is {status}; answers are not accepted"
            )));
        }
        AnswerOutcome::GameMissing => {
            return Err(ServiceError::NotFound(format!("game {game_id} not found")));
        }
    };

    Ok(AnswerResponse {
        success: true,
        answer: AnswerView::from(&answer),
    })
}

/// Provisioning progress. The first poll that sees every question stored
/// moves a `starting` game to `in_progress`.
pub async fn progress(
    state: &SharedState,
    game_id: Uuid,
) -> Result<ProgressResponse, ServiceError> {
    let mut game = require_game(state, game_id).await?;
    let generated = u32::try_from(state.store().list_questions(game_id).await?.len())
        .unwrap_or(u32::MAX);
    let total = game.questions_per_game;

    if game.status == GameStatus::Starting
        && generated >= total
        && state.store().mark_in_progress(game_id).await?
    {
        info!(game_id = %game_id, "game in progress");
        game.status = compute_transition(game.status, GameEvent::ItemsReady)?;
    }

    Ok(ProgressResponse {
        success: true,
        progress: ProgressView {
            total,
            generated,
            status: game.status,
            is_ready: generated >= total && game.status.is_playing(),
        },
    })
}

/// Participants ranked by score, then by correct answers.
pub async fn results(state: &SharedState, game_id: Uuid) -> Result<ResultsResponse, ServiceError> {
    let game = require_game(state, game_id).await?;
    let mut participants = state.store().list_participants(game_id).await?;
    let answers = state.store().list_answers(game_id).await?;

    participants.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then(b.correct_answers.cmp(&a.correct_answers))
            .then(a.joined_at.cmp(&b.joined_at))
    });
    let results = participants
        .iter()
        .enumerate()
        .map(|(index, participant)| {
            let answered = answers
                .iter()
                .filter(|answer| answer.participant_id == participant.id)
                .count();
            ResultEntry {
                rank: index as u32 + 1,
                participant: participant.into(),
                answered: u32::try_from(answered).unwrap_or(u32::MAX),
                total_questions: game.questions_per_game,
            }
        })
        .collect();

    Ok(ResultsResponse {
        success: true,
        status: game.status,
        results,
    })
}

/// Best completed scores per difficulty.
pub async fn leaderboard(state: &SharedState) -> Result<LeaderboardResponse, ServiceError> {
    let entries = state
        .store()
        .leaderboard(state.config().lifecycle.leaderboard_size)
        .await?;
    let mut view = LeaderboardView::default();
    for entry in &entries {
        let bucket = match entry.difficulty {
            Difficulty::Easy => &mut view.easy,
            Difficulty::Medium => &mut view.medium,
            Difficulty::Hard => &mut view.hard,
            Difficulty::Expert => &mut view.expert,
        };
        bucket.push(LeaderboardEntry::from(entry));
    }
    Ok(LeaderboardResponse {
        success: true,
        leaderboard: view,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::{
        dao::models::QuestionEntity,
        services::test_support::{create_request, pool_only_state},
    };

    const CREATOR: Identity = Identity::Guest(GuestSlot::CREATOR);

    async fn started(state: &SharedState, max_players: u32, questions: u32) -> Uuid {
        let now = SystemTime::now();
        let created = create_game(state, None, create_request(max_players, questions), now)
            .await
            .unwrap();
        let game_id = created.game.id;
        start_game(state, game_id, CREATOR, now).await.unwrap();
        game_id
    }

    async fn stored_questions(state: &SharedState, game_id: Uuid) -> Vec<QuestionEntity> {
        state.store().list_questions(game_id).await.unwrap()
    }

    #[tokio::test]
    async fn anonymous_creator_takes_slot_zero() {
        let state = pool_only_state().await;
        let created = create_game(&state, None, create_request(1, 5), SystemTime::now())
            .await
            .unwrap();
        assert_eq!(created.participants.len(), 1);
        let creator = &created.participants[0];
        assert!(creator.is_creator);
        assert_eq!(creator.guest_id, Some(0));
        assert!(created.game.is_anonymous);
    }

    #[tokio::test]
    async fn blank_names_are_rejected() {
        let state = pool_only_state().await;
        let mut request = create_request(1, 5);
        request.player_name = "   ".into();
        let err = create_game(&state, None, request, SystemTime::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn start_provisions_exactly_the_requested_questions() {
        let state = pool_only_state().await;
        let game_id = started(&state, 1, 5).await;

        let game = require_game(&state, game_id).await.unwrap();
        assert_eq!(game.status, GameStatus::Starting);
        let questions = stored_questions(&state, game_id).await;
        assert_eq!(questions.len(), 5);
        let references: HashSet<_> = questions.iter().map(|q| &q.source_reference).collect();
        assert_eq!(references.len(), 5);
    }

    #[tokio::test]
    async fn only_the_creator_may_start() {
        let state = pool_only_state().await;
        let now = SystemTime::now();
        let created = create_game(&state, None, create_request(3, 5), now)
            .await
            .unwrap();
        let game_id = created.game.id;
        join_game(&state, game_id, Joiner::User(UserId(8)), "Ben", now)
            .await
            .unwrap();

        let err = start_game(&state, game_id, Identity::User(UserId(8)), now)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn starting_twice_is_a_conflict() {
        let state = pool_only_state().await;
        let game_id = started(&state, 1, 5).await;
        let err = start_game(&state, game_id, CREATOR, SystemTime::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::StateConflict(_)));
    }

    #[tokio::test]
    async fn start_after_expiry_marks_the_game_expired() {
        let state = pool_only_state().await;
        let created_at = SystemTime::now();
        let created = create_game(&state, None, create_request(1, 5), created_at)
            .await
            .unwrap();
        let later = created_at + Duration::from_secs(31 * 60);

        let err = start_game(&state, created.game.id, CREATOR, later)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::StateConflict(_)));
        let game = require_game(&state, created.game.id).await.unwrap();
        assert_eq!(game.status, GameStatus::Expired);
    }

    #[tokio::test]
    async fn too_many_questions_for_the_pool_fail_without_starting() {
        let state = pool_only_state().await;
        let now = SystemTime::now();
        let created = create_game(&state, None, create_request(1, 31), now)
            .await
            .unwrap();

        let err = start_game(&state, created.game.id, CREATOR, now)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NoItemsAvailable(_)));
        let game = require_game(&state, created.game.id).await.unwrap();
        assert_eq!(game.status, GameStatus::Created);
    }

    #[tokio::test]
    async fn pool_alone_starts_the_largest_game_at_every_difficulty() {
        let state = pool_only_state().await;
        let now = SystemTime::now();
        for difficulty in Difficulty::ALL {
            let mut request = create_request(1, 30);
            request.difficulty = difficulty;
            let created = create_game(&state, None, request, now).await.unwrap();

            let started = start_game(&state, created.game.id, CREATOR, now)
                .await
                .unwrap_or_else(|err| panic!("{difficulty} game did not start: {err}"));
            assert_eq!(started.question_count, 30);
            let questions = stored_questions(&state, created.game.id).await;
            assert_eq!(questions.len(), 30);
            assert!(questions.iter().all(|q| q.difficulty == difficulty));
        }
    }

    #[tokio::test]
    async fn created_and_reread_participants_carry_the_same_timestamps() {
        let state = pool_only_state().await;
        let now = SystemTime::now();
        let created = create_game(&state, Some(UserId(1)), create_request(3, 5), now)
            .await
            .unwrap();
        let game_id = created.game.id;
        let joined = join_game(&state, game_id, Joiner::User(UserId(2)), "Ben", now)
            .await
            .unwrap();
        let rejoined = join_game(&state, game_id, Joiner::User(UserId(2)), "Ben", now)
            .await
            .unwrap();
        assert_eq!(joined.participant.joined_at, rejoined.participant.joined_at);

        let details = get_game(&state, game_id).await.unwrap();
        assert_eq!(details.game.created_at, created.game.created_at);
        assert_eq!(
            details.participants[0].joined_at,
            created.participants[0].joined_at
        );
    }

    #[tokio::test]
    async fn joining_twice_returns_the_same_participant() {
        let state = pool_only_state().await;
        let now = SystemTime::now();
        let created = create_game(&state, Some(UserId(1)), create_request(4, 5), now)
            .await
            .unwrap();
        let game_id = created.game.id;

        let first = join_game(&state, game_id, Joiner::User(UserId(2)), "Ben", now)
            .await
            .unwrap();
        let second = join_game(&state, game_id, Joiner::User(UserId(2)), "Ben", now)
            .await
            .unwrap();
        assert!(!first.already_joined);
        assert!(second.already_joined);
        assert_eq!(first.participant.id, second.participant.id);
        assert!(!second.participant.is_creator);

        let again = join_game(&state, game_id, Joiner::User(UserId(1)), "Ann", now)
            .await
            .unwrap();
        assert!(again.already_joined);
        assert!(again.participant.is_creator);
    }

    #[tokio::test]
    async fn full_game_rejects_new_players() {
        let state = pool_only_state().await;
        let now = SystemTime::now();
        let created = create_game(&state, None, create_request(1, 5), now)
            .await
            .unwrap();
        let err = join_game(
            &state,
            created.game.id,
            Joiner::Guest { requested: None },
            "Ben",
            now,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Full { capacity: 1 }));
    }

    #[tokio::test]
    async fn anonymous_creator_leaving_deletes_the_game() {
        let state = pool_only_state().await;
        let game_id = started(&state, 1, 5).await;

        let left = leave_game(&state, game_id, CREATOR).await.unwrap();
        assert!(left.game_deleted);
        assert!(matches!(
            get_game(&state, game_id).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(stored_questions(&state, game_id).await.is_empty());
    }

    #[tokio::test]
    async fn answers_score_once_and_first_one_promotes_the_game() {
        let state = pool_only_state().await;
        let game_id = started(&state, 1, 5).await;
        let question = stored_questions(&state, game_id).await.remove(0);
        let now = SystemTime::now();

        let first = submit_answer(
            &state,
            game_id,
            question.id,
            CREATOR,
            question.correct_answer.clone(),
            4.5,
            now,
        )
        .await
        .unwrap();
        assert!(first.answer.is_correct);
        assert_eq!(first.answer.points_awarded, Difficulty::Easy.points());
        assert_eq!(first.answer.time_taken, 4.5);

        let wrong = question
            .options
            .iter()
            .find(|option| **option != question.correct_answer)
            .cloned()
            .unwrap();
        let second = submit_answer(&state, game_id, question.id, CREATOR, wrong, 1.0, now)
            .await
            .unwrap();
        assert_eq!(second.answer.id, first.answer.id);
        assert!(second.answer.is_correct);

        let game = require_game(&state, game_id).await.unwrap();
        assert_eq!(game.status, GameStatus::InProgress);
        let results = results(&state, game_id).await.unwrap();
        assert_eq!(results.results[0].participant.score, 10);
        assert_eq!(results.results[0].answered, 1);
    }

    #[tokio::test]
    async fn answers_outside_the_options_are_invalid() {
        let state = pool_only_state().await;
        let game_id = started(&state, 1, 5).await;
        let question = stored_questions(&state, game_id).await.remove(0);

        let err = submit_answer(
            &state,
            game_id,
            question.id,
            CREATOR,
            "Babylon".into(),
            2.0,
            SystemTime::now(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn strangers_cannot_answer() {
        let state = pool_only_state().await;
        let game_id = started(&state, 1, 5).await;
        let question = stored_questions(&state, game_id).await.remove(0);

        let err = submit_answer(
            &state,
            game_id,
            question.id,
            Identity::User(UserId(99)),
            question.correct_answer,
            2.0,
            SystemTime::now(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn progress_poll_promotes_a_fully_provisioned_game() {
        let state = pool_only_state().await;
        let game_id = started(&state, 1, 5).await;

        let polled = progress(&state, game_id).await.unwrap().progress;
        assert_eq!(polled.total, 5);
        assert_eq!(polled.generated, 5);
        assert_eq!(polled.status, GameStatus::InProgress);
        assert!(polled.is_ready);
    }

    #[tokio::test]
    async fn questions_are_listed_in_order() {
        let state = pool_only_state().await;
        let game_id = started(&state, 1, 5).await;
        let listed = list_questions(&state, game_id).await.unwrap().questions;
        let numbers: Vec<_> = listed.iter().map(|q| q.question_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
    }
}
