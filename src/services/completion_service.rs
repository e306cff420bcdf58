//! Completion protocol.
//!
//! Players report when they ran out of questions; any poll may then complete
//! the game. The store's conditional update guarantees that exactly one caller
//! performs the transition (and writes the leaderboard). Games stuck because a
//! player vanished are force-completed by the deadlock detector.

use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;

use crate::{
    config::CompletionConfig,
    dao::{
        game_store::{DeadlockRule, SettleOutcome, Settlement},
        models::{GameEntity, ParticipantEntity},
    },
    dto::completion::{
        FinishStatusResponse, FinishedPlayer, FinishedPlayersResponse, ParticipantResponse,
    },
    error::ServiceError,
    services::game_service::{require_game, require_participant},
    state::{
        SharedState,
        identity::Identity,
        state_machine::{Deadlock, GameEvent, compute_transition},
    },
};

/// Detect a stuck game. Only meaningful while the game is being played and
/// not everybody has finished.
///
/// Unfinished players count as gone once idle for
/// [`CompletionConfig::idle_threshold`] of the game's time per question.
pub fn detect_deadlock(
    game: &GameEntity,
    participants: &[ParticipantEntity],
    config: &CompletionConfig,
    now: SystemTime,
) -> Option<Deadlock> {
    if !game.status.is_playing() {
        return None;
    }
    if now + config.expiry_margin >= game.expires_at {
        return Some(Deadlock::NearExpiry);
    }

    let idle_threshold = config.idle_threshold(game.time_per_question);
    let any_finished = participants.iter().any(|p| p.finished_all_questions);
    let unfinished_idle = participants
        .iter()
        .filter(|p| !p.finished_all_questions)
        .all(|p| {
            now.duration_since(p.last_activity)
                .is_ok_and(|idle| idle >= idle_threshold)
        });
    (any_finished && unfinished_idle).then_some(Deadlock::Abandoned)
}

fn finished_players(participants: &[ParticipantEntity]) -> Vec<FinishedPlayer> {
    participants
        .iter()
        .filter(|p| p.finished_all_questions)
        .map(FinishedPlayer::from)
        .collect()
}

/// Flag the caller as finished (idempotent).
pub async fn set_finished(
    state: &SharedState,
    game_id: Uuid,
    identity: Identity,
    now: SystemTime,
) -> Result<ParticipantResponse, ServiceError> {
    require_game(state, game_id).await?;
    let participant = state
        .store()
        .mark_finished(game_id, identity, now)
        .await?
        .ok_or_else(|| ServiceError::Forbidden(format!("{identity} is not a participant")))?;
    info!(game_id = %game_id, participant = %identity, "participant finished");
    Ok(ParticipantResponse {
        success: true,
        participant: (&participant).into(),
    })
}

/// Flag the caller as finished and run the completion check, atomically.
pub async fn register_finished(
    state: &SharedState,
    game_id: Uuid,
    identity: Identity,
    now: SystemTime,
) -> Result<FinishStatusResponse, ServiceError> {
    let status = settle(state, game_id, Some(identity), now).await?;
    info!(game_id = %game_id, participant = %identity, "participant finished");
    Ok(status)
}

/// Report who has finished and complete the game when everyone has, or when
/// the game is deadlocked.
pub async fn check_finished(
    state: &SharedState,
    game_id: Uuid,
    now: SystemTime,
) -> Result<FinishStatusResponse, ServiceError> {
    settle(state, game_id, None, now).await
}

async fn settle(
    state: &SharedState,
    game_id: Uuid,
    finisher: Option<Identity>,
    now: SystemTime,
) -> Result<FinishStatusResponse, ServiceError> {
    let config = state.config().completion.clone();
    let rule: DeadlockRule =
        Box::new(move |game, participants| detect_deadlock(game, participants, &config, now));

    let settlement = match state
        .store()
        .settle_game(game_id, finisher, now, rule)
        .await?
    {
        SettleOutcome::Settled(settlement) => settlement,
        SettleOutcome::NotParticipant => {
            let identity = finisher.map(|i| i.to_string()).unwrap_or_default();
            return Err(ServiceError::Forbidden(format!(
                "{identity} is not a participant"
            )));
        }
        SettleOutcome::GameMissing => {
            return Err(ServiceError::NotFound(format!("game {game_id} not found")));
        }
    };

    let Settlement {
        game,
        participants,
        deadlock,
        completed_by_this_call,
    } = settlement;
    let finished = finished_players(&participants);
    let total_players = participants.len() as u32;
    let finished_count = finished.len() as u32;

    if let Some(reason) = deadlock {
        info!(
            game_id = %game_id,
            ?reason,
            finished = finished_count,
            total = total_players,
            "deadlock detected; forcing completion"
        );
    }
    if completed_by_this_call {
        info!(game_id = %game_id, forced = deadlock.is_some(), "game completed");
    }

    Ok(FinishStatusResponse {
        success: true,
        status: game.status,
        all_finished: total_players > 0 && finished_count == total_players,
        finished_count,
        total_players,
        finished_players: finished,
        force_completed: deadlock.is_some(),
        deadlock_detected: deadlock.is_some(),
        completed_by_this_call,
    })
}

pub async fn list_finished_players(
    state: &SharedState,
    game_id: Uuid,
) -> Result<FinishedPlayersResponse, ServiceError> {
    require_game(state, game_id).await?;
    let participants = state.store().list_participants(game_id).await?;
    Ok(FinishedPlayersResponse {
        success: true,
        finished_players: finished_players(&participants),
    })
}

/// Complete a game on behalf of a participant, whoever has finished.
pub async fn force_complete(
    state: &SharedState,
    game_id: Uuid,
    identity: Identity,
    now: SystemTime,
) -> Result<FinishStatusResponse, ServiceError> {
    let game = require_game(state, game_id).await?;
    require_participant(state, game_id, identity).await?;
    compute_transition(game.status, GameEvent::Complete)?;

    let completed_by_this_call = state.store().complete_game(game_id, now).await?;
    if completed_by_this_call {
        info!(game_id = %game_id, participant = %identity, "game force-completed");
    }
    let game = require_game(state, game_id).await?;
    let participants = state.store().list_participants(game_id).await?;
    let finished = finished_players(&participants);
    let total_players = participants.len() as u32;
    let finished_count = finished.len() as u32;
    Ok(FinishStatusResponse {
        success: true,
        status: game.status,
        all_finished: total_players > 0 && finished_count == total_players,
        finished_count,
        total_players,
        finished_players: finished,
        force_completed: completed_by_this_call,
        deadlock_detected: false,
        completed_by_this_call,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        dao::{game_store::fixtures::anonymous_game, models::GameStatus},
        services::{
            game_service::{create_game, join_game, start_game, submit_answer},
            test_support::{create_request, pool_only_state},
        },
        state::identity::{GuestSlot, Joiner},
    };

    const CREATOR: Identity = Identity::Guest(GuestSlot::CREATOR);
    const SECOND: Identity = Identity::Guest(GuestSlot::new(1));

    async fn two_player_game(state: &SharedState, now: SystemTime) -> Uuid {
        let created = create_game(state, None, create_request(2, 5), now)
            .await
            .unwrap();
        let game_id = created.game.id;
        join_game(state, game_id, Joiner::Guest { requested: None }, "Ben", now)
            .await
            .unwrap();
        start_game(state, game_id, CREATOR, now).await.unwrap();
        game_id
    }

    fn playing(status: GameStatus, expires_in: Duration, now: SystemTime) -> GameEntity {
        let (mut game, _) = anonymous_game(2, 5, now);
        game.status = status;
        game.expires_at = now + expires_in;
        game
    }

    fn player(finished: bool, idle: Duration, now: SystemTime) -> ParticipantEntity {
        let (game, mut participant) = anonymous_game(2, 5, now);
        participant.game_id = game.id;
        participant.finished_all_questions = finished;
        participant.last_activity = now - idle;
        participant
    }

    #[test]
    fn idle_unfinished_players_deadlock_once_someone_finished() {
        let now = SystemTime::now();
        let config = CompletionConfig::default();
        let game = playing(GameStatus::InProgress, Duration::from_secs(3600), now);

        let stuck = [
            player(true, Duration::ZERO, now),
            player(false, Duration::from_secs(121), now),
        ];
        assert_eq!(
            detect_deadlock(&game, &stuck, &config, now),
            Some(Deadlock::Abandoned)
        );

        let active = [
            player(true, Duration::ZERO, now),
            player(false, Duration::from_secs(30), now),
        ];
        assert_eq!(detect_deadlock(&game, &active, &config, now), None);

        let nobody_done = [player(false, Duration::from_secs(600), now)];
        assert_eq!(detect_deadlock(&game, &nobody_done, &config, now), None);
    }

    #[test]
    fn slow_games_give_unfinished_players_two_questions_of_slack() {
        let now = SystemTime::now();
        let config = CompletionConfig::default();
        let mut game = playing(GameStatus::InProgress, Duration::from_secs(3600), now);
        game.time_per_question = 300;

        let thinking = [
            player(true, Duration::ZERO, now),
            player(false, Duration::from_secs(150), now),
        ];
        assert_eq!(detect_deadlock(&game, &thinking, &config, now), None);

        let gone = [
            player(true, Duration::ZERO, now),
            player(false, Duration::from_secs(601), now),
        ];
        assert_eq!(
            detect_deadlock(&game, &gone, &config, now),
            Some(Deadlock::Abandoned)
        );
    }

    #[test]
    fn games_close_to_expiry_deadlock() {
        let now = SystemTime::now();
        let config = CompletionConfig::default();
        let game = playing(GameStatus::Starting, Duration::from_secs(4 * 60), now);
        let players = [player(false, Duration::ZERO, now)];
        assert_eq!(
            detect_deadlock(&game, &players, &config, now),
            Some(Deadlock::NearExpiry)
        );

        let waiting = playing(GameStatus::Created, Duration::from_secs(60), now);
        assert_eq!(detect_deadlock(&waiting, &players, &config, now), None);
    }

    #[tokio::test]
    async fn last_finisher_completes_the_game_once() {
        let state = pool_only_state().await;
        let now = SystemTime::now();
        let game_id = two_player_game(&state, now).await;

        let first = register_finished(&state, game_id, CREATOR, now)
            .await
            .unwrap();
        assert!(!first.all_finished);
        assert_eq!(first.finished_count, 1);
        assert_eq!(first.total_players, 2);
        assert!(!first.completed_by_this_call);

        let second = register_finished(&state, game_id, SECOND, now)
            .await
            .unwrap();
        assert!(second.all_finished);
        assert!(second.completed_by_this_call);
        assert!(!second.force_completed);
        assert_eq!(second.status, GameStatus::Completed);

        let again = check_finished(&state, game_id, now).await.unwrap();
        assert!(again.all_finished);
        assert!(!again.completed_by_this_call);
    }

    #[tokio::test]
    async fn concurrent_checks_complete_exactly_once() {
        let state = pool_only_state().await;
        let now = SystemTime::now();
        let game_id = two_player_game(&state, now).await;
        set_finished(&state, game_id, CREATOR, now).await.unwrap();
        set_finished(&state, game_id, SECOND, now).await.unwrap();

        let checks = (0..6).map(|_| {
            let state = state.clone();
            tokio::spawn(async move { check_finished(&state, game_id, now).await })
        });
        let mut performed = 0;
        for check in futures::future::join_all(checks).await {
            let status = check.unwrap().unwrap();
            assert!(status.all_finished);
            if status.completed_by_this_call {
                performed += 1;
            }
        }
        assert_eq!(performed, 1);

        let board = state.store().leaderboard(10).await.unwrap();
        assert_eq!(board.len(), 2);
    }

    #[tokio::test]
    async fn abandoned_player_is_detected_on_poll() {
        let state = pool_only_state().await;
        let now = SystemTime::now();
        let game_id = two_player_game(&state, now).await;

        let later = now + Duration::from_secs(3 * 60);
        set_finished(&state, game_id, CREATOR, later).await.unwrap();
        let status = check_finished(&state, game_id, later).await.unwrap();
        assert!(status.deadlock_detected);
        assert!(status.force_completed);
        assert!(!status.all_finished);
        assert_eq!(status.status, GameStatus::Completed);
    }

    #[tokio::test]
    async fn player_within_a_long_question_is_not_kicked_out() {
        let state = pool_only_state().await;
        let now = SystemTime::now();
        let mut request = create_request(2, 5);
        request.time_per_question = 300;
        let created = create_game(&state, None, request, now).await.unwrap();
        let game_id = created.game.id;
        join_game(&state, game_id, Joiner::Guest { requested: None }, "Ben", now)
            .await
            .unwrap();
        start_game(&state, game_id, CREATOR, now).await.unwrap();
        let questions = state.store().list_questions(game_id).await.unwrap();
        submit_answer(
            &state,
            game_id,
            questions[0].id,
            SECOND,
            questions[0].correct_answer.clone(),
            12.0,
            now,
        )
        .await
        .unwrap();

        let finished_at = now + Duration::from_secs(150);
        let status = register_finished(&state, game_id, CREATOR, finished_at)
            .await
            .unwrap();
        assert!(!status.deadlock_detected);
        assert!(!status.force_completed);
        assert_eq!(status.status, GameStatus::InProgress);

        let much_later = now + Duration::from_secs(601);
        let status = check_finished(&state, game_id, much_later).await.unwrap();
        assert!(status.deadlock_detected);
        assert!(status.completed_by_this_call);
        assert_eq!(status.status, GameStatus::Completed);
    }

    #[tokio::test]
    async fn expired_games_are_reported_as_expired() {
        let state = pool_only_state().await;
        let now = SystemTime::now();
        let game_id = two_player_game(&state, now).await;
        set_finished(&state, game_id, CREATOR, now).await.unwrap();
        set_finished(&state, game_id, SECOND, now).await.unwrap();
        assert!(state.store().mark_expired(game_id).await.unwrap());

        let status = check_finished(&state, game_id, now).await.unwrap();
        assert!(status.all_finished);
        assert!(!status.completed_by_this_call);
        assert_eq!(status.status, GameStatus::Expired);
        assert!(state.store().leaderboard(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn any_participant_may_force_completion() {
        let state = pool_only_state().await;
        let now = SystemTime::now();
        let game_id = two_player_game(&state, now).await;
        let questions = state.store().list_questions(game_id).await.unwrap();
        submit_answer(
            &state,
            game_id,
            questions[0].id,
            SECOND,
            questions[0].correct_answer.clone(),
            3.0,
            now,
        )
        .await
        .unwrap();

        let forced = force_complete(&state, game_id, SECOND, now).await.unwrap();
        assert!(forced.force_completed);
        assert!(forced.completed_by_this_call);

        let err = force_complete(&state, game_id, SECOND, now)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::StateConflict(_)));
    }

    #[tokio::test]
    async fn strangers_cannot_finish() {
        let state = pool_only_state().await;
        let now = SystemTime::now();
        let game_id = two_player_game(&state, now).await;
        let err = set_finished(&state, game_id, Identity::Guest(GuestSlot::new(9)), now)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let listed = list_finished_players(&state, game_id).await.unwrap();
        assert!(listed.finished_players.is_empty());
    }
}
