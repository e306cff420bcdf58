use std::time::{SystemTime, UNIX_EPOCH};

use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::models::GameEntity,
    dto::{
        cleanup::{
            CleanupCandidate, CleanupCounts, CleanupReason, CleanupResponse,
            CleanupStatusResponse,
        },
        format_system_time,
    },
    error::ServiceError,
    state::SharedState,
};

fn completed_before(state: &SharedState, now: SystemTime) -> SystemTime {
    now.checked_sub(state.config().cleanup.completed_grace)
        .unwrap_or(UNIX_EPOCH)
}

fn reason(game: &GameEntity, now: SystemTime) -> CleanupReason {
    if game.expires_at < now {
        CleanupReason::Expired
    } else {
        CleanupReason::CompletedAged
    }
}

async fn candidates(
    state: &SharedState,
    now: SystemTime,
) -> Result<Vec<GameEntity>, ServiceError> {
    Ok(state
        .store()
        .find_cleanup_candidates(now, completed_before(state, now))
        .await?)
}

/// Read-only listing of the games the next sweep would delete.
pub async fn cleanup_status(
    state: &SharedState,
    now: SystemTime,
) -> Result<CleanupStatusResponse, ServiceError> {
    let games = candidates(state, now).await?;
    let mut counts = CleanupCounts::default();
    let candidates = games
        .iter()
        .map(|game| {
            let reason = reason(game, now);
            match reason {
                CleanupReason::Expired => counts.expired += 1,
                CleanupReason::CompletedAged => counts.completed_aged += 1,
            }
            counts.total += 1;
            CleanupCandidate {
                game_id: game.id,
                name: game.name.clone(),
                status: game.status,
                reason,
                expires_at: format_system_time(game.expires_at),
                completed_at: game.completed_at.map(format_system_time),
            }
        })
        .collect();
    Ok(CleanupStatusResponse {
        success: true,
        candidates,
        counts,
    })
}

/// Delete expired games and games completed longer ago than the grace period.
/// Children go with them through cascading deletes.
pub async fn cleanup_expired(
    state: &SharedState,
    now: SystemTime,
) -> Result<CleanupResponse, ServiceError> {
    let game_ids: Vec<Uuid> = candidates(state, now)
        .await?
        .into_iter()
        .map(|game| game.id)
        .collect();
    if game_ids.is_empty() {
        return Ok(CleanupResponse {
            success: true,
            deleted: 0,
            game_ids,
        });
    }
    let deleted = state.store().delete_games(game_ids.clone()).await?;
    info!(deleted, candidates = game_ids.len(), "expired games deleted");
    Ok(CleanupResponse {
        success: true,
        deleted,
        game_ids,
    })
}

/// Run one sweep: game cleanup, then usage records past retention.
pub async fn sweep(state: &SharedState, now: SystemTime) {
    if let Err(err) = cleanup_expired(state, now).await {
        warn!(error = %err, "game cleanup failed");
    }
    let retention = state.config().pipeline.usage_retention;
    let before = now.checked_sub(retention).unwrap_or(UNIX_EPOCH);
    match state.store().purge_usage(before).await {
        Ok(0) => {}
        Ok(purged) => debug!(purged, "stale usage records purged"),
        Err(err) => warn!(error = %err, "usage purge failed"),
    }
}

/// Spawn the periodic sweeper.
pub fn spawn_sweeper(state: SharedState) -> JoinHandle<()> {
    let period = state.config().cleanup.sweep_interval;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            sweep(&state, SystemTime::now()).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        services::{
            completion_service::force_complete,
            game_service::{create_game, start_game},
            test_support::{create_request, pool_only_state},
        },
        state::identity::{GuestSlot, Identity},
    };

    const MINUTE: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn single_player_game_becomes_a_candidate_after_thirty_minutes() {
        let state = pool_only_state().await;
        let created_at = SystemTime::now();
        let created = create_game(&state, None, create_request(1, 5), created_at)
            .await
            .unwrap();

        let early = cleanup_status(&state, created_at + 29 * MINUTE)
            .await
            .unwrap();
        assert!(early.candidates.is_empty());

        let late = cleanup_status(&state, created_at + 31 * MINUTE)
            .await
            .unwrap();
        assert_eq!(late.candidates.len(), 1);
        assert_eq!(late.candidates[0].game_id, created.game.id);
        assert_eq!(late.candidates[0].reason, CleanupReason::Expired);
        assert_eq!(late.counts.expired, 1);
        assert_eq!(late.counts.total, 1);
    }

    #[tokio::test]
    async fn cleanup_deletes_candidates_and_is_idempotent() {
        let state = pool_only_state().await;
        let created_at = SystemTime::now();
        let created = create_game(&state, None, create_request(1, 5), created_at)
            .await
            .unwrap();
        let now = created_at + 31 * MINUTE;

        let swept = cleanup_expired(&state, now).await.unwrap();
        assert_eq!(swept.deleted, 1);
        assert_eq!(swept.game_ids, vec![created.game.id]);
        assert!(state.store().find_game(created.game.id).await.unwrap().is_none());

        let again = cleanup_expired(&state, now).await.unwrap();
        assert_eq!(again.deleted, 0);
    }

    #[tokio::test]
    async fn completed_games_are_kept_through_the_grace_period() {
        let state = pool_only_state().await;
        let now = SystemTime::now();
        let created = create_game(&state, None, create_request(3, 5), now)
            .await
            .unwrap();
        let game_id = created.game.id;
        let creator = Identity::Guest(GuestSlot::CREATOR);
        start_game(&state, game_id, creator, now).await.unwrap();
        force_complete(&state, game_id, creator, now).await.unwrap();

        let within = cleanup_status(&state, now + 9 * MINUTE).await.unwrap();
        assert!(within.candidates.is_empty());

        let after = cleanup_status(&state, now + 11 * MINUTE).await.unwrap();
        assert_eq!(after.counts.completed_aged, 1);
        assert_eq!(after.candidates[0].reason, CleanupReason::CompletedAged);
    }
}
