use thiserror::Error;

use crate::dao::models::GameStatus;

/// Events that move a game between statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    /// The creator started the game and its questions are stored.
    Start,
    /// A poll saw every question persisted, or the first answer arrived.
    ItemsReady,
    /// Completion protocol: everyone finished, or the game was forced.
    Complete,
    /// The game outlived `expires_at`.
    Expire,
    /// The last participant left.
    Cancel,
}

impl GameEvent {
    /// Statuses the event may be applied from.
    pub fn sources(self) -> &'static [GameStatus] {
        match self {
            GameEvent::Start => &[GameStatus::Created],
            GameEvent::ItemsReady => &[GameStatus::Starting],
            GameEvent::Complete => &[GameStatus::Starting, GameStatus::InProgress],
            GameEvent::Expire | GameEvent::Cancel => &[
                GameStatus::Created,
                GameStatus::Starting,
                GameStatus::InProgress,
            ],
        }
    }

    /// Status reached after the event.
    pub fn target(self) -> GameStatus {
        match self {
            GameEvent::Start => GameStatus::Starting,
            GameEvent::ItemsReady => GameStatus::InProgress,
            GameEvent::Complete => GameStatus::Completed,
            GameEvent::Expire => GameStatus::Expired,
            GameEvent::Cancel => GameStatus::Cancelled,
        }
    }
}

/// Why a game with unfinished players is considered stuck.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadlock {
    /// Somebody finished and every unfinished player went quiet.
    Abandoned,
    /// The game is about to expire.
    NearExpiry,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("game is {from}; cannot apply {event:?}")]
pub struct InvalidTransition {
    /// The status the game was in when the event was received.
    pub from: GameStatus,
    /// The event that cannot be applied from this status.
    pub event: GameEvent,
}

/// Compute the status reached by applying `event` to a game in `from`.
pub fn compute_transition(from: GameStatus, event: GameEvent) -> Result<GameStatus, InvalidTransition> {
    if event.sources().contains(&from) {
        Ok(event.target())
    } else {
        Err(InvalidTransition { from, event })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [GameStatus; 6] = [
        GameStatus::Created,
        GameStatus::Starting,
        GameStatus::InProgress,
        GameStatus::Completed,
        GameStatus::Cancelled,
        GameStatus::Expired,
    ];

    const EVENTS: [GameEvent; 5] = [
        GameEvent::Start,
        GameEvent::ItemsReady,
        GameEvent::Complete,
        GameEvent::Expire,
        GameEvent::Cancel,
    ];

    #[test]
    fn full_happy_path_through_game() {
        let mut status = GameStatus::Created;
        for event in [GameEvent::Start, GameEvent::ItemsReady, GameEvent::Complete] {
            status = compute_transition(status, event).unwrap();
        }
        assert_eq!(status, GameStatus::Completed);
    }

    #[test]
    fn completion_is_allowed_straight_from_starting() {
        assert_eq!(
            compute_transition(GameStatus::Starting, GameEvent::Complete),
            Ok(GameStatus::Completed)
        );
    }

    #[test]
    fn terminal_statuses_accept_no_event() {
        for from in [GameStatus::Completed, GameStatus::Cancelled, GameStatus::Expired] {
            for event in EVENTS {
                assert_eq!(
                    compute_transition(from, event),
                    Err(InvalidTransition { from, event })
                );
            }
        }
    }

    #[test]
    fn start_only_from_created() {
        for from in ALL {
            let result = compute_transition(from, GameEvent::Start);
            assert_eq!(result.is_ok(), from == GameStatus::Created, "{from}");
        }
    }

    #[test]
    fn transitions_never_go_backwards() {
        let rank = |status: GameStatus| match status {
            GameStatus::Created => 0,
            GameStatus::Starting => 1,
            GameStatus::InProgress => 2,
            _ => 3,
        };
        for from in ALL {
            for event in EVENTS {
                if let Ok(to) = compute_transition(from, event) {
                    assert!(rank(to) > rank(from), "{from} -> {to}");
                }
            }
        }
    }
}
