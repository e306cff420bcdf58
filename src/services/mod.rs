/// Completion and deadlock detection.
pub mod completion_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Expired and aged game reclamation.
pub mod expiration_service;
/// Game lifecycle: creation, admission, start-up, answers and results.
pub mod game_service;
/// Health check service.
pub mod health_service;

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::{
        config::AppConfig,
        dao::{
            game_store::{GameStore, sqlite::SqliteGameStore},
            models::Difficulty,
        },
        dto::game::CreateGameRequest,
        generation::{pipeline::PipelineConfig, pool::builtin_pool},
        state::{AppState, SharedState},
    };

    /// State over an in-memory store seeded with the built-in pool and no generator.
    pub async fn pool_only_state() -> SharedState {
        let store = SqliteGameStore::open_in_memory().unwrap();
        store.seed_pool(builtin_pool()).await.unwrap();
        let config = AppConfig {
            pipeline: PipelineConfig {
                rng_seed: Some(7),
                ..PipelineConfig::default()
            },
            ..AppConfig::default()
        };
        AppState::new(Arc::new(store), None, config)
    }

    pub fn create_request(max_players: u32, questions_per_game: u32) -> CreateGameRequest {
        CreateGameRequest {
            name: "Quiz A".into(),
            difficulty: Difficulty::Easy,
            max_players,
            questions_per_game,
            time_per_question: 30,
            player_name: "Ann".into(),
        }
    }
}
