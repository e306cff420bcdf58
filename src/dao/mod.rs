/// Persistence abstraction and its SQLite implementation.
pub mod game_store;
/// Persisted entities.
pub mod models;
/// Backend-independent storage errors.
pub mod storage;
