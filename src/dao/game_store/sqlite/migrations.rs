//! Versioned schema migrations.

use rusqlite::{Connection, params};
use tracing::{debug, info};

use super::error::{SqliteDaoError, SqliteResult};

/// A database migration.
struct Migration {
    /// Version number, sequential from 1.
    version: u32,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "games, participants, questions and answers",
        sql: r#"
            CREATE TABLE IF NOT EXISTS games (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                difficulty TEXT NOT NULL,
                creator_user_id INTEGER,
                max_players INTEGER NOT NULL CHECK (max_players >= 1),
                questions_per_game INTEGER NOT NULL CHECK (questions_per_game >= 1),
                time_per_question INTEGER NOT NULL,
                status TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                started_at INTEGER,
                completed_at INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_games_status ON games(status);
            CREATE INDEX IF NOT EXISTS idx_games_expires_at ON games(expires_at);

            CREATE TABLE IF NOT EXISTS participants (
                id TEXT PRIMARY KEY,
                game_id TEXT NOT NULL,
                user_id INTEGER,
                guest_slot INTEGER,
                display_name TEXT NOT NULL,
                is_creator INTEGER NOT NULL DEFAULT 0,
                score INTEGER NOT NULL DEFAULT 0,
                correct_answers INTEGER NOT NULL DEFAULT 0,
                finished_all_questions INTEGER NOT NULL DEFAULT 0,
                joined_at INTEGER NOT NULL,
                last_activity INTEGER NOT NULL,
                FOREIGN KEY (game_id) REFERENCES games(id) ON DELETE CASCADE,
                UNIQUE (game_id, user_id),
                UNIQUE (game_id, guest_slot),
                CHECK ((user_id IS NULL) <> (guest_slot IS NULL))
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_participants_single_creator
                ON participants(game_id) WHERE is_creator = 1;

            CREATE TABLE IF NOT EXISTS questions (
                id TEXT PRIMARY KEY,
                game_id TEXT NOT NULL,
                question_number INTEGER NOT NULL,
                question_text TEXT NOT NULL,
                correct_answer TEXT NOT NULL,
                options TEXT NOT NULL,
                source_reference TEXT NOT NULL,
                book TEXT NOT NULL,
                testament TEXT NOT NULL,
                difficulty TEXT NOT NULL,
                points INTEGER NOT NULL,
                source TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (game_id) REFERENCES games(id) ON DELETE CASCADE,
                UNIQUE (game_id, question_number),
                UNIQUE (game_id, source_reference)
            );

            CREATE TABLE IF NOT EXISTS answers (
                id TEXT PRIMARY KEY,
                game_id TEXT NOT NULL,
                participant_id TEXT NOT NULL,
                question_id TEXT NOT NULL,
                selected_answer TEXT NOT NULL,
                is_correct INTEGER NOT NULL,
                time_taken_ms INTEGER NOT NULL,
                points_awarded INTEGER NOT NULL,
                answered_at INTEGER NOT NULL,
                FOREIGN KEY (game_id) REFERENCES games(id) ON DELETE CASCADE,
                FOREIGN KEY (participant_id) REFERENCES participants(id) ON DELETE CASCADE,
                FOREIGN KEY (question_id) REFERENCES questions(id) ON DELETE CASCADE,
                UNIQUE (participant_id, question_id)
            );
        "#,
    },
    Migration {
        version: 2,
        description: "verse usage ledger and fallback pool",
        sql: r#"
            CREATE TABLE IF NOT EXISTS verse_usage (
                reference TEXT PRIMARY KEY,
                last_used INTEGER NOT NULL,
                frequency INTEGER NOT NULL DEFAULT 1
            );
            CREATE INDEX IF NOT EXISTS idx_verse_usage_last_used ON verse_usage(last_used);

            CREATE TABLE IF NOT EXISTS question_pool (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                question_text TEXT NOT NULL UNIQUE,
                correct_answer TEXT NOT NULL,
                incorrect_answers TEXT NOT NULL,
                source_reference TEXT NOT NULL,
                book TEXT NOT NULL,
                testament TEXT NOT NULL,
                difficulty TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_question_pool_difficulty ON question_pool(difficulty);
        "#,
    },
    Migration {
        version: 3,
        description: "leaderboard entries",
        sql: r#"
            CREATE TABLE IF NOT EXISTS leaderboard_entries (
                id TEXT PRIMARY KEY,
                game_id TEXT NOT NULL,
                game_name TEXT NOT NULL,
                difficulty TEXT NOT NULL,
                player_name TEXT NOT NULL,
                user_id INTEGER,
                score INTEGER NOT NULL,
                correct_answers INTEGER NOT NULL,
                total_questions INTEGER NOT NULL,
                completed_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_leaderboard_difficulty_score
                ON leaderboard_entries(difficulty, score DESC);
        "#,
    },
];

/// Apply every migration newer than the recorded schema version.
pub fn run_migrations(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL
        )",
    )
    .map_err(|source| SqliteDaoError::Migration {
        version: 0,
        description: "schema_migrations",
        source,
    })?;

    let current: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|source| SqliteDaoError::Migration {
            version: 0,
            description: "read schema version",
            source,
        })?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        let wrap = |source| SqliteDaoError::Migration {
            version: migration.version,
            description: migration.description,
            source,
        };
        conn.execute_batch(migration.sql).map_err(wrap)?;
        conn.execute(
            "INSERT INTO schema_migrations (version, description) VALUES (?1, ?2)",
            params![migration.version, migration.description],
        )
        .map_err(wrap)?;
        info!(
            version = migration.version,
            description = migration.description,
            "applied schema migration"
        );
    }

    debug!(current, latest = MIGRATIONS.len(), "schema up to date");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_sequential() {
        for (index, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(migration.version as usize, index + 1);
        }
    }

    #[test]
    fn running_twice_is_a_no_op() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let applied: u32 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(applied as usize, MIGRATIONS.len());
    }
}
