use std::path::PathBuf;

const DEFAULT_DATABASE_PATH: &str = "data/bible-games.sqlite3";

/// Where the SQLite database lives.
#[derive(Debug, Clone)]
pub enum SqliteConfig {
    File(PathBuf),
    /// Private in-memory database, used by tests.
    InMemory,
}

impl SqliteConfig {
    /// Read `DATABASE_PATH`, falling back to a file under `data/`.
    pub fn from_env() -> Self {
        let path = std::env::var_os("DATABASE_PATH")
            .map(PathBuf::from)
            .filter(|path| !path.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH));
        SqliteConfig::File(path)
    }
}
