use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};
use std::{str::FromStr, time::Duration};

pub type DbPool = SqlitePool;

pub async fn create_pool(database_path: &str) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{database_path}"))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
}

pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// In-memory database for tests. A single connection keeps the database
/// alive, and disabled idle/lifetime timeouts stop the pool from dropping it
/// mid-test.
#[cfg(test)]
pub async fn memory_pool() -> DbPool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        // The acquire-time ping round-trips to SQLite's worker thread, which
        // a paused test clock auto-advances past, timing out the pool.
        .test_before_acquire(false)
        .connect("sqlite::memory:")
        .await
        .expect("open in-memory database");
    run_migrations(&pool).await.expect("run migrations");
    pool
}
