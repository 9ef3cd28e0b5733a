//! SQLite pool for the click log.

use anyhow::{Context, Result};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::Path;
use std::str::FromStr;

use crate::config::{Config, DbConfig};

pub async fn connect(config: &Config) -> Result<SqlitePool> {
    connect_with(&config.db).await
}

/// Open the database at `db_path` with default pool settings.
pub async fn connect_path(db_path: &Path) -> Result<SqlitePool> {
    connect_with(&DbConfig::at(db_path)).await
}

pub async fn connect_with(db: &DbConfig) -> Result<SqlitePool> {
    if let Some(parent) = db.path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create database directory: {}", parent.display()))?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db.path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(db.busy_timeout());

    let pool = SqlitePoolOptions::new()
        .max_connections(db.max_connections)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open click log: {}", db.path.display()))?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pool_uses_wal_and_busy_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = DbConfig::at(dir.path().join("qs.db"));
        db.busy_timeout_ms = 1_234;
        let pool = connect_with(&db).await.unwrap();

        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(mode, "wal");
        let timeout: i64 = sqlx::query_scalar("PRAGMA busy_timeout")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(timeout, 1_234);
    }
}
