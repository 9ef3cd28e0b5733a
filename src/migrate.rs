use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::shortcuts::schema::{
    CLICKLOG_INSERT_TRIGGER, INDEXES, SHORTCUTS_DELETE_TRIGGER, TABLES,
};

/// Create the click-log tables, triggers and indexes. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    for table in TABLES {
        sqlx::query(&table.create_sql())
            .execute(pool)
            .await
            .with_context(|| format!("Failed to create table {}", table.name))?;
    }

    // Triggers keep sourcetotals and clicklog consistent with inserts/deletes
    sqlx::query(CLICKLOG_INSERT_TRIGGER).execute(pool).await?;
    sqlx::query(SHORTCUTS_DELETE_TRIGGER).execute(pool).await?;

    for index in INDEXES {
        sqlx::query(index).execute(pool).await?;
    }

    Ok(())
}
