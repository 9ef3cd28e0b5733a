//! SQLite-backed [`ShortcutStore`] implementation.
//!
//! Statements are assembled from the column descriptors in
//! [`schema`](crate::shortcuts::schema). Corpus totals and the click
//! cascade on shortcut delete are maintained by triggers created in
//! [`run_migrations`](crate::migrate::run_migrations).

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool};

use crate::models::Suggestion;
use crate::shortcuts::schema::{
    self, decode_shortcut, encode_shortcut, SqlType, Value, CLICKLOG, REFRESHABLE_COLUMNS,
    SHORTCUTS,
};

use super::{rank_hits, Click, ShortcutHit, ShortcutQuery, ShortcutStore};

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

fn bind_value(query: SqliteQuery<'_>, value: Value) -> SqliteQuery<'_> {
    match value {
        Value::Text(text) => query.bind(text),
        Value::Integer(int) => query.bind(int),
    }
}

fn read_shortcut(row: &SqliteRow) -> Result<Suggestion> {
    let mut values = Vec::with_capacity(SHORTCUTS.columns.len());
    for column in SHORTCUTS.columns {
        let value = match column.ty {
            SqlType::Text => Value::Text(row.try_get::<Option<String>, _>(column.name)?),
            SqlType::Integer => Value::Integer(row.try_get::<i64, _>(column.name)?),
        };
        values.push((column.name, value));
    }
    Ok(decode_shortcut(values))
}

/// SQLite click log over a [`SqlitePool`].
pub struct SqliteShortcutStore {
    pool: SqlitePool,
}

impl SqliteShortcutStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl ShortcutStore for SqliteShortcutStore {
    async fn shortcuts_for_query(&self, query: &ShortcutQuery) -> Result<Option<Vec<ShortcutHit>>> {
        if query.corpora.is_empty() {
            return Ok(None);
        }

        let mut sql = format!(
            "SELECT {}, COUNT({c}.id) AS hit_count, MAX({c}.hit_time) AS last_hit \
             FROM {c} JOIN {s} ON {s}.intent_key = {c}.intent_key \
             WHERE {c}.hit_time >= ? AND {c}.corpus IN ({})",
            SHORTCUTS.column_list(true),
            vec!["?"; query.corpora.len()].join(", "),
            c = CLICKLOG.name,
            s = SHORTCUTS.name,
        );
        let range = query.query_range();
        if let Some((_, upper)) = &range {
            sql.push_str(" AND clicklog.query >= ?");
            if upper.is_some() {
                sql.push_str(" AND clicklog.query < ?");
            }
        }
        sql.push_str(" GROUP BY clicklog.intent_key");

        let mut q = sqlx::query(&sql).bind(query.cutoff_ms());
        for corpus in &query.corpora {
            q = q.bind(corpus);
        }
        if let Some((lower, upper)) = range {
            q = q.bind(lower);
            if let Some(upper) = upper {
                q = q.bind(upper);
            }
        }

        let rows = q.fetch_all(&self.pool).await?;
        if rows.is_empty() {
            return Ok(None);
        }

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            hits.push(ShortcutHit {
                suggestion: read_shortcut(row)?,
                hit_count: row.try_get("hit_count")?,
                last_hit_ms: row.try_get("last_hit")?,
            });
        }
        Ok(Some(rank_hits(hits, query)))
    }

    async fn record_click(&self, click: &Click) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let updates: Vec<String> = SHORTCUTS
            .columns
            .iter()
            .filter(|c| c.name != "intent_key")
            .map(|c| format!("{0} = excluded.{0}", c.name))
            .collect();
        let upsert = format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT(intent_key) DO UPDATE SET {}",
            SHORTCUTS.name,
            SHORTCUTS.column_list(false),
            SHORTCUTS.placeholders(),
            updates.join(", ")
        );
        let mut q = sqlx::query(&upsert);
        for value in encode_shortcut(&click.suggestion) {
            q = bind_value(q, value);
        }
        q.execute(&mut *tx).await?;

        sqlx::query("INSERT INTO clicklog (intent_key, query, hit_time, corpus) VALUES (?, ?, ?, ?)")
            .bind(click.suggestion.intent_key())
            .bind(&click.query)
            .bind(click.hit_time_ms)
            .bind(&click.corpus)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM clicklog WHERE hit_time < ?")
            .bind(click.hit_time_ms - click.retention_ms)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "DELETE FROM shortcuts WHERE intent_key NOT IN (SELECT DISTINCT intent_key FROM clicklog)",
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn update_shortcut(
        &self,
        source: &str,
        shortcut_id: &str,
        refreshed: Option<&Suggestion>,
    ) -> Result<()> {
        match refreshed {
            Some(row) => {
                let assignments: Vec<String> = REFRESHABLE_COLUMNS
                    .iter()
                    .map(|c| format!("{} = ?", c))
                    .collect();
                let sql = format!(
                    "UPDATE shortcuts SET {} WHERE source = ? AND shortcut_id = ?",
                    assignments.join(", ")
                );
                let mut q = sqlx::query(&sql);
                for column in REFRESHABLE_COLUMNS {
                    if let Some(field) = schema::field(column) {
                        q = bind_value(q, (field.get)(row));
                    }
                }
                q.bind(source).bind(shortcut_id).execute(&self.pool).await?;
            }
            None => {
                sqlx::query("DELETE FROM shortcuts WHERE source = ? AND shortcut_id = ?")
                    .bind(source)
                    .bind(shortcut_id)
                    .execute(&self.pool)
                    .await?;
            }
        }
        Ok(())
    }

    async fn corpus_scores(&self, min_clicks: i64) -> Result<HashMap<String, i64>> {
        let rows = sqlx::query("SELECT corpus, total_clicks FROM sourcetotals WHERE total_clicks >= ?")
            .bind(min_clicks)
            .fetch_all(&self.pool)
            .await?;

        let mut scores = HashMap::with_capacity(rows.len());
        for row in rows {
            scores.insert(row.try_get("corpus")?, row.try_get("total_clicks")?);
        }
        Ok(scores)
    }

    async fn delete_shortcut(&self, intent_key: &str) -> Result<()> {
        sqlx::query("DELETE FROM shortcuts WHERE intent_key = ?")
            .bind(intent_key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for table in schema::TABLES {
            sqlx::query(&format!("DELETE FROM {}", table.name))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn has_history(&self) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM clicklog)")
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, migrate};

    const DAY: i64 = 24 * 60 * 60 * 1000;

    async fn open() -> (tempfile::TempDir, SqliteShortcutStore) {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::connect_path(&dir.path().join("shortcuts.db")).await.unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        (dir, SqliteShortcutStore::new(pool))
    }

    fn click(text: &str, query: &str, corpus: &str, at: i64) -> Click {
        Click {
            suggestion: Suggestion::new(corpus, text)
                .with_text2("subtitle")
                .with_data(format!("{}://{}", corpus, text))
                .with_shortcut_id(text)
                .with_version(2),
            query: query.to_string(),
            corpus: corpus.to_string(),
            hit_time_ms: at,
            retention_ms: 30 * DAY,
        }
    }

    fn lookup(query: &str, corpora: &[&str], now: i64) -> ShortcutQuery {
        ShortcutQuery {
            query: query.to_string(),
            corpora: corpora.iter().map(|c| c.to_string()).collect(),
            now_ms: now,
            retention_ms: 30 * DAY,
            limit: 10,
        }
    }

    #[tokio::test]
    async fn test_click_round_trips_display_fields() {
        let (_dir, store) = open().await;
        store.record_click(&click("maps", "ma", "apps", DAY)).await.unwrap();

        let hits = store
            .shortcuts_for_query(&lookup("m", &["apps"], DAY))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hits.len(), 1);
        let s = &hits[0].suggestion;
        assert_eq!(s.text1, "maps");
        assert_eq!(s.text2.as_deref(), Some("subtitle"));
        assert_eq!(s.source_version, 2);
        assert_eq!(s.shortcut_id.as_deref(), Some("maps"));
        assert!(s.is_shortcut);
        assert_eq!(hits[0].hit_count, 1);
        assert_eq!(hits[0].last_hit_ms, DAY);
    }

    #[tokio::test]
    async fn test_prefix_range_excludes_neighbours() {
        let (_dir, store) = open().await;
        store.record_click(&click("one", "ab", "apps", DAY)).await.unwrap();
        store.record_click(&click("two", "abz", "apps", DAY + 1)).await.unwrap();
        store.record_click(&click("three", "ac", "apps", DAY + 2)).await.unwrap();
        store.record_click(&click("four", "aa", "apps", DAY + 3)).await.unwrap();

        let hits = store
            .shortcuts_for_query(&lookup("ab", &["apps"], DAY + 3))
            .await
            .unwrap()
            .unwrap();
        let mut texts: Vec<&str> = hits.iter().map(|h| h.suggestion.text1.as_str()).collect();
        texts.sort();
        assert_eq!(texts, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_totals_trigger_and_retention_purge() {
        let (_dir, store) = open().await;
        store.record_click(&click("old", "o", "apps", DAY)).await.unwrap();
        store.record_click(&click("bob", "b", "contacts", 40 * DAY)).await.unwrap();

        assert!(store
            .shortcuts_for_query(&lookup("o", &["apps"], 40 * DAY))
            .await
            .unwrap()
            .is_none());
        let scores = store.corpus_scores(1).await.unwrap();
        assert_eq!(scores.get("apps"), Some(&1));
        assert_eq!(scores.get("contacts"), Some(&1));
    }

    #[tokio::test]
    async fn test_refresh_delete_cascades_clicks() {
        let (_dir, store) = open().await;
        store.record_click(&click("maps", "m", "apps", DAY)).await.unwrap();

        let renamed = Suggestion::new("apps", "Maps (new)").with_version(9);
        store
            .update_shortcut("apps", "maps", Some(&renamed))
            .await
            .unwrap();
        let hits = store
            .shortcuts_for_query(&lookup("m", &["apps"], DAY))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hits[0].suggestion.text1, "Maps (new)");
        assert_eq!(hits[0].suggestion.source_version, 9);
        assert_eq!(hits[0].suggestion.intent.data.as_deref(), Some("apps://maps"));

        store.update_shortcut("apps", "maps", None).await.unwrap();
        assert!(!store.has_history().await.unwrap());
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let (_dir, store) = open().await;
        store.record_click(&click("maps", "m", "apps", DAY)).await.unwrap();
        assert!(store.has_history().await.unwrap());
        store.clear().await.unwrap();
        assert!(!store.has_history().await.unwrap());
        assert!(store.corpus_scores(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_repeated_clicks_upsert_one_shortcut() {
        let (_dir, store) = open().await;
        store.record_click(&click("maps", "m", "apps", DAY)).await.unwrap();
        store.record_click(&click("maps", "ma", "apps", DAY + 5)).await.unwrap();
        let hits = store
            .shortcuts_for_query(&lookup("m", &["apps"], DAY + 5))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].hit_count, 2);
        assert_eq!(hits[0].last_hit_ms, DAY + 5);
    }
}
