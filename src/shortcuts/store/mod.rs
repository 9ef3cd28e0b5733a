//! Storage abstraction for the click log.
//!
//! The [`ShortcutStore`] trait defines every persistence operation the
//! shortcut repository needs. Two backends implement identical
//! semantics: [`SqliteShortcutStore`](sqlite::SqliteShortcutStore) for
//! production and [`InMemoryShortcutStore`](memory::InMemoryShortcutStore)
//! for tests and database-less runs.
//!
//! Implementations must be `Send + Sync`; the repository calls reads from
//! arbitrary tasks and writes from its single log-writer task.

pub mod memory;
pub mod sqlite;

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::Suggestion;

use super::next_string;

/// Parameters of a historical-shortcuts lookup.
#[derive(Debug, Clone)]
pub struct ShortcutQuery {
    /// Prefix the click-log query must start with. Empty matches all.
    pub query: String,
    /// Only clicks made from these corpora count.
    pub corpora: Vec<String>,
    pub now_ms: i64,
    /// Clicks older than `now_ms - retention_ms` are ignored.
    pub retention_ms: i64,
    pub limit: usize,
}

impl ShortcutQuery {
    pub fn cutoff_ms(&self) -> i64 {
        self.now_ms - self.retention_ms
    }

    /// Half-open `[lower, upper)` range of click queries matching the prefix.
    pub fn query_range(&self) -> Option<(String, Option<String>)> {
        if self.query.is_empty() {
            None
        } else {
            Some((self.query.clone(), next_string(&self.query)))
        }
    }

    pub fn matches_query(&self, click_query: &str) -> bool {
        match self.query_range() {
            None => true,
            Some((lower, upper)) => {
                click_query >= lower.as_str()
                    && upper.map_or(true, |u| click_query < u.as_str())
            }
        }
    }
}

/// One click to log.
#[derive(Debug, Clone)]
pub struct Click {
    pub suggestion: Suggestion,
    /// User query the click was made for.
    pub query: String,
    /// Corpus the clicked suggestion belonged to.
    pub corpus: String,
    pub hit_time_ms: i64,
    pub retention_ms: i64,
}

/// A stored shortcut with its click statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct ShortcutHit {
    pub suggestion: Suggestion,
    pub hit_count: i64,
    pub last_hit_ms: i64,
}

impl ShortcutHit {
    pub fn intent_key(&self) -> String {
        self.suggestion.intent_key()
    }
}

/// Abstract click-log backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`shortcuts_for_query`](ShortcutStore::shortcuts_for_query) | Prefix-range read of ranked shortcuts |
/// | [`record_click`](ShortcutStore::record_click) | Upsert shortcut, append click, purge old clicks |
/// | [`update_shortcut`](ShortcutStore::update_shortcut) | Apply a refresh result |
/// | [`corpus_scores`](ShortcutStore::corpus_scores) | Aggregate clicks per corpus |
/// | [`delete_shortcut`](ShortcutStore::delete_shortcut) | Remove one shortcut and its clicks |
/// | [`clear`](ShortcutStore::clear) | Bulk delete everything |
#[async_trait]
pub trait ShortcutStore: Send + Sync {
    /// Ranked shortcuts, or `None` when no click matches at all.
    async fn shortcuts_for_query(&self, query: &ShortcutQuery) -> Result<Option<Vec<ShortcutHit>>>;

    async fn record_click(&self, click: &Click) -> Result<()>;

    /// Replace the display fields of `(source, shortcut_id)` rows, or
    /// delete them when `refreshed` is `None`.
    async fn update_shortcut(
        &self,
        source: &str,
        shortcut_id: &str,
        refreshed: Option<&Suggestion>,
    ) -> Result<()>;

    /// Lifetime click totals of corpora with at least `min_clicks`.
    async fn corpus_scores(&self, min_clicks: i64) -> Result<HashMap<String, i64>>;

    async fn delete_shortcut(&self, intent_key: &str) -> Result<()>;

    async fn clear(&self) -> Result<()>;

    async fn has_history(&self) -> Result<bool>;
}

/// Order shortcut hits and apply the limit.
///
/// The shortcut holding the globally most recent click always comes
/// first. The rest sort by `hit_count * recency`, where recency falls
/// linearly from 1000 for a click made now to 0 at the retention edge.
pub fn rank_hits(mut hits: Vec<ShortcutHit>, query: &ShortcutQuery) -> Vec<ShortcutHit> {
    let Some(latest) = hits.iter().map(|h| h.last_hit_ms).max() else {
        return hits;
    };
    let cutoff = query.cutoff_ms();
    let window = query.retention_ms.max(1);
    let score = |h: &ShortcutHit| h.hit_count * ((h.last_hit_ms - cutoff).max(0) * 1000 / window);

    hits.sort_by(|a, b| {
        (b.last_hit_ms == latest)
            .cmp(&(a.last_hit_ms == latest))
            .then_with(|| score(b).cmp(&score(a)))
            .then_with(|| b.last_hit_ms.cmp(&a.last_hit_ms))
            .then_with(|| a.intent_key().cmp(&b.intent_key()))
    });
    hits.truncate(query.limit);
    hits
}
