//! In-memory [`ShortcutStore`] implementation for tests and runs without
//! a database.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock`. Mirrors the
//! SQLite triggers by hand: corpus totals grow on every click, and
//! deleting a shortcut deletes its clicks.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::Suggestion;

use super::{rank_hits, Click, ShortcutHit, ShortcutQuery, ShortcutStore};

struct ClickRow {
    intent_key: String,
    query: String,
    hit_time_ms: i64,
    corpus: String,
}

#[derive(Default)]
struct State {
    shortcuts: HashMap<String, Suggestion>,
    clicks: Vec<ClickRow>,
    totals: HashMap<String, i64>,
}

impl State {
    fn delete_shortcut(&mut self, intent_key: &str) {
        if self.shortcuts.remove(intent_key).is_some() {
            self.clicks.retain(|c| c.intent_key != intent_key);
        }
    }
}

/// In-memory click log.
#[derive(Default)]
pub struct InMemoryShortcutStore {
    state: RwLock<State>,
}

impl InMemoryShortcutStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ShortcutStore for InMemoryShortcutStore {
    async fn shortcuts_for_query(&self, query: &ShortcutQuery) -> Result<Option<Vec<ShortcutHit>>> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        let cutoff = query.cutoff_ms();
        let corpora: HashSet<&str> = query.corpora.iter().map(String::as_str).collect();

        let mut grouped: HashMap<&str, (i64, i64)> = HashMap::new();
        for click in state.clicks.iter().filter(|c| {
            c.hit_time_ms >= cutoff
                && corpora.contains(c.corpus.as_str())
                && query.matches_query(&c.query)
        }) {
            let entry = grouped.entry(click.intent_key.as_str()).or_insert((0, i64::MIN));
            entry.0 += 1;
            entry.1 = entry.1.max(click.hit_time_ms);
        }

        let hits: Vec<ShortcutHit> = grouped
            .into_iter()
            .filter_map(|(key, (hit_count, last_hit_ms))| {
                state.shortcuts.get(key).map(|s| ShortcutHit {
                    suggestion: s.clone(),
                    hit_count,
                    last_hit_ms,
                })
            })
            .collect();

        if hits.is_empty() {
            return Ok(None);
        }
        Ok(Some(rank_hits(hits, query)))
    }

    async fn record_click(&self, click: &Click) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let key = click.suggestion.intent_key();
        state
            .shortcuts
            .insert(key.clone(), click.suggestion.clone().as_shortcut());
        state.clicks.push(ClickRow {
            intent_key: key,
            query: click.query.clone(),
            hit_time_ms: click.hit_time_ms,
            corpus: click.corpus.clone(),
        });
        *state.totals.entry(click.corpus.clone()).or_insert(0) += 1;

        let cutoff = click.hit_time_ms - click.retention_ms;
        state.clicks.retain(|c| c.hit_time_ms >= cutoff);
        let live: HashSet<String> = state.clicks.iter().map(|c| c.intent_key.clone()).collect();
        state.shortcuts.retain(|key, _| live.contains(key));
        Ok(())
    }

    async fn update_shortcut(
        &self,
        source: &str,
        shortcut_id: &str,
        refreshed: Option<&Suggestion>,
    ) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let keys: Vec<String> = state
            .shortcuts
            .iter()
            .filter(|(_, s)| s.source == source && s.shortcut_id.as_deref() == Some(shortcut_id))
            .map(|(k, _)| k.clone())
            .collect();

        for key in keys {
            match refreshed {
                Some(row) => {
                    if let Some(stored) = state.shortcuts.get_mut(&key) {
                        stored.source_version = row.source_version;
                        stored.text1 = row.text1.clone();
                        stored.text2 = row.text2.clone();
                        stored.text2_url = row.text2_url.clone();
                        stored.icon1 = row.icon1.clone();
                        stored.icon2 = row.icon2.clone();
                        stored.log_type = row.log_type.clone();
                    }
                }
                None => state.delete_shortcut(&key),
            }
        }
        Ok(())
    }

    async fn corpus_scores(&self, min_clicks: i64) -> Result<HashMap<String, i64>> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        Ok(state
            .totals
            .iter()
            .filter(|(_, total)| **total >= min_clicks)
            .map(|(corpus, total)| (corpus.clone(), *total))
            .collect())
    }

    async fn delete_shortcut(&self, intent_key: &str) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.delete_shortcut(intent_key);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        *state = State::default();
        Ok(())
    }

    async fn has_history(&self) -> Result<bool> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        Ok(!state.clicks.is_empty())
    }
}
