//! Implementations of the `qs` subcommands.
//!
//! Every command opens the click-log database, wires a
//! [`SuggestionsProvider`] from the config and closes it before
//! returning, so queued click-log writes are always flushed.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::config::Config;
use crate::cursor::SuggestionCursor;
use crate::db;
use crate::migrate;
use crate::models::Suggestion;
use crate::provider::SuggestionsProvider;
use crate::shortcuts::store::sqlite::SqliteShortcutStore;
use crate::sources;

pub async fn run_init(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::run_migrations(&pool).await?;
    pool.close().await;
    println!("Database initialized successfully.");
    Ok(())
}

async fn open_provider(config: &Config) -> Result<SuggestionsProvider> {
    let pool = db::connect(config)
        .await
        .with_context(|| format!("Failed to open database {}", config.db.path.display()))?;
    migrate::run_migrations(&pool).await?;
    let corpora = Arc::new(sources::build_corpora(config));
    let store = Arc::new(SqliteShortcutStore::new(pool));
    Ok(SuggestionsProvider::from_config(config, corpora, store))
}

#[derive(Serialize)]
struct PromotedRow<'a> {
    position: usize,
    source: &'a str,
    text1: &'a str,
    text2: Option<&'a str>,
    shortcut: bool,
}

fn print_rows(rows: &[Suggestion], json: bool) -> Result<()> {
    if json {
        let out: Vec<PromotedRow> = rows
            .iter()
            .enumerate()
            .map(|(position, s)| PromotedRow {
                position,
                source: &s.source,
                text1: &s.text1,
                text2: s.text2.as_deref(),
                shortcut: s.is_shortcut,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No suggestions.");
        return Ok(());
    }
    for (position, s) in rows.iter().enumerate() {
        let marker = if s.is_shortcut { "*" } else { " " };
        println!("{:>2}.{} {:<32} [{}]", position, marker, s.text1, s.source);
    }
    Ok(())
}

async fn promoted_for(
    provider: &mut SuggestionsProvider,
    query: &str,
    corpus: Option<&str>,
    wait: Duration,
) -> Vec<Suggestion> {
    provider.start_query_in(query, corpus).await;
    if !provider.wait_until_done(wait).await {
        tracing::warn!(query, "not every corpus answered in time");
    }
    provider
        .promoted()
        .map(|p| p.iter().cloned().collect())
        .unwrap_or_default()
}

pub async fn run_query(
    config: &Config,
    query: &str,
    corpus: Option<&str>,
    wait: Duration,
    json: bool,
) -> Result<()> {
    let mut provider = open_provider(config).await?;
    if let Some(name) = corpus {
        if provider.corpora().corpus(name).is_none() {
            provider.close().await;
            anyhow::bail!("Unknown corpus: '{}'", name);
        }
    }
    let rows = promoted_for(&mut provider, query, corpus, wait).await;
    provider.close().await;
    print_rows(&rows, json)
}

pub async fn run_click(config: &Config, query: &str, position: usize, wait: Duration) -> Result<()> {
    let mut provider = open_provider(config).await?;
    promoted_for(&mut provider, query, None, wait).await;
    let clicked = provider.report_click(position);
    provider.close().await;

    match clicked {
        Some(s) => {
            println!("Recorded click on '{}' ({}) for query '{}'.", s.text1, s.source, query);
            Ok(())
        }
        None => anyhow::bail!("No promoted suggestion at position {} for '{}'", position, query),
    }
}

pub async fn run_shortcuts(config: &Config, query: &str, json: bool) -> Result<()> {
    let mut provider = open_provider(config).await?;
    provider.start_query(query).await;
    let rows: Vec<Suggestion> = provider
        .current()
        .and_then(|s| s.shortcuts())
        .map(|c| (0..c.count()).map(|i| c.suggestion_at(i).clone()).collect())
        .unwrap_or_default();
    provider.close().await;

    if rows.is_empty() && !json {
        println!("No shortcuts.");
        return Ok(());
    }
    print_rows(&rows, json)
}

pub async fn run_history_clear(config: &Config) -> Result<()> {
    let mut provider = open_provider(config).await?;
    provider.repository().clear_history();
    provider.close().await;
    println!("Click history cleared.");
    Ok(())
}

pub async fn run_history_status(config: &Config) -> Result<()> {
    let mut provider = open_provider(config).await?;
    let has_history = provider.repository().has_history().await;
    let scores = provider.repository().corpus_scores(1).await;
    provider.close().await;

    println!("history: {}", if has_history { "yes" } else { "no" });
    let mut scores: Vec<(String, i64)> = scores.into_iter().collect();
    scores.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    for (corpus, clicks) in scores {
        println!("  {:<16} {}", corpus, clicks);
    }
    Ok(())
}
