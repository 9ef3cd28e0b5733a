//! Config-defined corpora.
//!
//! Each `[corpora.<name>]` table becomes a one-source corpus whose source
//! matches its `items` by case-insensitive substring.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::{Config, CorpusConfig};
use crate::corpus::{Corpora, Corpus, Source, SourceCorpus};
use crate::error::SourceError;
use crate::models::Suggestion;

pub struct StaticSource {
    name: String,
    config: CorpusConfig,
}

impl StaticSource {
    pub fn new(name: impl Into<String>, config: CorpusConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }

    fn suggestion(&self, item: &str) -> Suggestion {
        Suggestion::new(&self.name, item)
            .with_text2(format!("from {}", self.name))
            .with_data(format!("{}/{}", self.name, item))
            .with_shortcut_id(item)
            .with_version(self.config.version)
    }

    async fn simulate_latency(&self) {
        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }
    }
}

#[async_trait]
impl Source for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> i64 {
        self.config.version
    }

    fn query_threshold(&self) -> usize {
        self.config.query_threshold
    }

    fn query_after_zero_results(&self) -> bool {
        self.config.query_after_zero_results
    }

    async fn query(&self, query: &str, limit: usize) -> Result<Vec<Suggestion>, SourceError> {
        self.simulate_latency().await;
        if self.config.fail {
            return Err(SourceError::failed(&self.name, "configured to fail"));
        }
        let needle = query.to_lowercase();
        Ok(self
            .config
            .items
            .iter()
            .filter(|item| item.to_lowercase().contains(&needle))
            .take(limit)
            .map(|item| self.suggestion(item))
            .collect())
    }

    /// A shortcut stays valid while its item is still listed.
    async fn refresh_shortcut(
        &self,
        shortcut_id: &str,
        _extra_data: Option<&str>,
    ) -> Result<Option<Suggestion>, SourceError> {
        if self.config.fail {
            return Err(SourceError::failed(&self.name, "configured to fail"));
        }
        Ok(self
            .config
            .items
            .iter()
            .find(|item| item.as_str() == shortcut_id)
            .map(|item| self.suggestion(item)))
    }
}

/// Register every configured corpus, in name order.
pub fn build_corpora(config: &Config) -> Corpora {
    let corpora = Corpora::new();
    for (name, corpus_config) in &config.corpora {
        let source = Arc::new(StaticSource::new(name, corpus_config.clone()));
        let corpus = SourceCorpus::single(source)
            .web(corpus_config.web)
            .default_enabled(corpus_config.default_enabled);
        corpora.register(Arc::new(corpus));
    }
    corpora
}

pub fn list_corpora(config: &Config) -> Result<()> {
    let corpora = build_corpora(config);
    if corpora.is_empty() {
        println!("No corpora configured. Add [corpora.<name>] tables to the config.");
        return Ok(());
    }

    println!(
        "{:<16} {:<8} {:<8} {:<10} ITEMS",
        "CORPUS", "DEFAULT", "WEB", "THRESHOLD"
    );
    for corpus in corpora.all() {
        let items = config
            .corpora
            .get(corpus.name())
            .map_or(0, |c| c.items.len());
        println!(
            "{:<16} {:<8} {:<8} {:<10} {}",
            corpus.name(),
            corpus.is_default_enabled(),
            corpus.is_web_corpus(),
            corpus.query_threshold(),
            items
        );
    }
    Ok(())
}
