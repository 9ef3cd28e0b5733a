//! Sources, corpora, and the corpus registry.
//!
//! A [`Source`] is one queryable capability (an app index, the contacts
//! list, a web suggest endpoint). A [`Corpus`] groups one or more sources
//! into a logical search domain; corpora are what the pipeline queries,
//! ranks, and suppresses.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │                 Corpora                  │
//! │  ┌─────────┐ ┌─────────┐ ┌────────────┐  │
//! │  │  web    │ │  apps   │ │  contacts  │  │
//! │  │(1 src)  │ │(1 src)  │ │ (n srcs)   │  │
//! │  └─────────┘ └─────────┘ └────────────┘  │
//! └──────────────┬───────────────────────────┘
//!                ▼
//!      QueryTask → CorpusResult → Suggestions
//! ```

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::warn;

use crate::cursor::{DataSetObserver, ListSuggestionCursor, SuggestionCursor};
use crate::error::SourceError;
use crate::models::Suggestion;

/// A queryable suggestion source.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use quicksearch::corpus::Source;
/// use quicksearch::error::SourceError;
/// use quicksearch::models::Suggestion;
///
/// pub struct Greetings;
///
/// #[async_trait]
/// impl Source for Greetings {
///     fn name(&self) -> &str { "greetings" }
///
///     async fn query(&self, query: &str, _limit: usize) -> Result<Vec<Suggestion>, SourceError> {
///         Ok(vec![Suggestion::new("greetings", format!("hello {}", query))])
///     }
/// }
/// ```
#[async_trait]
pub trait Source: Send + Sync {
    /// Unique source identity.
    fn name(&self) -> &str;

    /// Version stamp, stored alongside shortcuts made from this source.
    fn version(&self) -> i64 {
        0
    }

    /// Queries shorter than this (in characters) are not sent to the source.
    fn query_threshold(&self) -> usize {
        0
    }

    /// Whether to keep querying after a narrower query returned nothing.
    fn query_after_zero_results(&self) -> bool {
        false
    }

    /// Run a query. `limit` is advisory.
    ///
    /// Must not block indefinitely. Errors are treated as an empty result.
    async fn query(&self, query: &str, limit: usize) -> Result<Vec<Suggestion>, SourceError>;

    /// Re-validate a stored shortcut.
    ///
    /// `Ok(None)` means the shortcut is no longer valid.
    async fn refresh_shortcut(
        &self,
        _shortcut_id: &str,
        _extra_data: Option<&str>,
    ) -> Result<Option<Suggestion>, SourceError> {
        Ok(None)
    }
}

/// A named, orderable group of sources: one logical search domain.
#[async_trait]
pub trait Corpus: Send + Sync {
    fn name(&self) -> &str;

    fn sources(&self) -> &[Arc<dyn Source>];

    /// The web corpus is queried even for the empty query.
    fn is_web_corpus(&self) -> bool;

    fn is_default_enabled(&self) -> bool;

    fn query_threshold(&self) -> usize {
        self.sources()
            .iter()
            .map(|s| s.query_threshold())
            .min()
            .unwrap_or(0)
    }

    fn query_after_zero_results(&self) -> bool {
        self.sources().iter().any(|s| s.query_after_zero_results())
    }

    /// Query every source of the corpus and return the merged rows.
    async fn query(&self, query: &str, limit: usize) -> Result<Vec<Suggestion>, SourceError>;
}

/// The standard [`Corpus`]: one or more sources queried concurrently.
///
/// Rows are concatenated in source order. A failing source contributes
/// nothing; the corpus only fails when every source fails.
pub struct SourceCorpus {
    name: String,
    sources: Vec<Arc<dyn Source>>,
    web: bool,
    default_enabled: bool,
}

impl SourceCorpus {
    pub fn new(name: impl Into<String>, sources: Vec<Arc<dyn Source>>) -> Self {
        Self {
            name: name.into(),
            sources,
            web: false,
            default_enabled: true,
        }
    }

    /// Corpus wrapping a single source, named after it.
    pub fn single(source: Arc<dyn Source>) -> Self {
        let name = source.name().to_string();
        Self::new(name, vec![source])
    }

    pub fn web(mut self, web: bool) -> Self {
        self.web = web;
        self
    }

    pub fn default_enabled(mut self, default_enabled: bool) -> Self {
        self.default_enabled = default_enabled;
        self
    }
}

#[async_trait]
impl Corpus for SourceCorpus {
    fn name(&self) -> &str {
        &self.name
    }

    fn sources(&self) -> &[Arc<dyn Source>] {
        &self.sources
    }

    fn is_web_corpus(&self) -> bool {
        self.web
    }

    fn is_default_enabled(&self) -> bool {
        self.default_enabled
    }

    async fn query(&self, query: &str, limit: usize) -> Result<Vec<Suggestion>, SourceError> {
        if let [source] = self.sources.as_slice() {
            return source.query(query, limit).await;
        }

        let outcomes = join_all(self.sources.iter().map(|s| s.query(query, limit))).await;
        let mut rows = Vec::new();
        let mut failures = 0;
        for (source, outcome) in self.sources.iter().zip(outcomes) {
            match outcome {
                Ok(mut found) => rows.append(&mut found),
                Err(e) => {
                    failures += 1;
                    warn!(corpus = %self.name, source = source.name(), error = %e, "source query failed");
                }
            }
        }

        if failures > 0 && failures == self.sources.len() {
            return Err(SourceError::CorpusUnavailable {
                corpus: self.name.clone(),
                count: failures,
            });
        }
        Ok(rows)
    }
}

/// The results of one corpus for one query, with the query latency.
pub struct CorpusResult {
    corpus: Arc<dyn Corpus>,
    cursor: ListSuggestionCursor,
    latency: Duration,
}

impl CorpusResult {
    pub fn new(
        corpus: Arc<dyn Corpus>,
        user_query: impl Into<String>,
        rows: Vec<Suggestion>,
        latency: Duration,
    ) -> Self {
        Self {
            corpus,
            cursor: ListSuggestionCursor::from_rows(user_query, rows),
            latency,
        }
    }

    pub fn corpus(&self) -> &Arc<dyn Corpus> {
        &self.corpus
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }

    pub fn rows(&self) -> &[Suggestion] {
        self.cursor.rows()
    }
}

impl SuggestionCursor for CorpusResult {
    fn user_query(&self) -> &str {
        self.cursor.user_query()
    }

    fn count(&self) -> usize {
        self.cursor.count()
    }

    fn suggestion_at(&self, position: usize) -> &Suggestion {
        self.cursor.suggestion_at(position)
    }

    fn position(&self) -> usize {
        self.cursor.position()
    }

    fn move_to(&mut self, position: usize) -> bool {
        self.cursor.move_to(position)
    }

    fn close(&mut self) {
        self.cursor.close()
    }

    fn is_closed(&self) -> bool {
        self.cursor.is_closed()
    }

    fn register_observer(&mut self, observer: Arc<dyn DataSetObserver>) {
        self.cursor.register_observer(observer)
    }

    fn unregister_observer(&mut self, observer: &Arc<dyn DataSetObserver>) {
        self.cursor.unregister_observer(observer)
    }
}

impl std::fmt::Debug for CorpusResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorpusResult")
            .field("corpus", &self.corpus.name())
            .field("cursor", &self.cursor)
            .field("latency", &self.latency)
            .finish()
    }
}

struct Entry {
    corpus: Arc<dyn Corpus>,
    enabled: bool,
}

/// Registry of corpora in registration order.
///
/// Resolves source names to their sources and owning corpora and tracks
/// which corpora are enabled.
#[derive(Default)]
pub struct Corpora {
    entries: RwLock<Vec<Entry>>,
}

impl Corpora {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a corpus, enabled. Re-registering a name replaces it.
    pub fn register(&self, corpus: Arc<dyn Corpus>) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.retain(|e| e.corpus.name() != corpus.name());
        entries.push(Entry {
            corpus,
            enabled: true,
        });
    }

    pub fn set_enabled(&self, name: &str, enabled: bool) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        match entries.iter_mut().find(|e| e.corpus.name() == name) {
            Some(entry) => {
                entry.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn corpus(&self, name: &str) -> Option<Arc<dyn Corpus>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .iter()
            .find(|e| e.corpus.name() == name)
            .map(|e| e.corpus.clone())
    }

    /// All corpora in registration order.
    pub fn all(&self) -> Vec<Arc<dyn Corpus>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.iter().map(|e| e.corpus.clone()).collect()
    }

    /// Enabled corpora in registration order.
    pub fn enabled_corpora(&self) -> Vec<Arc<dyn Corpus>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .iter()
            .filter(|e| e.enabled)
            .map(|e| e.corpus.clone())
            .collect()
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .iter()
            .any(|e| e.enabled && e.corpus.name() == name)
    }

    /// The corpus owning the named source.
    pub fn corpus_for_source(&self, source: &str) -> Option<Arc<dyn Corpus>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .iter()
            .find(|e| e.corpus.sources().iter().any(|s| s.name() == source))
            .map(|e| e.corpus.clone())
    }

    pub fn source(&self, name: &str) -> Option<Arc<dyn Source>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .iter()
            .flat_map(|e| e.corpus.sources().iter())
            .find(|s| s.name() == name)
            .cloned()
    }

    pub fn web_corpus(&self) -> Option<Arc<dyn Corpus>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .iter()
            .find(|e| e.corpus.is_web_corpus())
            .map(|e| e.corpus.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Source returning fixed rows, optionally failing.
    pub(crate) struct FixedSource {
        pub name: String,
        pub rows: Vec<String>,
        pub fail: bool,
        pub threshold: usize,
    }

    impl FixedSource {
        pub(crate) fn new(name: &str, rows: &[&str]) -> Self {
            Self {
                name: name.to_string(),
                rows: rows.iter().map(|r| r.to_string()).collect(),
                fail: false,
                threshold: 0,
            }
        }
    }

    #[async_trait]
    impl Source for FixedSource {
        fn name(&self) -> &str {
            &self.name
        }

        fn query_threshold(&self) -> usize {
            self.threshold
        }

        async fn query(&self, _query: &str, limit: usize) -> Result<Vec<Suggestion>, SourceError> {
            if self.fail {
                return Err(SourceError::failed(&self.name, "boom"));
            }
            Ok(self
                .rows
                .iter()
                .take(limit)
                .map(|r| Suggestion::new(&self.name, r.clone()).with_data(format!("{}/{}", self.name, r)))
                .collect())
        }
    }

    #[tokio::test]
    async fn test_multi_source_corpus_concatenates_in_source_order() {
        let corpus = SourceCorpus::new(
            "people",
            vec![
                Arc::new(FixedSource::new("contacts", &["ann", "bob"])),
                Arc::new(FixedSource::new("email", &["carol"])),
            ],
        );
        let rows = corpus.query("a", 10).await.unwrap();
        let texts: Vec<&str> = rows.iter().map(|r| r.text1.as_str()).collect();
        assert_eq!(texts, vec!["ann", "bob", "carol"]);
    }

    #[tokio::test]
    async fn test_multi_source_corpus_isolates_failures() {
        let mut broken = FixedSource::new("email", &["carol"]);
        broken.fail = true;
        let corpus = SourceCorpus::new(
            "people",
            vec![
                Arc::new(FixedSource::new("contacts", &["ann"])),
                Arc::new(broken),
            ],
        );
        let rows = corpus.query("a", 10).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_multi_source_corpus_fails_when_all_fail() {
        let mut a = FixedSource::new("a", &["x"]);
        a.fail = true;
        let mut b = FixedSource::new("b", &["y"]);
        b.fail = true;
        let corpus = SourceCorpus::new("both", vec![Arc::new(a), Arc::new(b)]);
        let err = corpus.query("q", 10).await.unwrap_err();
        assert!(matches!(err, SourceError::CorpusUnavailable { count: 2, .. }));
    }

    #[test]
    fn test_threshold_is_minimum_over_sources() {
        let mut a = FixedSource::new("a", &[]);
        a.threshold = 3;
        let mut b = FixedSource::new("b", &[]);
        b.threshold = 1;
        let corpus = SourceCorpus::new("ab", vec![Arc::new(a), Arc::new(b)]);
        assert_eq!(corpus.query_threshold(), 1);
    }

    #[test]
    fn test_registry_resolves_sources_and_enabled_state() {
        let corpora = Corpora::new();
        corpora.register(Arc::new(SourceCorpus::single(Arc::new(FixedSource::new(
            "apps",
            &[],
        )))));
        corpora.register(Arc::new(
            SourceCorpus::single(Arc::new(FixedSource::new("web", &[]))).web(true),
        ));

        assert_eq!(corpora.corpus_for_source("apps").unwrap().name(), "apps");
        assert!(corpora.source("missing").is_none());
        assert_eq!(corpora.web_corpus().unwrap().name(), "web");

        assert!(corpora.set_enabled("apps", false));
        assert!(!corpora.is_enabled("apps"));
        let enabled: Vec<String> = corpora
            .enabled_corpora()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(enabled, vec!["web"]);
        assert!(!corpora.set_enabled("missing", true));
    }
}
