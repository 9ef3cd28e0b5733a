//! Zero-result suppression.
//!
//! Remembers, per corpus, the query length at which the corpus last came
//! back empty during the current typing session, so that refinements of
//! that query are not sent to it again.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;

use crate::corpus::Corpus;

#[derive(Default)]
struct SessionState {
    last_query: String,
    /// Corpus name → query length (in chars) that returned nothing.
    empty_corpora: HashMap<String, usize>,
}

/// Decides whether a corpus should be queried for a query string.
///
/// Called concurrently from the query-issuing task and from result
/// handling, so all state sits behind one lock.
#[derive(Default)]
pub struct ShouldQueryStrategy {
    state: Mutex<SessionState>,
}

impl ShouldQueryStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn should_query(&self, corpus: &dyn Corpus, query: &str) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        fold_query(&mut state, query);

        let len = query.chars().count();
        if len < corpus.query_threshold() {
            return false;
        }
        if !corpus.query_after_zero_results() && state.empty_corpora.contains_key(corpus.name()) {
            debug!(corpus = corpus.name(), query, "suppressed after zero results");
            return false;
        }
        true
    }

    /// Fold `query` into the session without asking about any corpus.
    ///
    /// For queries that bypass the per-corpus check, such as the empty
    /// query, which still widens the session.
    pub fn fold(&self, query: &str) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        fold_query(&mut state, query);
    }

    /// Record that `corpus` returned nothing for `query`.
    ///
    /// Ignored when `query` is not a prefix of the current session query,
    /// which is the case for results that arrive after the user moved on.
    pub fn on_zero_results(&self, corpus: &dyn Corpus, query: &str) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if query.is_empty() || !state.last_query.starts_with(query) {
            return;
        }
        state
            .empty_corpora
            .insert(corpus.name().to_string(), query.chars().count());
    }

    /// Forget the session entirely.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        *state = SessionState::default();
    }
}

fn fold_query(state: &mut SessionState, query: &str) {
    if query.starts_with(state.last_query.as_str()) {
        // refinement
    } else if state.last_query.starts_with(query) {
        let len = query.chars().count();
        state.empty_corpora.retain(|_, at| *at <= len);
    } else {
        state.empty_corpora.clear();
    }
    state.last_query.clear();
    state.last_query.push_str(query);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::tests::FixedSource;
    use crate::corpus::SourceCorpus;
    use std::sync::Arc;

    fn corpus(threshold: usize) -> SourceCorpus {
        let mut source = FixedSource::new("contacts", &[]);
        source.threshold = threshold;
        SourceCorpus::single(Arc::new(source))
    }

    #[test]
    fn test_refinement_of_empty_query_is_suppressed() {
        let strategy = ShouldQueryStrategy::new();
        let c = corpus(0);
        assert!(strategy.should_query(&c, "bo"));
        strategy.on_zero_results(&c, "bo");
        assert!(!strategy.should_query(&c, "bob"));
    }

    #[test]
    fn test_widening_purges_longer_entries() {
        let strategy = ShouldQueryStrategy::new();
        let c = corpus(0);
        strategy.should_query(&c, "bo");
        strategy.on_zero_results(&c, "bo");
        assert!(!strategy.should_query(&c, "bob"));
        assert!(strategy.should_query(&c, "b"));
        assert!(strategy.should_query(&c, "bob"));
    }

    #[test]
    fn test_widening_keeps_entries_at_or_below_length() {
        let strategy = ShouldQueryStrategy::new();
        let c = corpus(0);
        strategy.should_query(&c, "bob");
        strategy.on_zero_results(&c, "b");
        assert!(!strategy.should_query(&c, "bo"));
        assert!(!strategy.should_query(&c, "b"));
    }

    #[test]
    fn test_fold_to_empty_query_purges_everything() {
        let strategy = ShouldQueryStrategy::new();
        let c = corpus(0);
        strategy.should_query(&c, "bo");
        strategy.on_zero_results(&c, "bo");
        strategy.fold("");
        assert!(strategy.should_query(&c, "bob"));
    }

    #[test]
    fn test_unrelated_query_clears_state() {
        let strategy = ShouldQueryStrategy::new();
        let c = corpus(0);
        strategy.should_query(&c, "bo");
        strategy.on_zero_results(&c, "bo");
        assert!(strategy.should_query(&c, "xyz"));
        assert!(strategy.should_query(&c, "bob"));
    }

    #[test]
    fn test_stale_zero_results_are_ignored() {
        let strategy = ShouldQueryStrategy::new();
        let c = corpus(0);
        strategy.should_query(&c, "cat");
        strategy.on_zero_results(&c, "dog");
        assert!(strategy.should_query(&c, "cats"));
    }

    #[test]
    fn test_threshold_counts_chars() {
        let strategy = ShouldQueryStrategy::new();
        let c = corpus(3);
        assert!(!strategy.should_query(&c, "éé"));
        assert!(strategy.should_query(&c, "ééé"));
    }

    #[test]
    fn test_query_after_zero_results_ignores_memory() {
        struct Persistent(SourceCorpus);

        #[async_trait::async_trait]
        impl Corpus for Persistent {
            fn name(&self) -> &str {
                self.0.name()
            }
            fn sources(&self) -> &[Arc<dyn crate::corpus::Source>] {
                self.0.sources()
            }
            fn is_web_corpus(&self) -> bool {
                false
            }
            fn is_default_enabled(&self) -> bool {
                true
            }
            fn query_after_zero_results(&self) -> bool {
                true
            }
            async fn query(
                &self,
                query: &str,
                limit: usize,
            ) -> Result<Vec<crate::models::Suggestion>, crate::error::SourceError> {
                self.0.query(query, limit).await
            }
        }

        let strategy = ShouldQueryStrategy::new();
        let c = Persistent(corpus(0));
        strategy.should_query(&c, "bo");
        strategy.on_zero_results(&c, "bo");
        assert!(strategy.should_query(&c, "bob"));
    }
}
