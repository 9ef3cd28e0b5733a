//! Corpus ordering for a query.
//!
//! Enabled corpora are ordered before they are queried: default-enabled
//! corpora first, then by score. The web corpus always scores highest;
//! other corpora score by their click totals when click scoring is on.
//! Ties keep registration order.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use crate::corpus::{Corpora, Corpus};
use crate::shortcuts::ShortcutRepository;

#[derive(Debug, Clone)]
pub struct RankerSettings {
    pub use_click_scores: bool,
    pub min_clicks_for_ranking: i64,
}

impl Default for RankerSettings {
    fn default() -> Self {
        Self {
            use_click_scores: true,
            min_clicks_for_ranking: 3,
        }
    }
}

pub struct CorpusRanker {
    repository: Arc<ShortcutRepository>,
    settings: RankerSettings,
}

impl CorpusRanker {
    pub fn new(repository: Arc<ShortcutRepository>, settings: RankerSettings) -> Self {
        Self {
            repository,
            settings,
        }
    }

    /// Enabled corpora of `corpora`, best first.
    pub async fn rank(&self, corpora: &Corpora) -> Vec<Arc<dyn Corpus>> {
        let scores = if self.settings.use_click_scores {
            self.repository
                .corpus_scores(self.settings.min_clicks_for_ranking)
                .await
        } else {
            HashMap::new()
        };
        rank_with_scores(corpora.enabled_corpora(), &scores)
    }
}

/// Stable sort by (default-enabled first, score descending).
pub fn rank_with_scores(
    mut corpora: Vec<Arc<dyn Corpus>>,
    scores: &HashMap<String, i64>,
) -> Vec<Arc<dyn Corpus>> {
    corpora.sort_by_key(|c| {
        let score = if c.is_web_corpus() {
            i64::MAX
        } else {
            scores.get(c.name()).copied().unwrap_or(0)
        };
        (!c.is_default_enabled(), Reverse(score))
    });
    corpora
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::tests::FixedSource;
    use crate::corpus::SourceCorpus;
    use crate::promoter::tests::corpus;

    fn names(ranked: &[Arc<dyn Corpus>]) -> Vec<&str> {
        ranked.iter().map(|c| c.name()).collect()
    }

    #[test]
    fn test_default_enabled_first_then_score() {
        let corpora = vec![
            corpus("contacts", false),
            corpus("apps", true),
            corpus("music", true),
            corpus("notes", false),
        ];
        let scores = HashMap::from([
            ("music".to_string(), 10),
            ("notes".to_string(), 50),
            ("contacts".to_string(), 5),
        ]);
        let ranked = rank_with_scores(corpora, &scores);
        assert_eq!(names(&ranked), vec!["music", "apps", "notes", "contacts"]);
    }

    #[test]
    fn test_web_outranks_any_score_and_ties_keep_order() {
        let web: Arc<dyn Corpus> = Arc::new(
            SourceCorpus::single(Arc::new(FixedSource::new("web", &[]))).web(true),
        );
        let corpora = vec![corpus("a", true), corpus("b", true), web];
        let scores = HashMap::from([("a".to_string(), 1_000_000)]);
        let ranked = rank_with_scores(corpora.clone(), &scores);
        assert_eq!(names(&ranked), vec!["web", "a", "b"]);

        let ranked = rank_with_scores(corpora, &HashMap::new());
        assert_eq!(names(&ranked), vec!["web", "a", "b"]);
    }
}
