//! The per-session query orchestrator.
//!
//! # Flow
//!
//! ```text
//! start_query("ma")
//!   ├─ cancel previous query (pending tasks dropped, publisher cancelled)
//!   ├─ rank enabled corpora ──► filter with ShouldQueryStrategy
//!   ├─ shortcuts for "ma" ──► Suggestions::set_shortcuts
//!   └─ one QueryTask per corpus ──► Batching ──► Delaying ──► Pool
//!                                                        │
//!   next_update()  ◄──── mpsc<Delivery> ◄────────────────┘
//!     ├─ add_corpus_result / refresh_shortcut
//!     └─ batch complete and promoted list short? release next batch
//! ```
//!
//! The provider owns the current [`Suggestions`] and is its only writer.
//! It must be driven from a single task; worker tasks communicate with it
//! exclusively through [`Delivery`] messages.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::corpus::{Corpora, Corpus};
use crate::cursor::{DataSetObserver, ListSuggestionCursor, SuggestionCursor};
use crate::event_log::{best_effort, EventLogger, TracingEventLogger};
use crate::executor::{
    BatchingTaskExecutor, DelayingTaskExecutor, PooledTaskExecutor, SourceTaskExecutor,
};
use crate::models::Suggestion;
use crate::promoter::{ConcatPromoter, Promoter, RankAwarePromoter, ShortcutPromoter};
use crate::publish::{Delivery, Publisher, QueryConsumer, QueryId, RefreshConsumer};
use crate::query_task::start_queries;
use crate::ranker::{CorpusRanker, RankerSettings};
use crate::shortcuts::{ShortcutRefresher, ShortcutRepository, ShortcutSettings, ShortcutStore};
use crate::strategy::ShouldQueryStrategy;
use crate::suggestions::Suggestions;

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub max_promoted: usize,
    pub max_results_per_source: usize,
    /// Corpora queried per batch.
    pub batch_size: usize,
    pub query_timeout: Option<Duration>,
    pub ranker: RankerSettings,
}

impl ProviderSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_promoted: config.suggestions.max_promoted,
            max_results_per_source: config.suggestions.max_results_per_source,
            batch_size: config.suggestions.num_promoted_sources,
            query_timeout: config.executor.query_timeout(),
            ranker: RankerSettings {
                use_click_scores: config.shortcuts.use_click_scores,
                min_clicks_for_ranking: config.shortcuts.min_clicks_for_ranking,
            },
        }
    }
}

/// The configured promoter, with shortcuts restricted to enabled corpora.
pub fn build_promoter(config: &Config, corpora: Arc<Corpora>) -> Box<dyn Promoter> {
    let s = &config.suggestions;
    let inner: Box<dyn Promoter> = match s.promoter.as_str() {
        "concat" => Box::new(ConcatPromoter::new(s.max_shortcuts_returned)),
        _ => Box::new(RankAwarePromoter::new(
            s.slots_above_keyboard,
            s.max_shortcuts_returned,
        )),
    };
    Box::new(ShortcutPromoter::new(inner, move |shortcut: &Suggestion| {
        corpora
            .corpus_for_source(&shortcut.source)
            .is_some_and(|c| corpora.is_enabled(c.name()))
    }))
}

struct ActiveQuery {
    id: QueryId,
    suggestions: Suggestions,
    batching: Arc<BatchingTaskExecutor>,
    publisher: Publisher,
    started: Instant,
    next_batch_at: usize,
}

pub struct SuggestionsProvider {
    settings: ProviderSettings,
    corpora: Arc<Corpora>,
    ranker: CorpusRanker,
    strategy: ShouldQueryStrategy,
    executor: Arc<dyn SourceTaskExecutor>,
    repository: Arc<ShortcutRepository>,
    promoter: Box<dyn Promoter>,
    logger: Arc<dyn EventLogger>,
    observers: Vec<Arc<dyn DataSetObserver>>,
    tx: mpsc::UnboundedSender<Delivery>,
    rx: mpsc::UnboundedReceiver<Delivery>,
    next_query_id: QueryId,
    current: Option<ActiveQuery>,
    /// Superseded queries still acquired by someone.
    lingering: Vec<(QueryId, Suggestions)>,
    closed: bool,
}

impl SuggestionsProvider {
    pub fn new(
        corpora: Arc<Corpora>,
        repository: Arc<ShortcutRepository>,
        executor: Arc<dyn SourceTaskExecutor>,
        promoter: Box<dyn Promoter>,
        settings: ProviderSettings,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            ranker: CorpusRanker::new(repository.clone(), settings.ranker.clone()),
            settings,
            corpora,
            strategy: ShouldQueryStrategy::new(),
            executor,
            repository,
            promoter,
            logger: Arc::new(TracingEventLogger),
            observers: Vec::new(),
            tx,
            rx,
            next_query_id: 1,
            current: None,
            lingering: Vec::new(),
            closed: false,
        }
    }

    /// Wire up executors, refresher and repository from `config`.
    ///
    /// Must be called inside a tokio runtime.
    pub fn from_config(
        config: &Config,
        corpora: Arc<Corpora>,
        store: Arc<dyn ShortcutStore>,
    ) -> Self {
        let start = Instant::now();
        let pool: Arc<dyn SourceTaskExecutor> = Arc::new(PooledTaskExecutor::new(
            "query",
            config.executor.query_threads,
        ));
        let executor: Arc<dyn SourceTaskExecutor> = Arc::new(DelayingTaskExecutor::new(
            pool,
            config.executor.task_start_delay(),
        ));
        let refresher = Arc::new(ShortcutRefresher::new(
            Arc::new(PooledTaskExecutor::new(
                "refresh",
                config.executor.refresh_threads,
            )),
            corpora.clone(),
        ));
        let repository = Arc::new(ShortcutRepository::new(
            store,
            corpora.clone(),
            refresher,
            ShortcutSettings {
                retention: config.shortcuts.retention(),
                max_shortcuts: config.suggestions.max_shortcuts_returned,
            },
        ));
        let promoter = build_promoter(config, corpora.clone());
        let provider = Self::new(
            corpora,
            repository,
            executor,
            promoter,
            ProviderSettings::from_config(config),
        );
        let logger = provider.logger.clone();
        let corpus_count = provider.corpora.len();
        best_effort(|| logger.log_start(start.elapsed(), corpus_count));
        provider
    }

    pub fn with_logger(mut self, logger: Arc<dyn EventLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn corpora(&self) -> &Arc<Corpora> {
        &self.corpora
    }

    pub fn repository(&self) -> &Arc<ShortcutRepository> {
        &self.repository
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    /// Register an observer on every future query's [`Suggestions`].
    pub fn register_observer(&mut self, observer: Arc<dyn DataSetObserver>) {
        self.observers.push(observer);
    }

    pub fn current(&self) -> Option<&Suggestions> {
        self.current.as_ref().map(|a| &a.suggestions)
    }

    pub fn current_query_id(&self) -> Option<QueryId> {
        self.current.as_ref().map(|a| a.id)
    }

    /// Start `query` over all enabled corpora.
    pub async fn start_query(&mut self, query: &str) -> QueryId {
        self.start_query_in(query, None).await
    }

    /// Start `query`, optionally restricted to one corpus.
    ///
    /// Cancels the previous query. A restricted or single-corpus query
    /// always queries its corpus; the empty query goes to the web corpus
    /// only.
    pub async fn start_query_in(&mut self, query: &str, restrict: Option<&str>) -> QueryId {
        assert!(!self.closed, "suggestions provider used after close");
        self.cancel_current();

        let ranked: Vec<Arc<dyn Corpus>> = match restrict {
            Some(name) => self.corpora.corpus(name).into_iter().collect(),
            None => self.ranker.rank(&self.corpora).await,
        };
        let to_query = self.corpora_to_query(query, &ranked);

        let id = self.next_query_id;
        self.next_query_id += 1;
        let publisher = Publisher::new(id, self.tx.clone());

        let mut suggestions = Suggestions::new(query, to_query.clone());
        suggestions.acquire();
        for observer in &self.observers {
            suggestions.register_observer(observer.clone());
        }

        let listener = Arc::new(RefreshConsumer(publisher.clone()));
        if let Some(shortcuts) = self
            .repository
            .get_shortcuts_for_query(query, &ranked, listener)
            .await
        {
            suggestions.set_shortcuts(shortcuts);
        }

        let batching = Arc::new(BatchingTaskExecutor::new(
            self.executor.clone(),
            self.settings.batch_size,
        ));
        start_queries(
            query,
            &to_query,
            self.settings.max_results_per_source,
            self.settings.query_timeout,
            batching.as_ref(),
            Arc::new(QueryConsumer(publisher.clone())),
        );

        debug!(
            query_id = id,
            query,
            ranked = ranked.len(),
            queried = to_query.len(),
            "query started"
        );
        let logger = self.logger.clone();
        best_effort(|| logger.log_search(query, to_query.len()));

        self.current = Some(ActiveQuery {
            id,
            suggestions,
            next_batch_at: self.settings.batch_size.min(to_query.len()),
            batching,
            publisher,
            started: Instant::now(),
        });
        id
    }

    fn corpora_to_query(&self, query: &str, ranked: &[Arc<dyn Corpus>]) -> Vec<Arc<dyn Corpus>> {
        self.strategy.fold(query);
        if ranked.len() == 1 {
            return ranked.to_vec();
        }
        if query.is_empty() {
            return ranked.iter().filter(|c| c.is_web_corpus()).cloned().collect();
        }
        ranked
            .iter()
            .filter(|c| self.strategy.should_query(c.as_ref(), query))
            .cloned()
            .collect()
    }

    /// Wait for the next delivery and apply it.
    ///
    /// Returns whether the current query changed. Waits forever if no
    /// worker has anything left to deliver.
    pub async fn next_update(&mut self) -> bool {
        match self.rx.recv().await {
            Some(delivery) => self.handle(delivery),
            None => false,
        }
    }

    /// Apply every delivery already queued. Returns how many changed the
    /// current query.
    pub fn poll_updates(&mut self) -> usize {
        let mut changed = 0;
        while let Ok(delivery) = self.rx.try_recv() {
            if self.handle(delivery) {
                changed += 1;
            }
        }
        changed
    }

    /// Apply deliveries until every queried corpus reported or `timeout`
    /// elapsed. Returns whether the current query is done.
    pub async fn wait_until_done(&mut self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match &self.current {
                None => return true,
                Some(active) if active.suggestions.is_done() => return true,
                Some(_) => {}
            }
            match tokio::time::timeout_at(deadline, self.rx.recv()).await {
                Ok(Some(delivery)) => {
                    self.handle(delivery);
                }
                Ok(None) => return false,
                Err(_) => {
                    debug!("gave up waiting for slow corpora");
                    return false;
                }
            }
        }
    }

    fn handle(&mut self, delivery: Delivery) -> bool {
        let Some(active) = self.current.as_mut().filter(|a| a.id == delivery.query_id()) else {
            debug!(query_id = delivery.query_id(), "stale delivery discarded");
            if let Delivery::CorpusResult { result, .. } = &delivery {
                if result.is_empty() {
                    self.strategy
                        .on_zero_results(result.corpus().as_ref(), result.user_query());
                }
            }
            delivery.discard();
            return false;
        };

        match delivery {
            Delivery::CorpusResult { result, .. } => {
                let logger = self.logger.clone();
                best_effort(|| logger.log_latency(&result));
                if result.is_empty() {
                    self.strategy
                        .on_zero_results(result.corpus().as_ref(), result.user_query());
                }
                active.suggestions.add_corpus_result(result);

                let max = self.settings.max_promoted;
                let suggestions = &mut active.suggestions;
                if suggestions.result_count() >= active.next_batch_at
                    && !suggestions.is_done()
                    && suggestions.get_promoted(self.promoter.as_ref(), max).count() < max
                {
                    let released = active.batching.execute_next_batch();
                    if released > 0 {
                        debug!(query_id = active.id, released, "next batch released");
                        active.next_batch_at += released;
                    }
                }
                if active.suggestions.is_done() {
                    debug!(
                        query_id = active.id,
                        elapsed_ms = active.started.elapsed().as_millis() as u64,
                        "all corpora reported"
                    );
                }
            }
            Delivery::ShortcutRefreshed {
                source,
                shortcut_id,
                refreshed,
                ..
            } => {
                active
                    .suggestions
                    .refresh_shortcut(&source, &shortcut_id, refreshed);
            }
        }
        true
    }

    /// The promoted list of the current query.
    pub fn promoted(&mut self) -> Option<&ListSuggestionCursor> {
        let max = self.settings.max_promoted;
        let active = self.current.as_mut()?;
        Some(active.suggestions.get_promoted(self.promoter.as_ref(), max))
    }

    /// Record a click on promoted row `position` of the current query.
    pub fn report_click(&mut self, position: usize) -> Option<Suggestion> {
        let query = self.current()?.query().to_string();
        let clicked = match self.promoted() {
            Some(promoted) if position < promoted.count() => promoted.suggestion_at(position).clone(),
            Some(promoted) => {
                warn!(position, count = promoted.count(), "click outside promoted list");
                return None;
            }
            None => return None,
        };
        self.repository.report_click(&query, &clicked);
        let logger = self.logger.clone();
        best_effort(|| logger.log_click(&query, &clicked, position));
        Some(clicked)
    }

    /// Take an extra hold on the current query's [`Suggestions`].
    pub fn acquire(&mut self) -> Option<QueryId> {
        let active = self.current.as_mut()?;
        active.suggestions.acquire();
        Some(active.id)
    }

    /// Drop a hold taken with [`acquire`](Self::acquire).
    pub fn release(&mut self, id: QueryId) {
        if let Some(active) = self.current.as_mut().filter(|a| a.id == id) {
            active.suggestions.release();
            return;
        }
        if let Some(i) = self.lingering.iter().position(|(l, _)| *l == id) {
            if self.lingering[i].1.release() {
                self.lingering.swap_remove(i);
            }
        }
    }

    /// Abandon the current query. Unstarted tasks are dropped; running
    /// ones finish but their results are discarded.
    pub fn cancel_current(&mut self) {
        let Some(mut active) = self.current.take() else {
            return;
        };
        active.publisher.cancel();
        active.batching.cancel_pending_tasks();
        self.repository.refresher().cancel_pending_tasks();

        let query = active.suggestions.query().to_string();
        let reported = active.suggestions.result_count();
        let logger = self.logger.clone();
        best_effort(|| logger.log_exit(&query, reported));

        if !active.suggestions.release() {
            self.lingering.push((active.id, active.suggestions));
        }
        debug!(query_id = active.id, query = %query, "query cancelled");
    }

    /// Cancel everything, drain pending click-log writes and stop the
    /// executors and the repository writer.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.close_queries();
        self.executor.close();
        self.repository.refresher().cancel_pending_tasks();
        self.repository.close().await;
        info!("suggestions provider closed");
    }

    fn close_queries(&mut self) {
        self.closed = true;
        self.cancel_current();
        for (_, mut suggestions) in self.lingering.drain(..) {
            suggestions.close();
        }
        while let Ok(delivery) = self.rx.try_recv() {
            delivery.discard();
        }
    }
}

impl Drop for SuggestionsProvider {
    fn drop(&mut self) {
        if !self.closed && !std::thread::panicking() {
            self.close_queries();
            self.executor.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CorpusConfig;
    use crate::corpus::SourceCorpus;
    use crate::shortcuts::store::memory::InMemoryShortcutStore;
    use crate::sources::StaticSource;

    fn corpus(name: &str, items: &[&str], latency_ms: u64) -> Arc<dyn Corpus> {
        let config = CorpusConfig {
            items: items.iter().map(|s| s.to_string()).collect(),
            latency_ms,
            ..CorpusConfig::default()
        };
        Arc::new(SourceCorpus::single(Arc::new(StaticSource::new(name, config))))
    }

    fn provider(corpora: Vec<Arc<dyn Corpus>>, batch_size: usize) -> SuggestionsProvider {
        let registry = Arc::new(Corpora::new());
        for c in corpora {
            registry.register(c);
        }
        let pool: Arc<dyn SourceTaskExecutor> = Arc::new(PooledTaskExecutor::new("query", 4));
        let executor = Arc::new(DelayingTaskExecutor::new(pool, Duration::from_millis(5)));
        let refresher = Arc::new(ShortcutRefresher::new(
            Arc::new(PooledTaskExecutor::new("refresh", 1)),
            registry.clone(),
        ));
        let repository = Arc::new(ShortcutRepository::new(
            Arc::new(InMemoryShortcutStore::new()),
            registry.clone(),
            refresher,
            ShortcutSettings::default(),
        ));
        SuggestionsProvider::new(
            registry,
            repository,
            executor,
            Box::new(ConcatPromoter::new(4)),
            ProviderSettings {
                max_promoted: 4,
                max_results_per_source: 10,
                batch_size,
                query_timeout: None,
                ranker: RankerSettings::default(),
            },
        )
    }

    fn promoted_texts(p: &mut SuggestionsProvider) -> Vec<String> {
        p.promoted()
            .map(|c| c.iter().map(|s| s.text1.clone()).collect())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_promoted_grows_as_corpora_report() {
        let mut p = provider(
            vec![
                corpus("A", &["alpha", "apex"], 0),
                corpus("B", &["zulu"], 0),
                corpus("C", &["car", "cat", "cab"], 300),
            ],
            3,
        );
        p.start_query("a").await;

        while p.current().unwrap().result_count() < 2 {
            p.next_update().await;
        }
        assert!(!p.current().unwrap().is_done());
        assert_eq!(promoted_texts(&mut p), vec!["alpha", "apex"]);

        assert!(p.wait_until_done(Duration::from_secs(5)).await);
        assert_eq!(promoted_texts(&mut p), vec!["alpha", "apex", "car", "cat"]);
        p.close().await;
    }

    #[tokio::test]
    async fn test_next_batch_released_only_while_promoted_short() {
        let mut p = provider(
            vec![
                corpus("A", &["xa1", "xa2", "xa3", "xa4"], 0),
                corpus("B", &["xb1"], 0),
                corpus("C", &["xc1"], 0),
            ],
            1,
        );
        p.start_query("x").await;
        // A alone fills the promoted list, so B and C are never released.
        assert!(!p.wait_until_done(Duration::from_millis(300)).await);
        assert_eq!(p.current().unwrap().result_count(), 1);
        assert_eq!(promoted_texts(&mut p), vec!["xa1", "xa2", "xa3", "xa4"]);
        p.close().await;
    }

    #[tokio::test]
    async fn test_batches_continue_until_promoted_full() {
        let mut p = provider(
            vec![
                corpus("A", &["xa1"], 0),
                corpus("B", &["xb1"], 0),
                corpus("C", &["xc1"], 0),
            ],
            1,
        );
        p.start_query("x").await;
        assert!(p.wait_until_done(Duration::from_secs(5)).await);
        assert_eq!(promoted_texts(&mut p), vec!["xa1", "xb1", "xc1"]);
        p.close().await;
    }

    #[tokio::test]
    async fn test_new_query_supersedes_old_results() {
        let mut p = provider(
            vec![corpus("A", &["alpha"], 0), corpus("S", &["slow alpha"], 200)],
            2,
        );
        let first = p.start_query("al").await;
        let second = p.start_query("alp").await;
        assert_ne!(first, second);
        assert!(p.wait_until_done(Duration::from_secs(5)).await);
        let current = p.current().unwrap();
        assert_eq!(current.query(), "alp");
        assert!(current.results().iter().all(|r| r.user_query() == "alp"));
        p.close().await;
    }

    #[tokio::test]
    async fn test_empty_query_only_goes_to_web() {
        let web: Arc<dyn Corpus> = Arc::new(
            SourceCorpus::single(Arc::new(StaticSource::new(
                "web",
                CorpusConfig {
                    items: vec!["web result".into()],
                    ..CorpusConfig::default()
                },
            )))
            .web(true),
        );
        let mut p = provider(vec![corpus("A", &["alpha"], 0), web], 4);
        p.start_query("").await;
        assert_eq!(p.current().unwrap().expected_corpora().len(), 1);
        assert!(p.wait_until_done(Duration::from_secs(5)).await);
        assert!(p.current().unwrap().web_result().is_some());
        p.close().await;
    }

    fn web(items: &[&str]) -> Arc<dyn Corpus> {
        let config = CorpusConfig {
            items: items.iter().map(|s| s.to_string()).collect(),
            ..CorpusConfig::default()
        };
        Arc::new(SourceCorpus::single(Arc::new(StaticSource::new("web", config))).web(true))
    }

    fn queried(p: &SuggestionsProvider) -> Vec<String> {
        p.current()
            .unwrap()
            .expected_corpora()
            .iter()
            .map(|c| c.name().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_empty_query_widens_zero_result_session() {
        let mut p = provider(vec![web(&["bob web"]), corpus("C", &["alpha"], 0)], 4);
        p.start_query("bo").await;
        assert!(p.wait_until_done(Duration::from_secs(5)).await);
        p.start_query("bob").await;
        assert_eq!(queried(&p), vec!["web"]);

        p.start_query("").await;
        assert_eq!(queried(&p), vec!["web"]);
        p.start_query("bob").await;
        assert_eq!(queried(&p), vec!["web", "C"]);
        p.close().await;
    }

    #[tokio::test]
    async fn test_late_zero_result_of_superseded_prefix_is_remembered() {
        let mut p = provider(vec![corpus("A", &["bob"], 0), corpus("S", &[], 150)], 4);
        let slow = p.corpora().corpus("S").unwrap();

        p.start_query("bo").await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        p.start_query_in("bob", Some("A")).await;
        assert!(p.wait_until_done(Duration::from_secs(5)).await);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(p.poll_updates(), 0);
        assert_eq!(p.current().unwrap().query(), "bob");
        assert!(!p.strategy.should_query(slow.as_ref(), "bobb"));
        p.close().await;
    }

    #[tokio::test]
    async fn test_late_zero_result_of_unrelated_query_is_ignored() {
        let mut p = provider(vec![corpus("A", &["xyz"], 0), corpus("S", &[], 150)], 4);
        let slow = p.corpora().corpus("S").unwrap();

        p.start_query("bo").await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        p.start_query_in("xy", Some("A")).await;
        assert!(p.wait_until_done(Duration::from_secs(5)).await);

        tokio::time::sleep(Duration::from_millis(300)).await;
        p.poll_updates();
        assert!(p.strategy.should_query(slow.as_ref(), "xyz"));
        p.close().await;
    }

    #[tokio::test]
    async fn test_click_becomes_shortcut_for_next_query() {
        let mut p = provider(
            vec![corpus("A", &["alpha", "apex"], 0), corpus("B", &["zed"], 0)],
            4,
        );
        p.start_query("a").await;
        assert!(p.wait_until_done(Duration::from_secs(5)).await);
        let clicked = p.report_click(1).unwrap();
        assert_eq!(clicked.text1, "apex");
        assert!(p.report_click(99).is_none());
        p.repository().flush().await;

        p.start_query("a").await;
        let shortcuts = p.current().unwrap().shortcuts().unwrap();
        assert_eq!(shortcuts.count(), 1);
        assert_eq!(shortcuts.suggestion_at(0).text1, "apex");
        assert!(p.wait_until_done(Duration::from_secs(5)).await);
        assert_eq!(promoted_texts(&mut p), vec!["apex", "alpha"]);
        p.close().await;
    }

    #[tokio::test]
    async fn test_acquired_suggestions_outlive_cancel() {
        let mut p = provider(vec![corpus("A", &["alpha"], 0), corpus("B", &["beta"], 0)], 4);
        p.start_query("a").await;
        let held = p.acquire().unwrap();
        p.start_query("b").await;
        assert_eq!(p.lingering.len(), 1);
        assert!(!p.lingering[0].1.is_closed());
        p.release(held);
        assert!(p.lingering.is_empty());
        p.close().await;
    }
}
