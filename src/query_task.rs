//! One corpus query as a schedulable unit of work.
//!
//! A [`QueryTask`] runs [`Corpus::query`], measures its latency, wraps
//! the rows in a [`CorpusResult`] and hands that to a [`Consumer`]. A
//! failing, timed-out or panicking corpus still produces a result, with
//! no rows, so that the aggregate for the query can complete.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tracing::{debug, warn};

use crate::corpus::{Corpus, CorpusResult};
use crate::error::SourceError;
use crate::executor::{SourceTask, SourceTaskExecutor, TaskFuture};
use crate::models::Suggestion;

/// Receives values produced off the caller's task.
///
/// Returns whether the value was accepted. A consumer that rejects a
/// value is responsible for disposing of it.
pub trait Consumer<T>: Send + Sync {
    fn consume(&self, value: T) -> bool;
}

pub struct QueryTask {
    name: String,
    query: String,
    corpus: Arc<dyn Corpus>,
    limit: usize,
    timeout: Option<Duration>,
    consumer: Arc<dyn Consumer<CorpusResult>>,
}

impl QueryTask {
    pub fn new(
        query: impl Into<String>,
        corpus: Arc<dyn Corpus>,
        limit: usize,
        timeout: Option<Duration>,
        consumer: Arc<dyn Consumer<CorpusResult>>,
    ) -> Self {
        let query = query.into();
        Self {
            name: format!("{}[{}]", corpus.name(), query),
            query,
            corpus,
            limit,
            timeout,
            consumer,
        }
    }

    /// Query `corpus` and build its result. Never fails.
    pub async fn run_query(
        query: &str,
        corpus: Arc<dyn Corpus>,
        limit: usize,
        timeout: Option<Duration>,
    ) -> CorpusResult {
        let start = Instant::now();
        let rows = match Self::query_rows(query, corpus.as_ref(), limit, timeout).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(corpus = corpus.name(), query, error = %e, "corpus query failed");
                Vec::new()
            }
        };
        let latency = start.elapsed();
        debug!(
            corpus = corpus.name(),
            query,
            rows = rows.len(),
            latency_ms = latency.as_millis() as u64,
            "corpus answered"
        );
        CorpusResult::new(corpus, query, rows, latency)
    }

    async fn query_rows(
        query: &str,
        corpus: &dyn Corpus,
        limit: usize,
        timeout: Option<Duration>,
    ) -> Result<Vec<Suggestion>, SourceError> {
        let guarded = AssertUnwindSafe(corpus.query(query, limit)).catch_unwind();
        let outcome = match timeout {
            Some(limit_after) => match tokio::time::timeout(limit_after, guarded).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    return Err(SourceError::Timeout {
                        source_name: corpus.name().to_string(),
                        elapsed: limit_after,
                    })
                }
            },
            None => guarded.await,
        };
        outcome.unwrap_or_else(|_| Err(SourceError::failed(corpus.name(), "query panicked")))
    }
}

impl SourceTask for QueryTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(self: Box<Self>) -> TaskFuture {
        Box::pin(async move {
            let QueryTask {
                query,
                corpus,
                limit,
                timeout,
                consumer,
                ..
            } = *self;
            let result = Self::run_query(&query, corpus, limit, timeout).await;
            if !consumer.consume(result) {
                debug!(query = %query, "corpus result not consumed");
            }
        })
    }
}

/// Submit one [`QueryTask`] per corpus, in order.
pub fn start_queries(
    query: &str,
    corpora: &[Arc<dyn Corpus>],
    limit: usize,
    timeout: Option<Duration>,
    executor: &dyn SourceTaskExecutor,
    consumer: Arc<dyn Consumer<CorpusResult>>,
) {
    for corpus in corpora {
        executor.execute(Box::new(QueryTask::new(
            query,
            corpus.clone(),
            limit,
            timeout,
            consumer.clone(),
        )));
    }
}
