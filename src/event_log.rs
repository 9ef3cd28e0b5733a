//! Session event logging.
//!
//! | Event | When |
//! |-------|------|
//! | `log_start` | the provider is created |
//! | `log_search` | a query is started |
//! | `log_latency` | a corpus result arrives for the current query |
//! | `log_click` | a promoted suggestion is clicked |
//! | `log_exit` | a query is abandoned or the provider closes |
//!
//! Loggers are observers only. The provider calls them through
//! [`best_effort`], so a panicking logger cannot change results.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use tracing::{info, warn};

use crate::corpus::CorpusResult;
use crate::cursor::SuggestionCursor;
use crate::models::Suggestion;

pub trait EventLogger: Send + Sync {
    fn log_start(&self, latency: Duration, corpora: usize);
    fn log_search(&self, query: &str, corpora_queried: usize);
    fn log_latency(&self, result: &CorpusResult);
    fn log_click(&self, query: &str, suggestion: &Suggestion, position: usize);
    fn log_exit(&self, query: &str, corpora_reported: usize);
}

/// Emits every event as an `info!` record.
#[derive(Debug, Default)]
pub struct TracingEventLogger;

impl EventLogger for TracingEventLogger {
    fn log_start(&self, latency: Duration, corpora: usize) {
        info!(latency_ms = latency.as_millis() as u64, corpora, "session started");
    }

    fn log_search(&self, query: &str, corpora_queried: usize) {
        info!(query, corpora_queried, "search");
    }

    fn log_latency(&self, result: &CorpusResult) {
        info!(
            corpus = result.corpus().name(),
            query = result.user_query(),
            rows = result.count(),
            latency_ms = result.latency().as_millis() as u64,
            "corpus latency"
        );
    }

    fn log_click(&self, query: &str, suggestion: &Suggestion, position: usize) {
        info!(query, source = %suggestion.source, text = %suggestion.text1, position, "click");
    }

    fn log_exit(&self, query: &str, corpora_reported: usize) {
        info!(query, corpora_reported, "exit");
    }
}

/// Run a logger call, swallowing any panic it raises.
pub fn best_effort(call: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(call)).is_err() {
        warn!("event logger panicked, event dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_effort_swallows_panics() {
        let mut ran = false;
        best_effort(|| ran = true);
        assert!(ran);
        best_effort(|| panic!("logger bug"));
    }
}
