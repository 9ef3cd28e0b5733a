//! # quicksearch
//!
//! A query-time suggestion aggregation engine.
//!
//! For every keystroke-level query, quicksearch fans out to a set of
//! corpora (groups of suggestion sources), merges whatever has arrived
//! into a deduplicated promoted list, and learns from clicks: clicked
//! suggestions become shortcuts that are offered first the next time a
//! similar query is typed.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────────────┐
//!   query ──────▶ │  SuggestionsProvider │ ◀──── mpsc<Delivery> ─────┐
//!                 └──────┬───────┬───────┘                           │
//!          ShouldQuery   │       │ shortcuts                         │
//!          + ranking     ▼       ▼                                   │
//!             ┌──────────────┐ ┌────────────────────┐   ┌───────────┴──┐
//!             │ QueryTasks   │ │ ShortcutRepository │──▶│  Refresher   │
//!             │ batch/delay/ │ │  SQLite click log  │   │ (validation) │
//!             │ pool         │ └────────────────────┘   └──────────────┘
//!             └──────┬───────┘
//!                    ▼
//!          Corpus ─▶ Source(s)
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! qs init                       # create the click-log database
//! qs corpora                    # list configured corpora
//! qs query "ma"                 # promoted suggestions for "ma"
//! qs click "ma" --position 0    # record a click, creating a shortcut
//! qs shortcuts "m"              # shortcuts offered for "m"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Suggestions and intents |
//! | [`cursor`] | Closable, observable suggestion cursors |
//! | [`corpus`] | Sources, corpora and the corpus registry |
//! | [`strategy`] | Per-session should-query decisions |
//! | [`executor`] | Pooled, delaying and batching task executors |
//! | [`query_task`] | One corpus query as a task |
//! | [`publish`] | Worker to provider hand-off |
//! | [`suggestions`] | The per-query result aggregate |
//! | [`promoter`] | Promoted list construction |
//! | [`ranker`] | Corpus ordering |
//! | [`shortcuts`] | Click log, shortcuts and their refresh |
//! | [`provider`] | The query orchestrator |
//! | [`sources`] | Config-defined corpora |
//! | [`commands`] | `qs` subcommands |
//! | [`event_log`] | Session event logging |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod commands;
pub mod config;
pub mod corpus;
pub mod cursor;
pub mod db;
pub mod error;
pub mod event_log;
pub mod executor;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod promoter;
pub mod provider;
pub mod publish;
pub mod query_task;
pub mod ranker;
pub mod shortcuts;
pub mod sources;
pub mod strategy;
pub mod suggestions;
