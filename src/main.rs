//! # quicksearch CLI (`qs`)
//!
//! The `qs` binary drives the suggestion engine against the corpora
//! defined in the config file and a SQLite click log.
//!
//! ## Usage
//!
//! ```bash
//! qs --config ./config/qs.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `qs init` | Create the SQLite click-log database |
//! | `qs corpora` | List configured corpora |
//! | `qs query "<text>"` | Print the promoted suggestions for a query |
//! | `qs click "<text>" --position N` | Record a click on a promoted suggestion |
//! | `qs shortcuts "<text>"` | Print the shortcuts offered for a query |
//! | `qs history clear` | Delete all click history |
//! | `qs history status` | Show whether click history exists, with per-corpus totals |

use clap::{Parser, Subcommand};
use quicksearch::{commands, config, logging, sources};
use std::path::PathBuf;
use std::time::Duration;

/// quicksearch CLI: query-time suggestion aggregation with click-learned
/// shortcuts.
#[derive(Parser)]
#[command(
    name = "qs",
    about = "quicksearch: fan out a query to many corpora, merge the results, learn from clicks",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/qs.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the click-log database. Idempotent.
    Init,

    /// List configured corpora.
    Corpora,

    /// Print the promoted suggestions for a query.
    ///
    /// Shortcuts are marked with `*`.
    Query {
        /// The query text. May be empty.
        text: String,

        /// Only query this corpus.
        #[arg(long)]
        corpus: Option<String>,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,

        /// How long to wait for slow corpora, in milliseconds.
        #[arg(long, default_value_t = 2000)]
        wait_ms: u64,
    },

    /// Run a query and record a click on one of its promoted suggestions.
    Click {
        text: String,

        /// Zero-based position in the promoted list.
        #[arg(long)]
        position: usize,

        #[arg(long, default_value_t = 2000)]
        wait_ms: u64,
    },

    /// Print the shortcuts that would be offered for a query.
    Shortcuts {
        text: String,

        #[arg(long)]
        json: bool,
    },

    /// Manage click history.
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// Delete every click, shortcut and corpus total.
    Clear,
    /// Show whether any click history exists.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    logging::init(&cfg.logging)?;

    match cli.command {
        Commands::Init => {
            commands::run_init(&cfg).await?;
        }
        Commands::Corpora => {
            sources::list_corpora(&cfg)?;
        }
        Commands::Query {
            text,
            corpus,
            json,
            wait_ms,
        } => {
            commands::run_query(
                &cfg,
                &text,
                corpus.as_deref(),
                Duration::from_millis(wait_ms),
                json,
            )
            .await?;
        }
        Commands::Click {
            text,
            position,
            wait_ms,
        } => {
            commands::run_click(&cfg, &text, position, Duration::from_millis(wait_ms)).await?;
        }
        Commands::Shortcuts { text, json } => {
            commands::run_shortcuts(&cfg, &text, json).await?;
        }
        Commands::History { action } => match action {
            HistoryAction::Clear => {
                commands::run_history_clear(&cfg).await?;
            }
            HistoryAction::Status => {
                commands::run_history_status(&cfg).await?;
            }
        },
    }

    Ok(())
}
