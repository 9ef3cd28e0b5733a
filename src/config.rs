//! TOML configuration.
//!
//! ```toml
//! [db]
//! path = "./data/quicksearch.sqlite"
//!
//! [suggestions]
//! max_promoted = 8
//! promoter = "rank_aware"
//!
//! [executor]
//! query_threads = 4
//! task_start_delay_ms = 100
//!
//! [shortcuts]
//! max_stat_age_days = 30
//!
//! [corpora.apps]
//! items = ["Maps", "Mail", "Music"]
//! ```
//!
//! Every section but `[db]` is optional and falls back to defaults.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub suggestions: SuggestionsConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub shortcuts: ShortcutsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Demo corpora, registered in name order.
    #[serde(default)]
    pub corpora: BTreeMap<String, CorpusConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    /// How long a connection waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// The click log has one writer; readers are the shortcut lookups.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_max_connections() -> u32 {
    4
}

impl DbConfig {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: default_busy_timeout_ms(),
            max_connections: default_max_connections(),
        }
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SuggestionsConfig {
    pub max_promoted: usize,
    pub max_results_per_source: usize,
    pub max_shortcuts_returned: usize,
    /// Batch size of the per-query batching executor.
    pub num_promoted_sources: usize,
    pub slots_above_keyboard: usize,
    pub promoter: String,
}

impl Default for SuggestionsConfig {
    fn default() -> Self {
        Self {
            max_promoted: 8,
            max_results_per_source: 50,
            max_shortcuts_returned: 12,
            num_promoted_sources: 4,
            slots_above_keyboard: 4,
            promoter: "rank_aware".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ExecutorConfig {
    pub query_threads: usize,
    pub task_start_delay_ms: u64,
    pub refresh_threads: usize,
    pub query_timeout_ms: Option<u64>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            query_threads: 4,
            task_start_delay_ms: 100,
            refresh_threads: 2,
            query_timeout_ms: None,
        }
    }
}

impl ExecutorConfig {
    pub fn task_start_delay(&self) -> Duration {
        Duration::from_millis(self.task_start_delay_ms)
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ShortcutsConfig {
    pub max_stat_age_days: u64,
    pub min_clicks_for_ranking: i64,
    pub use_click_scores: bool,
}

impl Default for ShortcutsConfig {
    fn default() -> Self {
        Self {
            max_stat_age_days: 30,
            min_clicks_for_ranking: 3,
            use_click_scores: true,
        }
    }
}

impl ShortcutsConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.max_stat_age_days * 24 * 60 * 60)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// A corpus backed by a fixed list of items.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CorpusConfig {
    pub items: Vec<String>,
    pub latency_ms: u64,
    pub query_threshold: usize,
    pub query_after_zero_results: bool,
    pub default_enabled: bool,
    pub web: bool,
    pub version: i64,
    /// Every query fails. For exercising error paths.
    pub fail: bool,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            latency_ms: 0,
            query_threshold: 0,
            query_after_zero_results: false,
            default_enabled: true,
            web: false,
            version: 0,
            fail: false,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.db.max_connections < 1 {
        anyhow::bail!("db.max_connections must be >= 1");
    }

    // Validate suggestions
    if config.suggestions.max_promoted < 1 {
        anyhow::bail!("suggestions.max_promoted must be >= 1");
    }
    if config.suggestions.num_promoted_sources < 1 {
        anyhow::bail!("suggestions.num_promoted_sources must be >= 1");
    }
    match config.suggestions.promoter.as_str() {
        "rank_aware" | "concat" => {}
        other => anyhow::bail!(
            "Unknown promoter: '{}'. Must be rank_aware or concat.",
            other
        ),
    }

    // Validate executor
    if config.executor.query_threads < 1 {
        anyhow::bail!("executor.query_threads must be >= 1");
    }
    if config.executor.refresh_threads < 1 {
        anyhow::bail!("executor.refresh_threads must be >= 1");
    }
    if config.executor.query_timeout_ms == Some(0) {
        anyhow::bail!("executor.query_timeout_ms must be > 0 when set");
    }

    // Validate shortcuts
    if config.shortcuts.max_stat_age_days < 1 {
        anyhow::bail!("shortcuts.max_stat_age_days must be >= 1");
    }

    // Validate corpora
    let web: Vec<&String> = config
        .corpora
        .iter()
        .filter(|(_, c)| c.web)
        .map(|(name, _)| name)
        .collect();
    if web.len() > 1 {
        anyhow::bail!("At most one corpus may set web = true, found: {:?}", web);
    }

    Ok(())
}
