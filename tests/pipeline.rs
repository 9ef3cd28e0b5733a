//! End-to-end library tests: provider, SQLite click log and refresh.

use std::sync::Arc;
use std::time::Duration;

use quicksearch::config::Config;
use quicksearch::cursor::SuggestionCursor;
use quicksearch::provider::SuggestionsProvider;
use quicksearch::shortcuts::store::sqlite::SqliteShortcutStore;
use quicksearch::{db, migrate, sources};
use tempfile::TempDir;

fn config(tmp: &TempDir, apps: &[&str]) -> Config {
    let items: Vec<String> = apps.iter().map(|a| format!("\"{}\"", a)).collect();
    let body = format!(
        r#"
[db]
path = "{}/qs.sqlite"

[suggestions]
promoter = "concat"
max_promoted = 5

[executor]
task_start_delay_ms = 5

[corpora.apps]
items = [{}]

[corpora.notes]
items = ["groceries", "meeting notes"]
default_enabled = false
"#,
        tmp.path().display(),
        items.join(", ")
    );
    toml::from_str(&body).unwrap()
}

async fn open(config: &Config) -> SuggestionsProvider {
    let pool = db::connect(config).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();
    let corpora = Arc::new(sources::build_corpora(config));
    SuggestionsProvider::from_config(config, corpora, Arc::new(SqliteShortcutStore::new(pool)))
}

fn texts(provider: &mut SuggestionsProvider) -> Vec<(String, bool)> {
    provider
        .promoted()
        .map(|p| p.iter().map(|s| (s.text1.clone(), s.is_shortcut)).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_click_turns_into_leading_shortcut() {
    let tmp = TempDir::new().unwrap();
    let cfg = config(&tmp, &["Maps", "Mail", "Music"]);
    let mut provider = open(&cfg).await;

    provider.start_query_in("ma", Some("apps")).await;
    assert!(provider.wait_until_done(Duration::from_secs(5)).await);
    assert_eq!(
        texts(&mut provider),
        vec![("Maps".to_string(), false), ("Mail".to_string(), false)]
    );
    let clicked = provider.report_click(1).unwrap();
    assert_eq!(clicked.text1, "Mail");
    provider.repository().flush().await;
    assert!(provider.repository().has_history().await);

    provider.start_query_in("m", Some("apps")).await;
    assert!(provider.wait_until_done(Duration::from_secs(5)).await);
    let promoted = texts(&mut provider);
    assert_eq!(promoted[0], ("Mail".to_string(), true));
    assert_eq!(promoted.iter().filter(|(t, _)| t == "Mail").count(), 1);
    assert_eq!(promoted.len(), 3);

    let scores = provider.repository().corpus_scores(1).await;
    assert_eq!(scores.get("apps"), Some(&1));
    provider.close().await;
}

#[tokio::test]
async fn test_stale_shortcut_is_dropped_on_refresh() {
    let tmp = TempDir::new().unwrap();
    let mut provider = open(&config(&tmp, &["Maps", "Mail"])).await;
    provider.start_query_in("ma", Some("apps")).await;
    assert!(provider.wait_until_done(Duration::from_secs(5)).await);
    provider.report_click(0).unwrap();
    provider.close().await;

    // "Maps" is gone from the corpus; a fresh session re-validates it.
    let mut provider = open(&config(&tmp, &["Mail"])).await;
    provider.start_query_in("ma", Some("apps")).await;
    assert_eq!(provider.current().unwrap().shortcuts().unwrap().count(), 1);
    assert_eq!(texts(&mut provider)[0], ("Maps".to_string(), true));

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while provider.current().unwrap().shortcuts().unwrap().count() > 0 {
        assert!(tokio::time::Instant::now() < deadline, "refresh never arrived");
        tokio::time::timeout(Duration::from_millis(100), provider.next_update())
            .await
            .ok();
    }
    assert!(provider.wait_until_done(Duration::from_secs(5)).await);
    assert_eq!(texts(&mut provider), vec![("Mail".to_string(), false)]);
    provider.repository().flush().await;
    assert!(!provider.repository().has_history().await);
    provider.close().await;
}

#[tokio::test]
async fn test_disabled_corpus_shortcuts_are_filtered() {
    let tmp = TempDir::new().unwrap();
    let cfg = config(&tmp, &["Maps"]);
    let mut provider = open(&cfg).await;

    provider.start_query_in("notes", Some("notes")).await;
    assert!(provider.wait_until_done(Duration::from_secs(5)).await);
    assert_eq!(provider.report_click(0).unwrap().text1, "meeting notes");
    provider.repository().flush().await;

    provider.corpora().set_enabled("notes", false);
    provider.start_query("notes").await;
    assert!(provider.wait_until_done(Duration::from_secs(5)).await);
    assert!(provider.current().unwrap().shortcuts().is_none());
    assert!(texts(&mut provider).is_empty());
    provider.close().await;
}

#[tokio::test]
async fn test_clear_history_forgets_everything() {
    let tmp = TempDir::new().unwrap();
    let mut provider = open(&config(&tmp, &["Maps"])).await;
    provider.start_query_in("maps", Some("apps")).await;
    assert!(provider.wait_until_done(Duration::from_secs(5)).await);
    provider.report_click(0).unwrap();
    provider.repository().flush().await;
    assert!(provider.repository().has_history().await);

    provider.repository().clear_history();
    provider.repository().flush().await;
    assert!(!provider.repository().has_history().await);
    assert!(provider.repository().corpus_scores(0).await.is_empty());
    provider.close().await;
}
