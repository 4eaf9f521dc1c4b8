//! End-to-end runs of the aggregation pipeline against an in-memory baseline

mod common;

use chrono::Duration;
use common::{base_time, config, raw, snapshot};
use trendr_common::config::ReportMode;
use trendr_engine::new_items::BaselineStore;
use trendr_engine::{Diagnostic, Pipeline, RunInput};

fn input(titles: Vec<trendr_engine::RawTitle>, hours: i64) -> RunInput {
    RunInput {
        titles,
        failed_ids: Vec::new(),
        now: base_time() + Duration::hours(hours),
    }
}

#[tokio::test]
async fn test_second_identical_run_finds_nothing_new() {
    let config = config();
    let store = BaselineStore::in_memory().await.unwrap();
    let pipeline = Pipeline::new(&config);

    let t1 = raw("weibo", "AI model t1", 1, base_time());
    let t2 = raw("weibo", "AI model t2", 2, base_time());

    let first = pipeline.run(&store, input(vec![t1.clone(), t2.clone()], 0), true).await;
    assert!(first.committed);
    assert_eq!(first.new_count, 2);
    assert!(first.report.stats[0].titles.iter().all(|t| t.is_new));

    let second = pipeline.run(&store, input(vec![t1, t2], 1), true).await;
    assert_eq!(second.new_count, 0);
    assert!(second.report.stats[0].titles.iter().all(|t| !t.is_new));
    assert!(second.report.new_titles.is_empty());
    assert_eq!(store.run_count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_dry_run_leaves_baseline_untouched() {
    let config = config();
    let store = BaselineStore::in_memory().await.unwrap();
    let pipeline = Pipeline::new(&config);

    let outcome = pipeline.run(&store, input(snapshot(), 0), false).await;
    assert!(!outcome.committed);
    assert!(store.load().await.baseline.is_empty());

    let again = pipeline.run(&store, input(snapshot(), 0), false).await;
    assert_eq!(again.new_count, outcome.new_count);
    assert_eq!(store.run_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_daily_report_structure() {
    let config = config();
    let store = BaselineStore::in_memory().await.unwrap();
    let mut run_input = input(snapshot(), 0);
    run_input.failed_ids = vec!["toutiao".to_string()];

    let outcome = Pipeline::new(&config).run(&store, run_input, true).await;
    let report = &outcome.report;

    let words: Vec<&str> = report.stats.iter().map(|g| g.word.as_str()).collect();
    assert_eq!(words.len(), 3);
    assert!(words.contains(&"AI"));
    assert!(words.contains(&"Chips"));
    assert!(words.contains(&"Space"));

    // "Sponsored AI course" is globally filtered
    let ai = report.stats.iter().find(|g| g.word == "AI").unwrap();
    assert_eq!(ai.count, 2);
    assert!(ai.titles.iter().all(|t| !t.title.contains("Sponsored")));

    // Ranks from both cycles are kept in order
    let llm = ai.titles.iter().find(|t| t.title.contains("LLM")).unwrap();
    assert_eq!(llm.ranks, vec![1, 2]);
    assert_eq!(llm.source_name, "Weibo");
    assert_eq!(llm.time_display, "[09:00 ~ 09:30]");

    // Unmatched "Celebrity wedding" is not listed as new
    let new_titles: Vec<&str> = report
        .new_titles
        .iter()
        .flat_map(|s| s.titles.iter().map(|t| t.title.as_str()))
        .collect();
    assert!(!new_titles.contains(&"Celebrity wedding"));
    assert_eq!(report.total_new_count, new_titles.len());
    assert_eq!(report.new_titles[0].source_name, "Weibo");
    assert!(report.new_titles.iter().flat_map(|s| &s.titles).all(|t| !t.is_new));

    assert_eq!(report.failed_ids, vec!["toutiao".to_string()]);
    assert!(outcome.has_valid_content);
    assert_eq!(outcome.channels.len(), 2);
}

#[tokio::test]
async fn test_groups_sorted_by_score() {
    let mut config = config();
    config.weights.rank_weight = 0.0;
    config.weights.frequency_weight = 1.0;
    config.weights.hotness_weight = 0.0;
    let store = BaselineStore::in_memory().await.unwrap();

    let outcome = Pipeline::new(&config).run(&store, input(snapshot(), 0), false).await;
    let words: Vec<&str> = outcome.report.stats.iter().map(|g| g.word.as_str()).collect();

    // AI: 2 titles, 4 sightings; Chips: 2 titles, 3 sightings; Space: 1
    assert_eq!(words, vec!["AI", "Chips", "Space"]);
}

#[tokio::test]
async fn test_incremental_mode_shows_only_new() {
    let mut config = config();
    config.mode = ReportMode::Incremental;
    let store = BaselineStore::in_memory().await.unwrap();
    let pipeline = Pipeline::new(&config);

    pipeline.run(&store, input(snapshot(), 0), true).await;

    let mut titles = snapshot();
    titles.push(raw("weibo", "AI chip startup raises funds", 9, base_time() + Duration::hours(1)));
    let outcome = pipeline.run(&store, input(titles, 1), true).await;

    let listed: Vec<&str> = outcome
        .report
        .stats
        .iter()
        .flat_map(|g| g.titles.iter().map(|t| t.title.as_str()))
        .collect();
    assert_eq!(listed, vec!["AI chip startup raises funds", "AI chip startup raises funds"]);
    assert!(outcome.report.new_titles.is_empty());
    assert!(outcome.has_valid_content);

    let quiet = pipeline.run(&store, input(snapshot(), 2), true).await;
    assert!(quiet.report.stats.is_empty());
    assert!(!quiet.has_valid_content);
    for channel in &quiet.channels {
        assert_eq!(channel.batches.len(), 1);
        assert!(channel.batches[0].body.contains("No new titles"));
    }
}

#[tokio::test]
async fn test_current_mode_follows_latest_cycle_of_run() {
    let mut config = config();
    config.mode = ReportMode::Current;
    let store = BaselineStore::in_memory().await.unwrap();

    // The newest cycle only carries a title no group matches
    let titles = vec![
        raw("weibo", "New LLM tops benchmark", 1, base_time()),
        raw("weibo", "Celebrity wedding", 2, base_time() + Duration::minutes(30)),
    ];
    let outcome = Pipeline::new(&config).run(&store, input(titles, 1), false).await;

    assert!(outcome.report.stats.is_empty());
    assert!(!outcome.has_valid_content);
}

#[tokio::test]
async fn test_malformed_group_is_skipped() {
    let mut config = config();
    config.keyword_groups[1].contains = Some("   ".to_string());
    let store = BaselineStore::in_memory().await.unwrap();

    let outcome = Pipeline::new(&config).run(&store, input(snapshot(), 0), true).await;

    assert!(outcome
        .diagnostics
        .iter()
        .any(|d| matches!(d, Diagnostic::Config { scope, .. } if scope.contains("Chips"))));
    assert!(outcome.report.stats.iter().all(|g| g.word != "Chips"));
    assert!(outcome.committed);
}

#[tokio::test]
async fn test_corrupt_baseline_treated_as_empty() {
    let config = config();
    let store = BaselineStore::in_memory().await.unwrap();
    pipeline_seed(&config, &store).await;
    sqlx::query("UPDATE seen_titles SET last_seen = 'not a time'")
        .execute(store.pool())
        .await
        .unwrap();

    let outcome = Pipeline::new(&config).run(&store, input(snapshot(), 1), true).await;

    assert!(outcome
        .diagnostics
        .iter()
        .any(|d| matches!(d, Diagnostic::BaselineCorrupt { .. })));
    assert!(outcome.report.stats.iter().flat_map(|g| &g.titles).all(|t| t.is_new));
    assert!(outcome.committed);
    assert!(store.load().await.corrupt.is_none());
}

#[tokio::test]
async fn test_no_groups_uses_catch_all() {
    let mut config = config();
    config.keyword_groups.clear();
    let store = BaselineStore::in_memory().await.unwrap();

    let outcome = Pipeline::new(&config).run(&store, input(snapshot(), 0), false).await;

    assert_eq!(outcome.report.stats.len(), 1);
    assert_eq!(outcome.report.stats[0].word, "All news");
    // Filters do not apply to the catch-all group
    assert_eq!(outcome.report.stats[0].count, 7);
    assert_eq!(outcome.report.stats[0].percentage, 100.0);
}

async fn pipeline_seed(config: &trendr_common::config::TrendConfig, store: &BaselineStore) {
    let outcome = Pipeline::new(config).run(store, input(snapshot(), 0), true).await;
    assert!(outcome.committed);
}
