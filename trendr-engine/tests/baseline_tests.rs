//! Baseline persistence tests against real SQLite files

use chrono::{Duration, TimeZone, Utc};
use tempfile::TempDir;
use trendr_engine::new_items::{BaselineStore, BaselineUpdate, BaselineUpsert};
use uuid::Uuid;

fn upsert(key: &str, title: &str, hours: i64) -> BaselineUpsert {
    let at = Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap() + Duration::hours(hours);
    BaselineUpsert {
        key: format!("weibo\u{1f}{}", key),
        source_id: "weibo".to_string(),
        title: title.to_string(),
        first_seen: at,
        last_seen: at,
    }
}

fn update(upserts: Vec<BaselineUpsert>, replace_all: bool) -> BaselineUpdate {
    BaselineUpdate {
        upserts,
        prune_before: Utc.with_ymd_and_hms(2026, 10, 18, 0, 0, 0).unwrap(),
        replace_all,
    }
}

#[tokio::test]
async fn test_commit_then_reload_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("baseline.db");

    let store = BaselineStore::open(&db_path).await.unwrap();
    let summary = store
        .commit(
            Uuid::new_v4(),
            &update(vec![upsert("t1", "T1", 1), upsert("t2", "T2", 2)], false),
            Utc::now(),
        )
        .await
        .unwrap();
    assert_eq!(summary.inserted, 2);
    store.pool().close().await;

    let reopened = BaselineStore::open(&db_path).await.unwrap();
    let loaded = reopened.load().await;
    assert!(loaded.corrupt.is_none());
    assert_eq!(loaded.baseline.len(), 2);
    assert_eq!(loaded.baseline.get("weibo\u{1f}t2").unwrap().title, "T2");
    assert_eq!(reopened.run_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_refresh_keeps_first_seen() {
    let store = BaselineStore::in_memory().await.unwrap();
    store
        .commit(Uuid::new_v4(), &update(vec![upsert("t1", "T1", 1)], false), Utc::now())
        .await
        .unwrap();

    let mut later = upsert("t1", "T1", 5);
    later.first_seen = later.last_seen;
    let summary = store
        .commit(Uuid::new_v4(), &update(vec![later.clone()], false), Utc::now())
        .await
        .unwrap();
    assert_eq!(summary.inserted, 0);
    assert_eq!(summary.refreshed, 1);

    let loaded = store.load().await;
    let entry = loaded.baseline.get(&later.key).unwrap();
    assert_eq!(entry.last_seen, later.last_seen);
    assert_eq!(entry.first_seen, upsert("t1", "T1", 1).first_seen);
}

#[tokio::test]
async fn test_failed_commit_leaves_baseline_unchanged() {
    let store = BaselineStore::in_memory().await.unwrap();
    store
        .commit(
            Uuid::new_v4(),
            &update(vec![upsert("t1", "T1", 1), upsert("t2", "T2", 1)], false),
            Utc::now(),
        )
        .await
        .unwrap();
    let before = store.load().await.baseline;

    // Wipe everything, insert one good row, then hit the empty-title check
    let bad = update(vec![upsert("t3", "T3", 2), upsert("t4", "", 2)], true);
    let result = store.commit(Uuid::new_v4(), &bad, Utc::now()).await;

    assert!(result.is_err());
    assert_eq!(store.load().await.baseline, before);
    assert_eq!(store.run_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_prune_drops_expired_entries() {
    let store = BaselineStore::in_memory().await.unwrap();
    store
        .commit(Uuid::new_v4(), &update(vec![upsert("old", "Old", -48)], false), Utc::now())
        .await
        .unwrap();

    let summary = store
        .commit(Uuid::new_v4(), &update(vec![upsert("new", "New", 1)], false), Utc::now())
        .await
        .unwrap();

    assert_eq!(summary.pruned, 1);
    let loaded = store.load().await;
    assert_eq!(loaded.baseline.len(), 1);
    assert!(loaded.baseline.get("weibo\u{1f}new").is_some());
}

#[tokio::test]
async fn test_unparseable_rows_load_as_corrupt() {
    let store = BaselineStore::in_memory().await.unwrap();
    sqlx::query(
        "INSERT INTO seen_titles (dedup_key, source_id, title, first_seen, last_seen) VALUES (?, 'weibo', 'T', 'yesterday', 'today')",
    )
    .bind("weibo\u{1f}t")
    .execute(store.pool())
    .await
    .unwrap();

    let loaded = store.load().await;
    assert!(loaded.corrupt.is_some());
    assert!(loaded.baseline.is_empty());
}

#[tokio::test]
async fn test_replace_all_discards_corrupt_rows() {
    let store = BaselineStore::in_memory().await.unwrap();
    sqlx::query(
        "INSERT INTO seen_titles (dedup_key, source_id, title, first_seen, last_seen) VALUES ('garbage', 'weibo', 'T', NULL, NULL)",
    )
    .execute(store.pool())
    .await
    .unwrap();
    assert!(store.load().await.corrupt.is_some());

    store
        .commit(Uuid::new_v4(), &update(vec![upsert("t1", "T1", 1)], true), Utc::now())
        .await
        .unwrap();

    let loaded = store.load().await;
    assert!(loaded.corrupt.is_none());
    assert_eq!(loaded.baseline.len(), 1);
}
