//! SQLite persistence of the new-title baseline

use super::{Baseline, BaselineUpdate, SeenEntry};
use crate::title_store::DedupKey;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::path::Path;
use tracing::{debug, info, warn};
use trendr_common::db::{init_database, init_memory_database};
use trendr_common::time::{parse_storage_string, to_storage_string};
use trendr_common::Result;
use uuid::Uuid;

/// Result of reading the baseline
#[derive(Debug, Clone, Default)]
pub struct LoadedBaseline {
    pub baseline: Baseline,
    /// Why the stored state was discarded, if it was
    pub corrupt: Option<String>,
}

/// Row counts written by one commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitSummary {
    pub run_id: Uuid,
    pub inserted: u64,
    pub refreshed: u64,
    pub pruned: u64,
}

/// Baseline table access
///
/// Callers must not run two load/commit cycles against the same database at
/// once.
#[derive(Clone)]
pub struct BaselineStore {
    db: SqlitePool,
}

impl BaselineStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Open (creating if needed) the baseline database file
    pub async fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(init_database(path).await?))
    }

    /// Throwaway baseline, used for dry runs and tests
    pub async fn in_memory() -> Result<Self> {
        Ok(Self::new(init_memory_database().await?))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    /// Read the full baseline
    ///
    /// Never fails: unreadable or unparseable state yields an empty baseline
    /// with the reason in `corrupt`.
    pub async fn load(&self) -> LoadedBaseline {
        let rows = sqlx::query_as::<_, (String, String, String, Option<String>, Option<String>)>(
            r#"
            SELECT dedup_key, source_id, title, first_seen, last_seen
            FROM seen_titles
            "#,
        )
        .fetch_all(&self.db)
        .await;

        let rows = match rows {
            Ok(rows) => rows,
            Err(e) => return corrupt(format!("read seen_titles failed: {}", e)),
        };

        let mut baseline = Baseline::new();
        for (key, source_id, title, first_seen, last_seen) in rows {
            if DedupKey::decode(&key).is_none() {
                return corrupt(format!("malformed dedup key {:?}", key));
            }
            let first_seen = first_seen.as_deref().and_then(parse_storage_string);
            let last_seen = last_seen.as_deref().and_then(parse_storage_string);
            let (Some(first_seen), Some(last_seen)) = (first_seen, last_seen) else {
                return corrupt(format!("unparseable timestamps for {:?}", title));
            };
            baseline.insert(
                key,
                SeenEntry {
                    source_id,
                    title,
                    first_seen,
                    last_seen,
                },
            );
        }

        debug!(entries = baseline.len(), "Baseline loaded");
        LoadedBaseline {
            baseline,
            corrupt: None,
        }
    }

    /// Apply `update` in one transaction and record the run
    ///
    /// On any error the transaction is rolled back and the stored baseline is
    /// unchanged.
    pub async fn commit(
        &self,
        run_id: Uuid,
        update: &BaselineUpdate,
        committed_at: DateTime<Utc>,
    ) -> Result<CommitSummary> {
        let mut tx = self.db.begin().await?;
        let mut pruned = 0;

        if update.replace_all {
            pruned += sqlx::query("DELETE FROM seen_titles")
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }

        pruned += sqlx::query("DELETE FROM seen_titles WHERE last_seen < ?")
            .bind(to_storage_string(update.prune_before))
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let mut inserted = 0;
        let mut refreshed = 0;
        for upsert in &update.upserts {
            let existing: Option<(String,)> =
                sqlx::query_as("SELECT dedup_key FROM seen_titles WHERE dedup_key = ?")
                    .bind(&upsert.key)
                    .fetch_optional(&mut *tx)
                    .await?;

            if existing.is_some() {
                sqlx::query(
                    "UPDATE seen_titles SET source_id = ?, title = ?, last_seen = ? WHERE dedup_key = ?",
                )
                .bind(&upsert.source_id)
                .bind(&upsert.title)
                .bind(to_storage_string(upsert.last_seen))
                .bind(&upsert.key)
                .execute(&mut *tx)
                .await?;
                refreshed += 1;
            } else {
                sqlx::query(
                    r#"
                    INSERT INTO seen_titles (dedup_key, source_id, title, first_seen, last_seen)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&upsert.key)
                .bind(&upsert.source_id)
                .bind(&upsert.title)
                .bind(to_storage_string(upsert.first_seen))
                .bind(to_storage_string(upsert.last_seen))
                .execute(&mut *tx)
                .await?;
                inserted += 1;
            }
        }

        sqlx::query(
            r#"
            INSERT INTO baseline_runs (run_id, committed_at, inserted, refreshed, pruned)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(run_id.to_string())
        .bind(to_storage_string(committed_at))
        .bind(inserted as i64)
        .bind(refreshed as i64)
        .bind(pruned as i64)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            run_id = %run_id,
            inserted,
            refreshed,
            pruned,
            "Baseline committed"
        );

        Ok(CommitSummary {
            run_id,
            inserted,
            refreshed,
            pruned,
        })
    }

    /// Number of committed runs
    pub async fn run_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM baseline_runs")
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }
}

fn corrupt(reason: String) -> LoadedBaseline {
    warn!(reason = %reason, "Baseline unreadable, starting from empty baseline");
    LoadedBaseline {
        baseline: Baseline::new(),
        corrupt: Some(reason),
    }
}
