//! Database initialization
//!
//! The baseline database is created on first use. Table creation is
//! idempotent, so opening an existing database is always safe.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Open (or create) the baseline database and ensure its tables exist
///
/// The pool holds a single connection: a run reads the whole baseline and
/// then writes it back, and one connection keeps those steps from
/// interleaving with another user of the same pool.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new baseline database: {}", db_path.display());
    } else {
        info!("Opened existing baseline database: {}", db_path.display());
    }

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_baseline_tables(&pool).await?;

    Ok(pool)
}

/// In-memory baseline database (tests, dry runs)
pub async fn init_memory_database() -> Result<SqlitePool> {
    // The database lives only as long as its connection
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    create_baseline_tables(&pool).await?;

    Ok(pool)
}

/// Create baseline tables if missing
pub async fn create_baseline_tables(pool: &SqlitePool) -> Result<()> {
    create_seen_titles_table(pool).await?;
    create_baseline_runs_table(pool).await?;
    Ok(())
}

async fn create_seen_titles_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS seen_titles (
            dedup_key TEXT PRIMARY KEY CHECK (length(dedup_key) > 0),
            source_id TEXT NOT NULL,
            title TEXT NOT NULL CHECK (length(title) > 0),
            first_seen TEXT NOT NULL,
            last_seen TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_seen_titles_last_seen ON seen_titles(last_seen)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_baseline_runs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS baseline_runs (
            run_id TEXT PRIMARY KEY,
            committed_at TEXT NOT NULL,
            inserted INTEGER NOT NULL,
            refreshed INTEGER NOT NULL,
            pruned INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
