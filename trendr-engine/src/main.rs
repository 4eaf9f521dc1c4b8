//! trendr - hot-topic aggregation command line
//!
//! Reads an already-fetched snapshot of ranking lists, runs the aggregation
//! pipeline against the persisted baseline and prints the report plus the
//! per-channel message batches as JSON on stdout.

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trendr_common::config::TrendConfig;
use trendr_engine::matcher::{parse_keyword_file, KeywordFile, MatchEngine};
use trendr_engine::new_items::BaselineStore;
use trendr_engine::{Diagnostic, Diagnostics, Pipeline, RawTitle, RunInput};

/// Command-line arguments for trendr
#[derive(Parser, Debug)]
#[command(name = "trendr")]
#[command(about = "Aggregate hot-topic ranking lists into keyword reports")]
#[command(version)]
struct Args {
    /// Config file (overrides TRENDR_CONFIG and the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one aggregation pass over a snapshot
    Run {
        /// JSON array of raw titles
        #[arg(short, long)]
        input: PathBuf,

        /// Source ids whose fetch failed this cycle
        #[arg(long = "failed")]
        failed: Vec<String>,

        /// Run timestamp (RFC 3339); defaults to the current time
        #[arg(long)]
        now: Option<DateTime<Utc>>,

        /// Do not update the baseline
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate the configuration and keyword groups
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = TrendConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;

    // Initialize tracing; RUST_LOG wins over the configured level.
    // stdout carries the JSON report, so logs go to stderr or the log file.
    let level = &config.logging.level;
    let (file_layer, stderr_layer) = match &config.logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            (Some(layer), None)
        }
        None => (
            None,
            Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
        ),
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("trendr={0},trendr_engine={0},trendr_common={0}", level).into()
            }),
        )
        .with(file_layer)
        .with(stderr_layer)
        .init();

    info!(
        "trendr v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let keyword_file = load_keyword_file(&config);

    match args.command {
        Command::Run {
            input,
            failed,
            now,
            dry_run,
        } => run(&config, keyword_file, input, failed, now, dry_run).await,
        Command::CheckConfig => check_config(&config, keyword_file),
    }
}

/// Keyword file referenced by the config
///
/// A read failure becomes a config diagnostic; the run continues with the
/// inline groups.
fn load_keyword_file(config: &TrendConfig) -> Result<Option<KeywordFile>, Diagnostic> {
    let Some(path) = &config.keyword_file else {
        return Ok(None);
    };
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let file = parse_keyword_file(&content);
            info!(path = %path.display(), groups = file.groups.len(), "Keyword file loaded");
            Ok(Some(file))
        }
        Err(e) => Err(Diagnostic::config(
            "keyword_file",
            format!("read {} failed: {}", path.display(), e),
        )),
    }
}

async fn run(
    config: &TrendConfig,
    keyword_file: Result<Option<KeywordFile>, Diagnostic>,
    input: PathBuf,
    failed_ids: Vec<String>,
    now: Option<DateTime<Utc>>,
    dry_run: bool,
) -> Result<()> {
    let content = std::fs::read_to_string(&input)
        .with_context(|| format!("Failed to read snapshot {}", input.display()))?;
    let titles: Vec<RawTitle> =
        serde_json::from_str(&content).context("Snapshot is not a JSON array of titles")?;

    let db_path = config.storage.baseline_db_path();
    let (store, open_error) = match BaselineStore::open(&db_path).await {
        Ok(store) => (store, None),
        Err(e) => {
            warn!(
                path = %db_path.display(),
                error = %e,
                "Baseline database unusable, using in-memory baseline"
            );
            let store = BaselineStore::in_memory()
                .await
                .context("Failed to open in-memory baseline")?;
            (store, Some(e.to_string()))
        }
    };

    let mut pipeline = Pipeline::new(config);
    let mut pre_diagnostics = Vec::new();
    match keyword_file {
        Ok(Some(file)) => pipeline = pipeline.with_keyword_file(file),
        Ok(None) => {}
        Err(diagnostic) => pre_diagnostics.push(diagnostic),
    }
    if let Some(message) = open_error {
        pre_diagnostics.push(Diagnostic::BaselineCorrupt { message });
    }

    let run_input = RunInput {
        titles,
        failed_ids,
        now: now.unwrap_or_else(trendr_common::time::now),
    };
    let mut outcome = pipeline.run(&store, run_input, !dry_run).await;
    for diagnostic in pre_diagnostics {
        outcome.diagnostics.push(diagnostic);
    }

    let stdout = std::io::stdout();
    serde_json::to_writer_pretty(stdout.lock(), &outcome).context("Failed to write report")?;
    println!();
    Ok(())
}

fn check_config(
    config: &TrendConfig,
    keyword_file: Result<Option<KeywordFile>, Diagnostic>,
) -> Result<()> {
    let mut problems = 0;

    for issue in config.validate() {
        println!("config: {}", issue);
        problems += 1;
    }

    let keyword_file = match keyword_file {
        Ok(file) => file,
        Err(diagnostic) => {
            println!("{}", diagnostic);
            problems += 1;
            None
        }
    };

    let mut diagnostics = Diagnostics::new();
    let engine = MatchEngine::from_config(config, keyword_file.as_ref(), &mut diagnostics);
    for diagnostic in diagnostics.iter() {
        println!("{}", diagnostic);
        problems += 1;
    }

    println!(
        "{} keyword group(s){}, {} channel(s), {} problem(s)",
        engine.groups().len(),
        if engine.is_catch_all() { " (catch-all)" } else { "" },
        config.channels.len(),
        problems
    );

    if problems > 0 {
        anyhow::bail!("configuration has {} problem(s)", problems);
    }
    Ok(())
}
