//! One aggregation run, end to end
//!
//! TitleStore → MatchEngine → ScoreWeighting → NewItemDetector →
//! ReportAssembler → batch splitting per channel. Every stage except the
//! baseline load and commit is synchronous and pure.

use crate::batch::{render_batches, MarkupTemplate, MessageBatch};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::matcher::{KeywordFile, MatchEngine};
use crate::new_items::{Baseline, BaselineStore, Detection, NewItemDetector};
use crate::report::{NewTitleIndex, ReportAssembler, ReportData};
use crate::scoring::{KeywordGroup, ScoreWeighting};
use crate::title_store::{AggregatedTitle, RawTitle, TitleStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use trendr_common::config::{ChannelKind, TrendConfig};
use uuid::Uuid;

/// Already-fetched input of one run
#[derive(Debug, Clone)]
pub struct RunInput {
    pub titles: Vec<RawTitle>,
    pub failed_ids: Vec<String>,
    pub now: DateTime<Utc>,
}

/// Batches for one configured channel
#[derive(Debug, Clone, Serialize)]
pub struct ChannelOutput {
    pub name: String,
    pub kind: ChannelKind,
    pub max_bytes: usize,
    pub batches: Vec<MessageBatch>,
}

/// Pure part of a run
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Canonical titles with `is_new` resolved
    pub titles: Vec<AggregatedTitle>,
    pub stats: Vec<KeywordGroup>,
    pub detection: Detection,
    pub report: ReportData,
}

/// Everything a run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub report: ReportData,
    pub has_valid_content: bool,
    pub channels: Vec<ChannelOutput>,
    pub new_count: usize,
    pub committed: bool,
    pub diagnostics: Diagnostics,
}

/// Runs the stages with one immutable configuration
pub struct Pipeline<'a> {
    config: &'a TrendConfig,
    keyword_file: Option<KeywordFile>,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a TrendConfig) -> Self {
        Self {
            config,
            keyword_file: None,
        }
    }

    /// Add groups and filters from a parsed keyword file
    pub fn with_keyword_file(mut self, keyword_file: KeywordFile) -> Self {
        self.keyword_file = Some(keyword_file);
        self
    }

    /// Aggregate, match, score, detect and assemble
    ///
    /// `replace_all` plans a full baseline rewrite, used when the stored
    /// baseline could not be read.
    pub fn analyze(
        &self,
        input: &RunInput,
        baseline: &Baseline,
        replace_all: bool,
        diagnostics: &mut Diagnostics,
    ) -> Analysis {
        let config = self.config;
        if config.recent_days == 0 {
            diagnostics.push(Diagnostic::config("recent_days", "must be at least 1; using 1"));
        }
        if config.configured_offset().is_none() {
            diagnostics.push(Diagnostic::config(
                "report.utc_offset_hours",
                format!("{} is out of range; using UTC", config.report.utc_offset_hours),
            ));
        }

        // Crawl cycles in time order; sort is stable within a cycle
        let mut raws: Vec<&RawTitle> = input.titles.iter().collect();
        raws.sort_by_key(|r| r.observed_at);

        let names = config.source_names();
        let mut store = TitleStore::new(config.dedup.scope);
        store.extend(raws);
        store.apply_source_names(&names);
        info!(
            raw = input.titles.len(),
            aggregated = store.len(),
            skipped = store.skipped(),
            "Titles aggregated"
        );

        let engine = MatchEngine::from_config(config, self.keyword_file.as_ref(), diagnostics);
        let matches = engine.match_titles(store.titles());

        let weighting = ScoreWeighting::from_config(config, diagnostics);
        let mut stats = weighting.rank_groups(matches, store.len());

        let detector = NewItemDetector::new(config.recent_days);
        let detection = detector.detect_with(store.titles(), baseline, input.now, replace_all);
        detection.annotate_groups(&mut stats);

        let source_order = store.source_order().to_vec();
        let mut titles = store.into_titles();
        detection.annotate(&mut titles);

        let index = NewTitleIndex::build(&titles, &source_order, |t| engine.matches_any(t));
        let latest_cycle = titles.iter().map(|t| t.last_seen).max();
        let report = ReportAssembler::from_config(config, &names)
            .with_latest_cycle(latest_cycle)
            .assemble(&stats, &input.failed_ids, &index);

        Analysis {
            titles,
            stats,
            detection,
            report,
        }
    }

    /// Split the report for every configured channel
    pub fn render_channels(
        &self,
        report: &ReportData,
        now: DateTime<Utc>,
        diagnostics: &mut Diagnostics,
    ) -> Vec<ChannelOutput> {
        let offset = self.config.display_offset();

        self.config
            .channels
            .iter()
            .map(|channel| {
                let max_bytes = match channel.max_bytes {
                    Some(0) => {
                        diagnostics.push(Diagnostic::config(
                            format!("channels.{}.max_bytes", channel.name),
                            "must be greater than 0; using the channel default",
                        ));
                        channel.kind.default_max_bytes()
                    }
                    _ => channel.effective_max_bytes(),
                };

                let template = MarkupTemplate::new(&channel.name, channel.kind, now, offset);
                let batches = render_batches(report, &template, max_bytes, diagnostics);
                info!(
                    channel = %channel.name,
                    kind = channel.kind.as_str(),
                    batches = batches.len(),
                    max_bytes,
                    "Channel rendered"
                );

                ChannelOutput {
                    name: channel.name.clone(),
                    kind: channel.kind,
                    max_bytes,
                    batches,
                }
            })
            .collect()
    }

    /// Full run against a baseline store
    ///
    /// With `commit` false the baseline is read but left untouched. A failed
    /// commit is a diagnostic; the report is returned either way.
    pub async fn run(&self, store: &BaselineStore, input: RunInput, commit: bool) -> RunOutcome {
        let run_id = Uuid::new_v4();
        let mut diagnostics = Diagnostics::new();
        info!(run_id = %run_id, mode = self.config.mode.as_str(), "Run started");

        let loaded = store.load().await;
        let replace_all = match loaded.corrupt {
            Some(message) => {
                diagnostics.push(Diagnostic::BaselineCorrupt { message });
                true
            }
            None => false,
        };

        let analysis = self.analyze(&input, &loaded.baseline, replace_all, &mut diagnostics);
        let channels = self.render_channels(&analysis.report, input.now, &mut diagnostics);

        let committed = if commit {
            match store.commit(run_id, &analysis.detection.update, input.now).await {
                Ok(_) => true,
                Err(e) => {
                    diagnostics.push(Diagnostic::BaselineCommitFailed {
                        message: e.to_string(),
                    });
                    false
                }
            }
        } else {
            info!(run_id = %run_id, "Dry run, baseline left unchanged");
            false
        };

        info!(
            run_id = %run_id,
            groups = analysis.report.stats.len(),
            new = analysis.detection.new_count(),
            channels = channels.len(),
            diagnostics = diagnostics.len(),
            "Run finished"
        );

        RunOutcome {
            run_id,
            has_valid_content: analysis.report.has_valid_content(),
            report: analysis.report,
            channels,
            new_count: analysis.detection.new_count(),
            committed,
            diagnostics,
        }
    }
}
