//! Channel-agnostic report assembly
//!
//! [`ReportAssembler::assemble`] is a pure function: it reads scored groups
//! and the new-title index and builds fresh [`ReportTitle`] display copies.
//! Canonical [`AggregatedTitle`] records are never modified.

use crate::scoring::{percentage, KeywordGroup};
use crate::title_store::AggregatedTitle;
use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;
use trendr_common::config::{ReportMode, TrendConfig};
use trendr_common::time::format_clock;

/// Display copy of one title
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportTitle {
    pub title: String,
    pub source_id: String,
    pub source_name: String,
    pub ranks: Vec<u32>,
    pub rank_threshold: u32,
    pub url: String,
    pub mobile_url: String,
    pub is_new: bool,
    pub count: usize,
    /// `HH:MM` or `[HH:MM ~ HH:MM]` in the display offset
    pub time_display: String,
}

impl ReportTitle {
    /// Build a display copy, showing `is_new` only when `present_as_new`
    pub fn render(
        title: &AggregatedTitle,
        present_as_new: bool,
        source_name: &str,
        rank_threshold: u32,
        offset: FixedOffset,
    ) -> Self {
        Self {
            title: title.title.clone(),
            source_id: title.source_id.clone(),
            source_name: source_name.to_string(),
            ranks: title.ranks.clone(),
            rank_threshold,
            url: title.url.clone(),
            mobile_url: title.mobile_url.clone(),
            is_new: present_as_new && title.is_new,
            count: title.count(),
            time_display: time_display(title.first_seen, title.last_seen, offset),
        }
    }

    /// Preferred link: mobile first, then desktop
    pub fn link(&self) -> &str {
        if self.mobile_url.is_empty() {
            &self.url
        } else {
            &self.mobile_url
        }
    }
}

/// `first` when both ends show the same clock time, else `[first ~ last]`
pub fn time_display(first: DateTime<Utc>, last: DateTime<Utc>, offset: FixedOffset) -> String {
    let first = format_clock(first, offset);
    let last = format_clock(last, offset);
    if first == last {
        first
    } else {
        format!("[{} ~ {}]", first, last)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportGroup {
    pub word: String,
    pub count: usize,
    pub percentage: f64,
    pub titles: Vec<ReportTitle>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTitleSection {
    pub source_id: String,
    pub source_name: String,
    pub titles: Vec<ReportTitle>,
}

/// Everything a channel renderer needs for one run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportData {
    pub mode: ReportMode,
    pub stats: Vec<ReportGroup>,
    pub new_titles: Vec<NewTitleSection>,
    pub failed_ids: Vec<String>,
    pub total_new_count: usize,
}

impl ReportData {
    /// Nothing to show at all
    pub fn is_empty(&self) -> bool {
        self.stats.is_empty() && self.new_titles.is_empty() && self.failed_ids.is_empty()
    }

    /// Titles listed across all groups
    pub fn total_titles(&self) -> usize {
        self.stats.iter().map(|g| g.titles.len()).sum()
    }

    /// Whether the report is worth pushing in its mode
    ///
    /// Incremental and current runs need matched titles; daily runs also
    /// accept a report carrying only new titles.
    pub fn has_valid_content(&self) -> bool {
        match self.mode {
            ReportMode::Incremental | ReportMode::Current => !self.stats.is_empty(),
            ReportMode::Daily => !self.stats.is_empty() || self.total_new_count > 0,
        }
    }
}

/// New titles of this run, grouped by source in source order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTitleIndex {
    sources: Vec<(String, Vec<AggregatedTitle>)>,
}

impl NewTitleIndex {
    /// Collect titles flagged new that satisfy `include`
    ///
    /// Sources follow `source_order`; sources missing from it are appended in
    /// first-appearance order.
    pub fn build(
        titles: &[AggregatedTitle],
        source_order: &[String],
        include: impl Fn(&AggregatedTitle) -> bool,
    ) -> Self {
        let mut sources: Vec<(String, Vec<AggregatedTitle>)> = source_order
            .iter()
            .map(|id| (id.clone(), Vec::new()))
            .collect();

        for title in titles.iter().filter(|t| t.is_new && include(t)) {
            match sources.iter_mut().find(|(id, _)| *id == title.source_id) {
                Some((_, list)) => list.push(title.clone()),
                None => sources.push((title.source_id.clone(), vec![title.clone()])),
            }
        }

        sources.retain(|(_, list)| !list.is_empty());
        Self { sources }
    }

    pub fn sources(&self) -> &[(String, Vec<AggregatedTitle>)] {
        &self.sources
    }

    pub fn total(&self) -> usize {
        self.sources.iter().map(|(_, list)| list.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Builds [`ReportData`] from scored groups
#[derive(Debug, Clone)]
pub struct ReportAssembler<'a> {
    names: &'a HashMap<String, String>,
    rank_threshold: u32,
    offset: FixedOffset,
    mode: ReportMode,
    latest_cycle: Option<DateTime<Utc>>,
}

impl<'a> ReportAssembler<'a> {
    pub fn new(
        names: &'a HashMap<String, String>,
        rank_threshold: u32,
        offset: FixedOffset,
        mode: ReportMode,
    ) -> Self {
        Self {
            names,
            rank_threshold: rank_threshold.max(1),
            offset,
            mode,
            latest_cycle: None,
        }
    }

    /// Newest crawl time of the run, over every title and not only matched ones
    ///
    /// Without it, current mode falls back to the newest matched title.
    pub fn with_latest_cycle(mut self, latest_cycle: Option<DateTime<Utc>>) -> Self {
        self.latest_cycle = latest_cycle;
        self
    }

    pub fn from_config(config: &TrendConfig, names: &'a HashMap<String, String>) -> Self {
        Self::new(names, config.rank_threshold, config.display_offset(), config.mode)
    }

    fn source_name<'n>(&'n self, id: &'n str) -> &'n str {
        self.names.get(id).map(String::as_str).unwrap_or(id)
    }

    fn render(&self, title: &AggregatedTitle, present_as_new: bool) -> ReportTitle {
        ReportTitle::render(
            title,
            present_as_new,
            self.source_name(&title.source_id),
            self.rank_threshold,
            self.offset,
        )
    }

    /// Assemble the report for this run's mode
    pub fn assemble(
        &self,
        stats: &[KeywordGroup],
        failed_ids: &[String],
        new_titles: &NewTitleIndex,
    ) -> ReportData {
        let latest = self.latest_cycle.or_else(|| {
            stats
                .iter()
                .flat_map(|g| g.matched_titles.iter())
                .map(|t| t.last_seen)
                .max()
        });

        let groups: Vec<ReportGroup> = stats
            .iter()
            .filter_map(|group| {
                let titles: Vec<ReportTitle> = group
                    .matched_titles
                    .iter()
                    .filter(|t| match self.mode {
                        ReportMode::Incremental => t.is_new,
                        ReportMode::Current => Some(t.last_seen) == latest,
                        ReportMode::Daily => true,
                    })
                    .map(|t| self.render(t, true))
                    .collect();

                if titles.is_empty() {
                    return None;
                }
                Some(ReportGroup {
                    word: group.word.clone(),
                    count: titles.len(),
                    percentage: percentage(titles.len(), group.total_titles),
                    titles,
                })
            })
            .collect();

        let sections: Vec<NewTitleSection> = if self.mode == ReportMode::Incremental {
            Vec::new()
        } else {
            new_titles
                .sources()
                .iter()
                .map(|(source_id, titles)| NewTitleSection {
                    source_id: source_id.clone(),
                    source_name: self.source_name(source_id).to_string(),
                    // Already marked by the section heading
                    titles: titles.iter().map(|t| self.render(t, false)).collect(),
                })
                .collect()
        };
        let total_new_count = sections.iter().map(|s| s.titles.len()).sum();

        info!(
            mode = self.mode.as_str(),
            groups = groups.len(),
            new_titles = total_new_count,
            failed = failed_ids.len(),
            "Report assembled"
        );

        ReportData {
            mode: self.mode,
            stats: groups,
            new_titles: sections,
            failed_ids: failed_ids.to_vec(),
            total_new_count,
        }
    }
}
