//! Weighted group scoring
//!
//! Each group gets three raw components:
//!
//! - **rank**: for every title, `(T + 1 - best_rank) / T` clipped at zero,
//!   summed over the group, where `T` is the rank threshold. A title that
//!   reached position 1 contributes 1.0; one that never got above `T`
//!   contributes nothing.
//! - **frequency**: total sightings of the group's titles in this run.
//! - **hotness**: number of distinct sources listing any of the group's titles.
//!
//! `score = rank_weight * rank + frequency_weight * frequency + hotness_weight * hotness`.
//! Every component is a sum of non-negative terms per title, so adding a
//! title or a sighting never lowers the score.

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::matcher::GroupMatch;
use crate::title_store::AggregatedTitle;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::{debug, info};
use trendr_common::config::{TitleOrder, TrendConfig, WeightConfig};

/// Sanitized weight coefficients
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    pub rank: f64,
    pub frequency: f64,
    pub hotness: f64,
}

impl Weights {
    pub fn new(rank: f64, frequency: f64, hotness: f64) -> Self {
        Self {
            rank,
            frequency,
            hotness,
        }
    }

    /// Replace negative or non-finite coefficients by 0.0
    pub fn from_config(config: &WeightConfig, diagnostics: &mut Diagnostics) -> Self {
        let mut sanitize = |field: &str, value: f64| {
            if value.is_finite() && value >= 0.0 {
                value
            } else {
                diagnostics.push(Diagnostic::config(
                    format!("weights.{}", field),
                    format!("must be a non-negative number, got {}; using 0", value),
                ));
                0.0
            }
        };
        Self {
            rank: sanitize("rank_weight", config.rank_weight),
            frequency: sanitize("frequency_weight", config.frequency_weight),
            hotness: sanitize("hotness_weight", config.hotness_weight),
        }
    }
}

/// Raw per-group signals before weighting
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ScoreComponents {
    pub rank: f64,
    pub frequency: f64,
    pub hotness: f64,
}

impl ScoreComponents {
    pub fn of(titles: &[AggregatedTitle], rank_threshold: u32) -> Self {
        let threshold = f64::from(rank_threshold.max(1));
        let rank = titles
            .iter()
            .filter_map(AggregatedTitle::best_rank)
            .map(|best| ((threshold + 1.0 - f64::from(best)) / threshold).max(0.0))
            .sum::<f64>();
        let frequency = titles.iter().map(AggregatedTitle::count).sum::<usize>() as f64;
        let hotness = titles
            .iter()
            .flat_map(|t| t.sources.iter())
            .collect::<HashSet<_>>()
            .len() as f64;

        Self {
            rank,
            frequency,
            hotness,
        }
    }
}

/// One scored keyword group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordGroup {
    pub word: String,
    #[serde(skip)]
    pub position: usize,
    pub matched_titles: Vec<AggregatedTitle>,
    /// Number of matched titles
    pub count: usize,
    pub percentage: f64,
    pub score: f64,
    /// Denominator behind `percentage`
    #[serde(skip)]
    pub total_titles: usize,
}

/// `count / total * 100`, rounded half away from zero to two decimals
pub fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (count as f64 / total as f64 * 10_000.0).round() / 100.0
}

/// Per-title weight used to order titles inside a group
///
/// Mirrors the group signals on a 0–100 scale: average rank score where
/// positions beyond 10 count as 10, sightings capped at 10, and the share of
/// sightings at or above the rank threshold.
pub fn news_weight(title: &AggregatedTitle, rank_threshold: u32, weights: &Weights) -> f64 {
    if title.ranks.is_empty() {
        return 0.0;
    }
    let n = title.ranks.len() as f64;
    let rank_score = title
        .ranks
        .iter()
        .map(|&r| f64::from(11 - r.clamp(1, 10)))
        .sum::<f64>()
        / n;
    let frequency_score = title.count().min(10) as f64 * 10.0;
    let hot = title.ranks.iter().filter(|&&r| r <= rank_threshold).count() as f64;
    let hotness_score = hot / n * 100.0;

    weights.rank * rank_score * 10.0
        + weights.frequency * frequency_score
        + weights.hotness * hotness_score
}

/// Deterministic ordering of keyword groups
#[derive(Debug, Clone)]
pub struct ScoreWeighting {
    weights: Weights,
    rank_threshold: u32,
    title_order: TitleOrder,
}

impl ScoreWeighting {
    pub fn new(weights: Weights, rank_threshold: u32, title_order: TitleOrder) -> Self {
        Self {
            weights,
            rank_threshold: rank_threshold.max(1),
            title_order,
        }
    }

    pub fn from_config(config: &TrendConfig, diagnostics: &mut Diagnostics) -> Self {
        if config.rank_threshold == 0 {
            diagnostics.push(Diagnostic::config("rank_threshold", "must be at least 1; using 1"));
        }
        Self::new(
            Weights::from_config(&config.weights, diagnostics),
            config.rank_threshold,
            config.report.title_order,
        )
    }

    pub fn weights(&self) -> &Weights {
        &self.weights
    }

    pub fn rank_threshold(&self) -> u32 {
        self.rank_threshold
    }

    pub fn score(&self, components: &ScoreComponents) -> f64 {
        self.weights.rank * components.rank
            + self.weights.frequency * components.frequency
            + self.weights.hotness * components.hotness
    }

    /// Score groups and sort them by score, then count, then config order
    ///
    /// `total_titles` is the number of aggregated titles the groups were
    /// matched from.
    pub fn rank_groups(&self, matches: Vec<GroupMatch>, total_titles: usize) -> Vec<KeywordGroup> {
        let mut groups: Vec<KeywordGroup> = matches
            .into_iter()
            .map(|m| {
                let components = ScoreComponents::of(&m.titles, self.rank_threshold);
                let score = self.score(&components);
                debug!(word = %m.word, ?components, score, "Group scored");

                let mut titles = m.titles;
                if self.title_order == TitleOrder::Weight {
                    self.order_titles(&mut titles);
                }

                KeywordGroup {
                    word: m.word,
                    position: m.position,
                    count: titles.len(),
                    percentage: percentage(titles.len(), total_titles),
                    matched_titles: titles,
                    score,
                    total_titles,
                }
            })
            .collect();

        groups.sort_by(compare_groups);
        info!(groups = groups.len(), total_titles, "Groups ranked");
        groups
    }

    /// Stable sort by descending news weight
    fn order_titles(&self, titles: &mut [AggregatedTitle]) {
        titles.sort_by(|a, b| {
            let wa = news_weight(a, self.rank_threshold, &self.weights);
            let wb = news_weight(b, self.rank_threshold, &self.weights);
            wb.total_cmp(&wa)
        });
    }
}

fn compare_groups(a: &KeywordGroup, b: &KeywordGroup) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.count.cmp(&a.count))
        .then_with(|| a.position.cmp(&b.position))
}
