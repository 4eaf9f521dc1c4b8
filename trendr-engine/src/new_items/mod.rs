//! New-title detection against a persisted baseline
//!
//! Detection itself is a pure function of (titles, baseline snapshot, now).
//! It also plans the baseline update for the run; [`store::BaselineStore`]
//! applies that plan atomically.

pub mod store;

pub use store::{BaselineStore, CommitSummary, LoadedBaseline};

use crate::scoring::KeywordGroup;
use crate::title_store::{AggregatedTitle, DedupKey};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tracing::info;
use trendr_common::time::window_start;

/// One previously seen story
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenEntry {
    pub source_id: String,
    pub title: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Snapshot of seen dedup keys, keyed by encoded [`DedupKey`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Baseline {
    entries: HashMap<String, SeenEntry>,
}

impl Baseline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: String, entry: SeenEntry) {
        self.entries.insert(key, entry);
    }

    pub fn get(&self, key: &str) -> Option<&SeenEntry> {
        self.entries.get(key)
    }

    /// Whether the key was seen at or after `since`
    pub fn seen_since(&self, key: &str, since: DateTime<Utc>) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| entry.last_seen >= since)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SeenEntry)> {
        self.entries.iter()
    }

    /// In-memory equivalent of committing `update`
    pub fn apply(&self, update: &BaselineUpdate) -> Baseline {
        let mut next = if update.replace_all {
            Baseline::new()
        } else {
            self.clone()
        };
        next.entries
            .retain(|_, entry| entry.last_seen >= update.prune_before);
        for upsert in &update.upserts {
            let first_seen = next
                .entries
                .get(&upsert.key)
                .map(|existing| existing.first_seen)
                .unwrap_or(upsert.first_seen);
            next.entries.insert(
                upsert.key.clone(),
                SeenEntry {
                    source_id: upsert.source_id.clone(),
                    title: upsert.title.clone(),
                    first_seen,
                    last_seen: upsert.last_seen,
                },
            );
        }
        next
    }
}

/// Row written for one title of this run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaselineUpsert {
    pub key: String,
    pub source_id: String,
    pub title: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Full baseline change for one run, applied as a single unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaselineUpdate {
    pub upserts: Vec<BaselineUpsert>,
    /// Entries last seen before this instant are dropped
    pub prune_before: DateTime<Utc>,
    /// Discard every stored entry first (used after a corrupt load)
    pub replace_all: bool,
}

/// Outcome of detection for one run
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    new_keys: HashSet<DedupKey>,
    pub window_start: DateTime<Utc>,
    pub update: BaselineUpdate,
}

impl Detection {
    pub fn is_new(&self, key: &DedupKey) -> bool {
        self.new_keys.contains(key)
    }

    pub fn new_count(&self) -> usize {
        self.new_keys.len()
    }

    /// Set `is_new` on canonical title records
    pub fn annotate(&self, titles: &mut [AggregatedTitle]) {
        for title in titles {
            title.is_new = self.is_new(&title.key);
        }
    }

    /// Set `is_new` on every title of every scored group
    pub fn annotate_groups(&self, groups: &mut [KeywordGroup]) {
        for group in groups {
            self.annotate(&mut group.matched_titles);
        }
    }
}

/// Flags titles whose dedup key is absent from the baseline window
#[derive(Debug, Clone, Copy)]
pub struct NewItemDetector {
    recent_days: u32,
}

impl NewItemDetector {
    /// A zero-day horizon is treated as one day
    pub fn new(recent_days: u32) -> Self {
        Self {
            recent_days: recent_days.max(1),
        }
    }

    pub fn recent_days(&self) -> u32 {
        self.recent_days
    }

    /// Resolve `is_new` for every title and plan the baseline update
    ///
    /// Pure: the same titles, baseline and `now` always give the same result.
    pub fn detect(&self, titles: &[AggregatedTitle], baseline: &Baseline, now: DateTime<Utc>) -> Detection {
        self.detect_with(titles, baseline, now, false)
    }

    /// Like [`NewItemDetector::detect`], optionally planning a full rewrite
    pub fn detect_with(
        &self,
        titles: &[AggregatedTitle],
        baseline: &Baseline,
        now: DateTime<Utc>,
        replace_all: bool,
    ) -> Detection {
        let since = window_start(now, self.recent_days);
        let mut new_keys = HashSet::new();
        let mut upserts = Vec::with_capacity(titles.len());

        for title in titles {
            let key = title.key.encode();
            if !baseline.seen_since(&key, since) {
                new_keys.insert(title.key.clone());
            }

            let (first_seen, last_seen) = match baseline.get(&key) {
                Some(entry) if entry.last_seen >= since => (
                    entry.first_seen.min(title.first_seen),
                    entry.last_seen.max(title.last_seen),
                ),
                _ => (title.first_seen, title.last_seen),
            };
            upserts.push(BaselineUpsert {
                key,
                source_id: title.source_id.clone(),
                title: title.title.clone(),
                first_seen,
                last_seen,
            });
        }

        info!(
            titles = titles.len(),
            new = new_keys.len(),
            baseline = baseline.len(),
            recent_days = self.recent_days,
            "New titles detected"
        );

        Detection {
            new_keys,
            window_start: since,
            update: BaselineUpdate {
                upserts,
                prune_before: since,
                replace_all,
            },
        }
    }
}
