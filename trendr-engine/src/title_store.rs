//! Per-run title aggregation
//!
//! Every fetch cycle yields one [`RawTitle`] per listed item. Within a run,
//! sightings that share a [`DedupKey`] are merged into one
//! [`AggregatedTitle`] whose rank list grows by one entry per sighting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;
use trendr_common::config::DedupScope;

/// Separator between source id and title in the encoded key
const KEY_SEPARATOR: char = '\u{1f}';

/// One listing entry as scraped from a ranking source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTitle {
    pub source_id: String,
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub mobile_url: String,
    /// 1-based position on the source's list
    pub rank: u32,
    pub observed_at: DateTime<Utc>,
}

/// Replace line breaks with spaces and collapse whitespace runs
pub fn clean_title(title: &str) -> String {
    title.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text that keyword rules and dedup keys operate on
pub fn normalize_title(title: &str) -> String {
    clean_title(title).to_lowercase()
}

/// Identity of one story within the configured dedup scope
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DedupKey {
    source_id: Option<String>,
    normalized: String,
}

impl DedupKey {
    /// Build the key for a title; `None` when the title is blank
    pub fn new(scope: DedupScope, source_id: &str, title: &str) -> Option<Self> {
        let normalized = normalize_title(title);
        if normalized.is_empty() {
            return None;
        }
        let source_id = match scope {
            DedupScope::PerSource => Some(source_id.to_string()),
            DedupScope::Title => None,
        };
        Some(Self {
            source_id,
            normalized,
        })
    }

    /// Normalized title text
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    pub fn source_id(&self) -> Option<&str> {
        self.source_id.as_deref()
    }

    /// Stable string form used as the baseline primary key
    pub fn encode(&self) -> String {
        format!(
            "{}{}{}",
            self.source_id.as_deref().unwrap_or(""),
            KEY_SEPARATOR,
            self.normalized
        )
    }

    /// Inverse of [`DedupKey::encode`]
    pub fn decode(encoded: &str) -> Option<Self> {
        let (source, normalized) = encoded.split_once(KEY_SEPARATOR)?;
        if normalized.is_empty() {
            return None;
        }
        Some(Self {
            source_id: (!source.is_empty()).then(|| source.to_string()),
            normalized: normalized.to_string(),
        })
    }
}

/// All sightings of one story within a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedTitle {
    #[serde(skip)]
    pub key: DedupKey,
    /// Cleaned display text of the first sighting
    pub title: String,
    /// Source of the first sighting
    pub source_id: String,
    pub source_name: String,
    /// Distinct sources that listed this story, in first-seen order
    pub sources: Vec<String>,
    /// One rank per sighting, in insertion order
    pub ranks: Vec<u32>,
    pub url: String,
    pub mobile_url: String,
    pub is_new: bool,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl AggregatedTitle {
    fn from_raw(key: DedupKey, raw: &RawTitle) -> Self {
        Self {
            key,
            title: clean_title(&raw.title),
            source_id: raw.source_id.clone(),
            source_name: raw.source_id.clone(),
            sources: vec![raw.source_id.clone()],
            ranks: vec![raw.rank],
            url: raw.url.clone(),
            mobile_url: raw.mobile_url.clone(),
            is_new: false,
            first_seen: raw.observed_at,
            last_seen: raw.observed_at,
        }
    }

    /// Number of sightings
    pub fn count(&self) -> usize {
        self.ranks.len()
    }

    pub fn best_rank(&self) -> Option<u32> {
        self.ranks.iter().copied().min()
    }

    /// Fold another aggregate of the same key into this one
    ///
    /// Ranks are concatenated as-is; links and sources only fill gaps.
    pub fn absorb(&mut self, other: &AggregatedTitle) {
        self.ranks.extend_from_slice(&other.ranks);
        for source in &other.sources {
            if !self.sources.contains(source) {
                self.sources.push(source.clone());
            }
        }
        if self.url.is_empty() {
            self.url = other.url.clone();
        }
        if self.mobile_url.is_empty() {
            self.mobile_url = other.mobile_url.clone();
        }
        self.first_seen = self.first_seen.min(other.first_seen);
        self.last_seen = self.last_seen.max(other.last_seen);
        self.is_new |= other.is_new;
    }

    fn record(&mut self, raw: &RawTitle) {
        self.ranks.push(raw.rank);
        if !self.sources.contains(&raw.source_id) {
            self.sources.push(raw.source_id.clone());
        }
        if self.url.is_empty() {
            self.url = raw.url.clone();
        }
        if self.mobile_url.is_empty() {
            self.mobile_url = raw.mobile_url.clone();
        }
        self.first_seen = self.first_seen.min(raw.observed_at);
        self.last_seen = self.last_seen.max(raw.observed_at);
    }
}

/// Run-scoped store of aggregated titles in first-seen order
#[derive(Debug, Clone)]
pub struct TitleStore {
    scope: DedupScope,
    titles: Vec<AggregatedTitle>,
    index: HashMap<DedupKey, usize>,
    source_order: Vec<String>,
    skipped: usize,
}

impl TitleStore {
    pub fn new(scope: DedupScope) -> Self {
        Self {
            scope,
            titles: Vec::new(),
            index: HashMap::new(),
            source_order: Vec::new(),
            skipped: 0,
        }
    }

    /// Merge one sighting; blank titles are counted and dropped
    pub fn ingest(&mut self, raw: &RawTitle) {
        if !self.source_order.contains(&raw.source_id) {
            self.source_order.push(raw.source_id.clone());
        }

        let Some(key) = DedupKey::new(self.scope, &raw.source_id, &raw.title) else {
            debug!(source = %raw.source_id, rank = raw.rank, "Skipping blank title");
            self.skipped += 1;
            return;
        };

        match self.index.get(&key) {
            Some(&position) => self.titles[position].record(raw),
            None => {
                self.index.insert(key.clone(), self.titles.len());
                self.titles.push(AggregatedTitle::from_raw(key, raw));
            }
        }
    }

    pub fn extend<'a>(&mut self, raws: impl IntoIterator<Item = &'a RawTitle>) {
        for raw in raws {
            self.ingest(raw);
        }
    }

    /// Resolve `source_name` on every title from an id → name map
    pub fn apply_source_names(&mut self, names: &HashMap<String, String>) {
        for title in &mut self.titles {
            if let Some(name) = names.get(&title.source_id) {
                title.source_name = name.clone();
            }
        }
    }

    pub fn titles(&self) -> &[AggregatedTitle] {
        &self.titles
    }

    pub fn into_titles(self) -> Vec<AggregatedTitle> {
        self.titles
    }

    /// Source ids in the order they first appeared in the input
    pub fn source_order(&self) -> &[String] {
        &self.source_order
    }

    /// Blank titles dropped during ingest
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }
}
