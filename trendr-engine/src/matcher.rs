//! Keyword group matching
//!
//! A keyword group is a conjunction of [`KeywordRule`] clauses evaluated over
//! normalized (cleaned, lowercased) title text. Groups are independent: one
//! title may land in several groups or in none.

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::title_store::{normalize_title, AggregatedTitle, DedupKey};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info};
use trendr_common::config::{KeywordGroupConfig, TrendConfig};

/// Display word of the group used when no valid group is configured
pub const CATCH_ALL_WORD: &str = "All news";

/// One clause of a keyword group
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeywordRule {
    /// Title contains the word
    Contains(String),
    /// Title contains every word
    AllOf(Vec<String>),
    /// Title contains at least one word
    AnyOf(Vec<String>),
    /// Title contains none of the words
    NoneOf(Vec<String>),
}

impl KeywordRule {
    /// Evaluate against normalized title text
    pub fn matches(&self, normalized: &str) -> bool {
        match self {
            KeywordRule::Contains(word) => normalized.contains(word.as_str()),
            KeywordRule::AllOf(words) => words.iter().all(|w| normalized.contains(w.as_str())),
            KeywordRule::AnyOf(words) => words.iter().any(|w| normalized.contains(w.as_str())),
            KeywordRule::NoneOf(words) => !words.iter().any(|w| normalized.contains(w.as_str())),
        }
    }

    /// Whether the clause can select titles on its own
    pub fn is_positive(&self) -> bool {
        !matches!(self, KeywordRule::NoneOf(_))
    }

    fn name(&self) -> &'static str {
        match self {
            KeywordRule::Contains(_) => "contains",
            KeywordRule::AllOf(_) => "all_of",
            KeywordRule::AnyOf(_) => "any_of",
            KeywordRule::NoneOf(_) => "none_of",
        }
    }

    fn words(&self) -> Vec<&String> {
        match self {
            KeywordRule::Contains(word) => vec![word],
            KeywordRule::AllOf(words) | KeywordRule::AnyOf(words) | KeywordRule::NoneOf(words) => {
                words.iter().collect()
            }
        }
    }

    /// Lowercase every word so matching is case-insensitive
    fn normalized(self) -> Self {
        let lower =
            |words: Vec<String>| -> Vec<String> { words.iter().map(|w| normalize_title(w)).collect() };
        match self {
            KeywordRule::Contains(word) => KeywordRule::Contains(normalize_title(&word)),
            KeywordRule::AllOf(words) => KeywordRule::AllOf(lower(words)),
            KeywordRule::AnyOf(words) => KeywordRule::AnyOf(lower(words)),
            KeywordRule::NoneOf(words) => KeywordRule::NoneOf(lower(words)),
        }
    }
}

/// Why a keyword group was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("group has no display word")]
    MissingWord,

    #[error("group has no clauses")]
    NoClauses,

    #[error("{0} list is empty")]
    EmptyList(&'static str),

    #[error("{0} contains a blank word")]
    BlankWord(&'static str),

    #[error("group only excludes titles; add contains, all_of or any_of")]
    NoPositiveClause,
}

/// Validated keyword group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordGroupRule {
    pub word: String,
    /// Position in configuration order, used for tie-breaking
    pub position: usize,
    clauses: Vec<KeywordRule>,
}

impl KeywordGroupRule {
    pub fn new(word: &str, position: usize, clauses: Vec<KeywordRule>) -> Result<Self, RuleError> {
        let word = word.trim();
        if word.is_empty() {
            return Err(RuleError::MissingWord);
        }
        if clauses.is_empty() {
            return Err(RuleError::NoClauses);
        }
        for clause in &clauses {
            let words = clause.words();
            if words.is_empty() {
                return Err(RuleError::EmptyList(clause.name()));
            }
            if words.iter().any(|w| w.trim().is_empty()) {
                return Err(RuleError::BlankWord(clause.name()));
            }
        }
        if !clauses.iter().any(KeywordRule::is_positive) {
            return Err(RuleError::NoPositiveClause);
        }

        Ok(Self {
            word: word.to_string(),
            position,
            clauses: clauses.into_iter().map(KeywordRule::normalized).collect(),
        })
    }

    /// Build from the config-file representation
    pub fn compile(position: usize, config: &KeywordGroupConfig) -> Result<Self, RuleError> {
        let mut clauses = Vec::new();
        if let Some(word) = &config.contains {
            clauses.push(KeywordRule::Contains(word.clone()));
        }
        if let Some(words) = &config.all_of {
            clauses.push(KeywordRule::AllOf(words.clone()));
        }
        if let Some(words) = &config.any_of {
            clauses.push(KeywordRule::AnyOf(words.clone()));
        }
        if let Some(words) = &config.none_of {
            clauses.push(KeywordRule::NoneOf(words.clone()));
        }
        Self::new(&config.word, position, clauses)
    }

    /// Catch-all group matching every title
    fn catch_all() -> Self {
        Self {
            word: CATCH_ALL_WORD.to_string(),
            position: 0,
            clauses: vec![KeywordRule::NoneOf(Vec::new())],
        }
    }

    pub fn clauses(&self) -> &[KeywordRule] {
        &self.clauses
    }

    pub fn matches(&self, normalized: &str) -> bool {
        self.clauses.iter().all(|c| c.matches(normalized))
    }
}

/// Keyword groups and filters read from a line-based keyword file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordFile {
    pub groups: Vec<KeywordGroupConfig>,
    pub filters: Vec<String>,
}

/// Parse the line-based keyword format
///
/// Groups are separated by blank lines. Inside a group, `+word` is required,
/// `!word` excludes (and is also collected as a global filter), and any other
/// line is an alternative. Blocks holding only `!` lines contribute filters
/// but no group.
pub fn parse_keyword_file(content: &str) -> KeywordFile {
    let mut file = KeywordFile::default();

    for block in content.split("\n\n") {
        let mut plain = Vec::new();
        let mut required = Vec::new();
        let mut excluded = Vec::new();

        for line in block.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if let Some(word) = line.strip_prefix('!') {
                excluded.push(word.trim().to_string());
                file.filters.push(word.trim().to_string());
            } else if let Some(word) = line.strip_prefix('+') {
                required.push(word.trim().to_string());
            } else {
                plain.push(line.to_string());
            }
        }

        if plain.is_empty() && required.is_empty() {
            continue;
        }

        let word = if plain.is_empty() {
            required.join(" ")
        } else {
            plain.join(" ")
        };
        file.groups.push(KeywordGroupConfig {
            word,
            contains: None,
            all_of: (!required.is_empty()).then_some(required),
            any_of: (!plain.is_empty()).then_some(plain),
            none_of: (!excluded.is_empty()).then_some(excluded),
        });
    }

    file
}

/// Titles of one group, before scoring
#[derive(Debug, Clone, PartialEq)]
pub struct GroupMatch {
    pub word: String,
    pub position: usize,
    pub titles: Vec<AggregatedTitle>,
}

impl GroupMatch {
    /// Total sightings across the group's titles
    pub fn sightings(&self) -> usize {
        self.titles.iter().map(AggregatedTitle::count).sum()
    }
}

/// Compiled keyword groups plus global filters
#[derive(Debug, Clone)]
pub struct MatchEngine {
    groups: Vec<KeywordGroupRule>,
    global_filters: Vec<String>,
    catch_all: bool,
}

impl MatchEngine {
    /// Build from valid groups; an empty list enables the catch-all group
    pub fn new(groups: Vec<KeywordGroupRule>, global_filters: &[String]) -> Self {
        let catch_all = groups.is_empty();
        let groups = if catch_all {
            vec![KeywordGroupRule::catch_all()]
        } else {
            groups
        };
        let global_filters = if catch_all {
            Vec::new()
        } else {
            global_filters
                .iter()
                .map(|w| normalize_title(w))
                .filter(|w| !w.is_empty())
                .collect()
        };
        Self {
            groups,
            global_filters,
            catch_all,
        }
    }

    /// Compile config groups followed by keyword-file groups
    ///
    /// Malformed groups are skipped with a config diagnostic each.
    pub fn from_config(
        config: &TrendConfig,
        keyword_file: Option<&KeywordFile>,
        diagnostics: &mut Diagnostics,
    ) -> Self {
        let file_groups = keyword_file.map(|f| f.groups.as_slice()).unwrap_or(&[]);
        let mut groups = Vec::new();

        for (position, group) in config.keyword_groups.iter().chain(file_groups).enumerate() {
            match KeywordGroupRule::compile(position, group) {
                Ok(rule) => groups.push(rule),
                Err(e) => diagnostics.push(Diagnostic::config(
                    format!("keyword group #{} ({:?})", position + 1, group.word),
                    e.to_string(),
                )),
            }
        }

        let mut filters = config.global_filters.clone();
        if let Some(file) = keyword_file {
            filters.extend(file.filters.iter().cloned());
        }

        let engine = Self::new(groups, &filters);
        info!(
            groups = engine.groups.len(),
            global_filters = engine.global_filters.len(),
            catch_all = engine.catch_all,
            "Keyword groups compiled"
        );
        engine
    }

    pub fn groups(&self) -> &[KeywordGroupRule] {
        &self.groups
    }

    /// True when no group was configured and every title matches
    pub fn is_catch_all(&self) -> bool {
        self.catch_all
    }

    fn is_filtered(&self, normalized: &str) -> bool {
        self.global_filters
            .iter()
            .any(|w| normalized.contains(w.as_str()))
    }

    /// Whether a title survives global filters and lands in some group
    pub fn matches_any(&self, title: &AggregatedTitle) -> bool {
        let normalized = title.key.normalized();
        !self.is_filtered(normalized) && self.groups.iter().any(|g| g.matches(normalized))
    }

    /// Membership of every group, in configuration order
    ///
    /// Titles sharing a dedup key inside one group are merged by
    /// concatenating their rank lists.
    pub fn match_titles(&self, titles: &[AggregatedTitle]) -> Vec<GroupMatch> {
        self.groups
            .iter()
            .map(|group| {
                let mut matched: Vec<AggregatedTitle> = Vec::new();
                let mut seen: HashMap<&DedupKey, usize> = HashMap::new();

                for title in titles {
                    let normalized = title.key.normalized();
                    if self.is_filtered(normalized) || !group.matches(normalized) {
                        continue;
                    }
                    match seen.get(&title.key) {
                        Some(&i) => matched[i].absorb(title),
                        None => {
                            seen.insert(&title.key, matched.len());
                            matched.push(title.clone());
                        }
                    }
                }

                debug!(word = %group.word, titles = matched.len(), "Group matched");
                GroupMatch {
                    word: group.word.clone(),
                    position: group.position,
                    titles: matched,
                }
            })
            .collect()
    }
}
