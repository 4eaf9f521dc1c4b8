//! Configuration loading and config file resolution
//!
//! The whole configuration lives in one TOML file. Every field has a built-in
//! default, so an empty file (or no file at all) yields a usable
//! configuration. Values are never read from process-wide state after
//! loading; the resulting [`TrendConfig`] is passed explicitly to every stage.
//!
//! # Config Path Priority
//!
//! 1. Command-line argument (highest priority)
//! 2. `TRENDR_CONFIG` environment variable
//! 3. `<user config dir>/trendr/config.toml`
//! 4. Built-in defaults (no file)

use crate::{Error, Result};
use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "TRENDR_CONFIG";

/// Presentation mode of a run
///
/// Detection of new titles is identical in every mode; the mode only decides
/// which titles the report shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportMode {
    /// Whole-day aggregation plus a new-items section
    #[default]
    Daily,
    /// Only titles that are new in this run
    Incremental,
    /// Titles present in the latest crawl cycle plus a new-items section
    Current,
}

impl ReportMode {
    /// Parse mode from string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Some(ReportMode::Daily),
            "incremental" => Some(ReportMode::Incremental),
            "current" => Some(ReportMode::Current),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportMode::Daily => "daily",
            ReportMode::Incremental => "incremental",
            ReportMode::Current => "current",
        }
    }
}

/// Which parts of a title identify "the same story"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupScope {
    /// (source id, normalized title)
    #[default]
    PerSource,
    /// Normalized title alone, merged across sources
    Title,
}

/// Order of titles inside one keyword group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TitleOrder {
    /// Order in which titles were first observed
    #[default]
    Input,
    /// Descending per-title news weight
    Weight,
}

/// Push channel flavour; selects markup template and default byte budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Wework,
    Telegram,
    Dingtalk,
    Feishu,
}

impl ChannelKind {
    /// Default message budget in UTF-8 bytes
    pub fn default_max_bytes(&self) -> usize {
        match self {
            ChannelKind::Wework => 4000,
            ChannelKind::Telegram => 4000,
            ChannelKind::Dingtalk => 20000,
            ChannelKind::Feishu => 29000,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Wework => "wework",
            ChannelKind::Telegram => "telegram",
            ChannelKind::Dingtalk => "dingtalk",
            ChannelKind::Feishu => "feishu",
        }
    }
}

/// Score weight coefficients
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightConfig {
    #[serde(default = "default_rank_weight")]
    pub rank_weight: f64,
    #[serde(default = "default_frequency_weight")]
    pub frequency_weight: f64,
    #[serde(default = "default_hotness_weight")]
    pub hotness_weight: f64,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            rank_weight: default_rank_weight(),
            frequency_weight: default_frequency_weight(),
            hotness_weight: default_hotness_weight(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DedupConfig {
    #[serde(default)]
    pub scope: DedupScope,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub title_order: TitleOrder,

    /// Offset applied to timestamps shown in messages (hours east of UTC)
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title_order: TitleOrder::default(),
            utc_offset_hours: default_utc_offset_hours(),
        }
    }
}

/// Ranking source (platform) known to the configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    /// Display name; falls back to the id
    #[serde(default)]
    pub name: Option<String>,
}

/// One keyword group as written in the config file
///
/// All present clauses must hold for a title to match. `None` means the
/// clause is absent; `Some(vec![])` is a malformed clause.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordGroupConfig {
    /// Display word of the group
    #[serde(default)]
    pub word: String,
    #[serde(default)]
    pub contains: Option<String>,
    #[serde(default)]
    pub all_of: Option<Vec<String>>,
    #[serde(default)]
    pub any_of: Option<Vec<String>>,
    #[serde(default)]
    pub none_of: Option<Vec<String>>,
}

/// One push channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub name: String,
    pub kind: ChannelKind,
    /// Message budget in UTF-8 bytes; defaults per kind
    #[serde(default)]
    pub max_bytes: Option<usize>,
}

impl ChannelConfig {
    pub fn effective_max_bytes(&self) -> usize {
        self.max_bytes.unwrap_or_else(|| self.kind.default_max_bytes())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite file holding the new-title baseline
    #[serde(default)]
    pub baseline_db: Option<PathBuf>,
}

impl StorageConfig {
    /// Configured baseline path, or `<data dir>/trendr/baseline.db`
    pub fn baseline_db_path(&self) -> PathBuf {
        if let Some(path) = &self.baseline_db {
            return path.clone();
        }
        dirs::data_local_dir()
            .map(|d| d.join("trendr").join("baseline.db"))
            .unwrap_or_else(|| PathBuf::from("./trendr_data/baseline.db"))
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Complete run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendConfig {
    #[serde(default)]
    pub mode: ReportMode,

    /// Titles ranked at or above this position get a highlight marker
    #[serde(default = "default_rank_threshold")]
    pub rank_threshold: u32,

    /// Retention horizon of the new-title baseline, in days
    #[serde(default = "default_recent_days")]
    pub recent_days: u32,

    #[serde(default)]
    pub weights: WeightConfig,

    #[serde(default)]
    pub dedup: DedupConfig,

    #[serde(default)]
    pub report: ReportConfig,

    #[serde(default)]
    pub sources: Vec<SourceConfig>,

    #[serde(default)]
    pub keyword_groups: Vec<KeywordGroupConfig>,

    /// Optional keyword file in the line-based group format
    #[serde(default)]
    pub keyword_file: Option<PathBuf>,

    /// Words that exclude a title from every group
    #[serde(default)]
    pub global_filters: Vec<String>,

    #[serde(default)]
    pub channels: Vec<ChannelConfig>,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            mode: ReportMode::default(),
            rank_threshold: default_rank_threshold(),
            recent_days: default_recent_days(),
            weights: WeightConfig::default(),
            dedup: DedupConfig::default(),
            report: ReportConfig::default(),
            sources: Vec::new(),
            keyword_groups: Vec::new(),
            keyword_file: None,
            global_filters: Vec::new(),
            channels: Vec::new(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Non-fatal problem found while validating a configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigIssue {
    pub field: String,
    pub message: String,
}

impl ConfigIssue {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl TrendConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        let config = Self::from_toml_str(&content)?;
        info!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Resolve and load the config file, falling back to defaults when no
    /// file exists. A file that exists but does not parse is an error.
    pub fn load_or_default(cli_arg: Option<&Path>) -> Result<Self> {
        match ConfigResolver::new(cli_arg).resolve() {
            Some(path) if path.exists() => Self::load(&path),
            Some(path) => {
                warn!(path = %path.display(), "Config file not found, using built-in defaults");
                Ok(Self::default())
            }
            None => {
                warn!("No config file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Map of source id → display name
    pub fn source_names(&self) -> HashMap<String, String> {
        self.sources
            .iter()
            .map(|s| (s.id.clone(), s.name.clone().unwrap_or_else(|| s.id.clone())))
            .collect()
    }

    /// Configured offset, or `None` when the hours are out of range
    pub fn configured_offset(&self) -> Option<FixedOffset> {
        self.report
            .utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
    }

    /// Timezone used for timestamps shown in messages
    pub fn display_offset(&self) -> FixedOffset {
        self.configured_offset().unwrap_or_else(|| Utc.fix())
    }

    /// Check value ranges without failing; every issue has a safe fallback
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        let weights = [
            ("weights.rank_weight", self.weights.rank_weight),
            ("weights.frequency_weight", self.weights.frequency_weight),
            ("weights.hotness_weight", self.weights.hotness_weight),
        ];
        for (field, value) in weights {
            if !value.is_finite() || value < 0.0 {
                issues.push(ConfigIssue::new(
                    field,
                    format!("must be a non-negative number, got {} (treated as 0)", value),
                ));
            }
        }

        if self.rank_threshold == 0 {
            issues.push(ConfigIssue::new("rank_threshold", "must be at least 1 (treated as 1)"));
        }

        if self.recent_days == 0 {
            issues.push(ConfigIssue::new("recent_days", "must be at least 1 (treated as 1)"));
        }

        if self.configured_offset().is_none() {
            issues.push(ConfigIssue::new(
                "report.utc_offset_hours",
                format!("{} is out of range (treated as 0)", self.report.utc_offset_hours),
            ));
        }

        let mut seen_channels = std::collections::HashSet::new();
        for channel in &self.channels {
            if channel.max_bytes == Some(0) {
                issues.push(ConfigIssue::new(
                    format!("channels.{}.max_bytes", channel.name),
                    "must be greater than 0",
                ));
            }
            if !seen_channels.insert(channel.name.as_str()) {
                issues.push(ConfigIssue::new(
                    format!("channels.{}", channel.name),
                    "duplicate channel name",
                ));
            }
        }

        let mut seen_sources = std::collections::HashSet::new();
        for source in &self.sources {
            if !seen_sources.insert(source.id.as_str()) {
                issues.push(ConfigIssue::new(format!("sources.{}", source.id), "duplicate source id"));
            }
        }

        issues
    }
}

/// Config file path resolution
pub struct ConfigResolver {
    cli_arg: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(cli_arg: Option<&Path>) -> Self {
        Self {
            cli_arg: cli_arg.map(Path::to_path_buf),
        }
    }

    /// Highest-priority candidate path, if any
    pub fn resolve(&self) -> Option<PathBuf> {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_arg {
            return Some(path.clone());
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        // Priority 3: User config directory
        let user_config = dirs::config_dir().map(|d| d.join("trendr").join("config.toml"));
        if let Some(path) = user_config {
            if path.exists() {
                return Some(path);
            }
        }

        None
    }
}

fn default_rank_weight() -> f64 {
    0.6
}

fn default_frequency_weight() -> f64 {
    0.3
}

fn default_hotness_weight() -> f64 {
    0.1
}

fn default_rank_threshold() -> u32 {
    5
}

fn default_recent_days() -> u32 {
    1
}

fn default_utc_offset_hours() -> i32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = TrendConfig::from_toml_str("").unwrap();
        assert_eq!(config.mode, ReportMode::Daily);
        assert_eq!(config.rank_threshold, 5);
        assert_eq!(config.recent_days, 1);
        assert_eq!(config.weights, WeightConfig::default());
        assert_eq!(config.dedup.scope, DedupScope::PerSource);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!(ReportMode::parse("Incremental"), Some(ReportMode::Incremental));
        assert_eq!(ReportMode::parse(" current "), Some(ReportMode::Current));
        assert_eq!(ReportMode::parse("hourly"), None);
    }

    #[test]
    fn test_channel_budget_defaults() {
        let channel = ChannelConfig {
            name: "ops".to_string(),
            kind: ChannelKind::Dingtalk,
            max_bytes: None,
        };
        assert_eq!(channel.effective_max_bytes(), 20000);

        let custom = ChannelConfig {
            max_bytes: Some(512),
            ..channel
        };
        assert_eq!(custom.effective_max_bytes(), 512);
    }

    #[test]
    fn test_validate_reports_bad_values() {
        let mut config = TrendConfig::default();
        config.weights.rank_weight = -1.0;
        config.weights.hotness_weight = f64::NAN;
        config.recent_days = 0;
        config.report.utc_offset_hours = 30;

        let fields: Vec<String> = config.validate().into_iter().map(|i| i.field).collect();
        assert!(fields.contains(&"weights.rank_weight".to_string()));
        assert!(fields.contains(&"weights.hotness_weight".to_string()));
        assert!(fields.contains(&"recent_days".to_string()));
        assert!(fields.contains(&"report.utc_offset_hours".to_string()));
        assert!(!fields.contains(&"weights.frequency_weight".to_string()));
    }

    #[test]
    fn test_display_offset_falls_back_to_utc() {
        let mut config = TrendConfig::default();
        assert_eq!(config.display_offset().local_minus_utc(), 8 * 3600);

        config.report.utc_offset_hours = 99;
        assert_eq!(config.display_offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_huge_offset_does_not_overflow() {
        let config = TrendConfig::from_toml_str("[report]\nutc_offset_hours = 1000000\n").unwrap();

        assert!(config.configured_offset().is_none());
        assert_eq!(config.display_offset().local_minus_utc(), 0);
        let fields: Vec<String> = config.validate().into_iter().map(|i| i.field).collect();
        assert!(fields.contains(&"report.utc_offset_hours".to_string()));
    }

    #[test]
    fn test_source_names_fall_back_to_id() {
        let mut config = TrendConfig::default();
        config.sources = vec![
            SourceConfig { id: "weibo".to_string(), name: Some("Weibo".to_string()) },
            SourceConfig { id: "zhihu".to_string(), name: None },
        ];
        let names = config.source_names();
        assert_eq!(names["weibo"], "Weibo");
        assert_eq!(names["zhihu"], "zhihu");
    }
}
