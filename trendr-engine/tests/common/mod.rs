//! Shared fixtures for engine integration tests

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use trendr_common::config::TrendConfig;
use trendr_engine::RawTitle;

pub const CONFIG: &str = r#"
mode = "daily"
rank_threshold = 3
recent_days = 1
global_filters = ["sponsored"]

[report]
utc_offset_hours = 8

[[sources]]
id = "weibo"
name = "Weibo"

[[sources]]
id = "zhihu"
name = "Zhihu"

[[keyword_groups]]
word = "AI"
any_of = ["ai", "llm"]

[[keyword_groups]]
word = "Chips"
contains = "chip"

[[keyword_groups]]
word = "Space"
all_of = ["rocket", "launch"]

[[channels]]
name = "team"
kind = "wework"

[[channels]]
name = "alerts"
kind = "telegram"
max_bytes = 600
"#;

pub fn config() -> TrendConfig {
    TrendConfig::from_toml_str(CONFIG).unwrap()
}

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 1, 0, 0).unwrap()
}

pub fn raw(source: &str, title: &str, rank: u32, at: DateTime<Utc>) -> RawTitle {
    RawTitle {
        source_id: source.to_string(),
        title: title.to_string(),
        url: format!("https://{}.example/item/{}", source, rank),
        mobile_url: String::new(),
        rank,
        observed_at: at,
    }
}

/// Two crawl cycles, half an hour apart, over two sources
pub fn snapshot() -> Vec<RawTitle> {
    let first = base_time();
    let second = first + Duration::minutes(30);
    vec![
        raw("weibo", "New LLM tops benchmark", 1, first),
        raw("weibo", "Chip export rules tightened", 2, first),
        raw("weibo", "Celebrity wedding", 3, first),
        raw("zhihu", "How AI changes hiring", 4, first),
        raw("zhihu", "Rocket launch delayed by weather", 5, first),
        raw("zhihu", "Sponsored AI course", 6, first),
        raw("weibo", "New LLM tops benchmark", 2, second),
        raw("weibo", "Chip export rules tightened", 1, second),
        raw("zhihu", "How AI changes hiring", 3, second),
        raw("zhihu", "Chip fab opens in Arizona", 7, second),
    ]
}

/// Many titles for one group, to force multi-batch output
pub fn large_snapshot(count: u32) -> Vec<RawTitle> {
    (1..=count)
        .map(|i| {
            raw(
                if i % 2 == 0 { "weibo" } else { "zhihu" },
                &format!("AI story number {} with a reasonably long headline", i),
                i,
                base_time(),
            )
        })
        .collect()
}
