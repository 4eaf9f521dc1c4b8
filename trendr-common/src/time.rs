//! Timestamp utilities

use chrono::{DateTime, Duration, FixedOffset, SecondsFormat, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Fixed-width RFC 3339 form used for persisted timestamps
///
/// Always UTC with millisecond precision and a `Z` suffix, so stored values
/// sort lexicographically in time order.
pub fn to_storage_string(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a persisted timestamp
pub fn parse_storage_string(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Oldest timestamp still inside a retention window of `days` days ending at `now`
///
/// A zero-day window is widened to one day.
pub fn window_start(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    now - Duration::days(i64::from(days.max(1)))
}

/// `HH:MM` wall-clock time in the given display offset
pub fn format_clock(ts: DateTime<Utc>, offset: FixedOffset) -> String {
    ts.with_timezone(&offset).format("%H:%M").to_string()
}

/// `YYYY-MM-DD HH:MM:SS` in the given display offset
pub fn format_datetime(ts: DateTime<Utc>, offset: FixedOffset) -> String {
    ts.with_timezone(&offset).format("%Y-%m-%d %H:%M:%S").to_string()
}
