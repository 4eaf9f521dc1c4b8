//! Per-channel markup
//!
//! A [`ChannelTemplate`] turns report pieces into text. The fragment plan
//! decides which pieces exist and in what order; templates only decide how
//! they look.

use crate::report::{NewTitleSection, ReportData, ReportGroup, ReportTitle};
use chrono::{DateTime, FixedOffset, Utc};
use trendr_common::config::{ChannelKind, ReportMode};
use trendr_common::time::format_datetime;

/// Text pieces for one push channel
pub trait ChannelTemplate {
    /// Channel name used in logs and diagnostics
    fn name(&self) -> &str;

    /// Opening text of every batch
    fn header(&self, report: &ReportData) -> String;

    /// Closing text of every batch
    fn footer(&self) -> String;

    fn stats_heading(&self) -> String;

    /// Heading of the `index`-th (1-based) of `total` groups
    fn group_heading(&self, group: &ReportGroup, index: usize, total: usize) -> String;

    /// One numbered title line; `last` is the final line of its group or source
    fn title_line(&self, title: &ReportTitle, position: usize, show_source: bool, last: bool) -> String;

    fn group_separator(&self) -> String;

    fn section_separator(&self) -> String;

    fn new_section_heading(&self, total_new: usize) -> String;

    fn source_heading(&self, section: &NewTitleSection) -> String;

    fn source_separator(&self) -> String {
        "\n".to_string()
    }

    fn failed_heading(&self) -> String;

    fn failed_line(&self, source_id: &str) -> String;

    /// Body of the single batch sent when there is nothing to report
    fn empty_placeholder(&self, mode: ReportMode) -> String;
}

/// Escape text for HTML parse mode
pub fn html_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// `[min]` or `[min - max]`, emphasized when `min <= rank_threshold`
pub fn format_rank_display(ranks: &[u32], rank_threshold: u32, kind: ChannelKind) -> String {
    let (Some(&min), Some(&max)) = (ranks.iter().min(), ranks.iter().max()) else {
        return String::new();
    };
    let text = if min == max {
        format!("[{}]", min)
    } else {
        format!("[{} - {}]", min, max)
    };
    if min > rank_threshold {
        return text;
    }
    match kind {
        ChannelKind::Wework | ChannelKind::Dingtalk => format!("**{}**", text),
        ChannelKind::Telegram => format!("<b>{}</b>", text),
        ChannelKind::Feishu => format!("<font color='red'>**{}**</font>", text),
    }
}

fn heat_emoji(count: usize) -> &'static str {
    if count >= 10 {
        "🔥"
    } else if count >= 5 {
        "📈"
    } else {
        "📌"
    }
}

/// Built-in markup for the supported channel kinds
#[derive(Debug, Clone)]
pub struct MarkupTemplate {
    name: String,
    kind: ChannelKind,
    updated_at: String,
}

impl MarkupTemplate {
    pub fn new(name: &str, kind: ChannelKind, now: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self {
            name: name.to_string(),
            kind,
            updated_at: format_datetime(now, offset),
        }
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    fn bold(&self, text: &str) -> String {
        match self.kind {
            ChannelKind::Telegram => text.to_string(),
            _ => format!("**{}**", text),
        }
    }

    fn text(&self, text: &str) -> String {
        match self.kind {
            ChannelKind::Telegram => html_escape(text),
            _ => text.to_string(),
        }
    }

    fn link(&self, title: &ReportTitle) -> String {
        let link = title.link();
        match (self.kind, link.is_empty()) {
            (ChannelKind::Telegram, false) => {
                format!(
                    "<a href=\"{}\">{}</a>",
                    html_escape(&link),
                    html_escape(&title.title)
                )
            }
            (ChannelKind::Telegram, true) => html_escape(&title.title),
            (_, false) => format!("[{}]({})", title.title, link),
            (_, true) => title.title.clone(),
        }
    }
}

impl ChannelTemplate for MarkupTemplate {
    fn name(&self) -> &str {
        &self.name
    }

    fn header(&self, report: &ReportData) -> String {
        let total = report.total_titles();
        match self.kind {
            ChannelKind::Wework | ChannelKind::Feishu => format!("**Total titles:** {}\n\n", total),
            ChannelKind::Telegram => format!("Total titles: {}\n\n", total),
            ChannelKind::Dingtalk => format!(
                "**Total titles:** {}\n\n**Type:** hot keyword report\n\n---\n\n",
                total
            ),
        }
    }

    fn footer(&self) -> String {
        match self.kind {
            ChannelKind::Wework | ChannelKind::Dingtalk => {
                format!("\n\n> Updated: {}", self.updated_at)
            }
            ChannelKind::Telegram => format!("\n\nUpdated: {}", self.updated_at),
            ChannelKind::Feishu => {
                format!("\n\n<font color='grey'>Updated: {}</font>", self.updated_at)
            }
        }
    }

    fn stats_heading(&self) -> String {
        format!("📊 {}\n\n", self.bold("Hot keyword stats"))
    }

    fn group_heading(&self, group: &ReportGroup, index: usize, total: usize) -> String {
        let emoji = heat_emoji(group.count);
        let word = self.text(&group.word);
        let count = match self.kind {
            ChannelKind::Feishu if group.count >= 10 => {
                format!("<font color='red'>{}</font>", group.count)
            }
            ChannelKind::Feishu if group.count >= 5 => {
                format!("<font color='orange'>{}</font>", group.count)
            }
            ChannelKind::Telegram => group.count.to_string(),
            _ if group.count >= 5 => format!("**{}**", group.count),
            _ => group.count.to_string(),
        };
        format!(
            "{} [{}/{}] {} : {} titles\n\n",
            emoji,
            index,
            total,
            self.bold(&word),
            count
        )
    }

    fn title_line(&self, title: &ReportTitle, position: usize, show_source: bool, last: bool) -> String {
        let mut line = format!("  {}. ", position);

        if show_source {
            let source = self.text(&title.source_name);
            match self.kind {
                ChannelKind::Feishu => {
                    line.push_str(&format!("<font color='grey'>[{}]</font> ", source))
                }
                _ => line.push_str(&format!("[{}] ", source)),
            }
        }
        if title.is_new {
            line.push_str("🆕 ");
        }
        line.push_str(&self.link(title));

        let rank = format_rank_display(&title.ranks, title.rank_threshold, self.kind);
        if !rank.is_empty() {
            line.push(' ');
            line.push_str(&rank);
        }

        if !title.time_display.is_empty() {
            match self.kind {
                ChannelKind::Telegram => {
                    line.push_str(&format!(" <code>- {}</code>", title.time_display))
                }
                ChannelKind::Feishu => line.push_str(&format!(
                    " - <font color='grey'>{}</font>",
                    title.time_display
                )),
                _ => line.push_str(&format!(" - {}", title.time_display)),
            }
        }

        if title.count > 1 {
            match self.kind {
                ChannelKind::Telegram => line.push_str(&format!(" <code>({}x)</code>", title.count)),
                ChannelKind::Feishu => {
                    line.push_str(&format!(" <font color='green'>({}x)</font>", title.count))
                }
                _ => line.push_str(&format!(" ({}x)", title.count)),
            }
        }

        line.push('\n');
        if !last {
            line.push('\n');
        }
        line
    }

    fn group_separator(&self) -> String {
        match self.kind {
            ChannelKind::Wework | ChannelKind::Telegram => "\n".to_string(),
            ChannelKind::Dingtalk => "\n---\n\n".to_string(),
            ChannelKind::Feishu => "\n━━━━━━━━━━━━━━━━━━━\n\n".to_string(),
        }
    }

    fn section_separator(&self) -> String {
        match self.kind {
            ChannelKind::Wework | ChannelKind::Telegram => "\n\n".to_string(),
            _ => self.group_separator(),
        }
    }

    fn new_section_heading(&self, total_new: usize) -> String {
        format!("🆕 {} ({} titles)\n\n", self.bold("New this run"), total_new)
    }

    fn source_heading(&self, section: &NewTitleSection) -> String {
        format!(
            "{} ({} titles):\n\n",
            self.bold(&self.text(&section.source_name)),
            section.titles.len()
        )
    }

    fn failed_heading(&self) -> String {
        format!("⚠️ {}\n\n", self.bold("Failed sources:"))
    }

    fn failed_line(&self, source_id: &str) -> String {
        match self.kind {
            ChannelKind::Feishu => format!("  • <font color='red'>{}</font>\n", source_id),
            ChannelKind::Dingtalk => format!("  • **{}**\n", source_id),
            ChannelKind::Telegram => format!("  • {}\n", html_escape(source_id)),
            ChannelKind::Wework => format!("  • {}\n", source_id),
        }
    }

    fn empty_placeholder(&self, mode: ReportMode) -> String {
        let text = match mode {
            ReportMode::Incremental => "📭 No new titles matched any keyword group",
            ReportMode::Current => "📭 Nothing on the current lists matched any keyword group",
            ReportMode::Daily => "📭 No titles matched any keyword group",
        };
        format!("{}\n\n", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn template(kind: ChannelKind) -> MarkupTemplate {
        MarkupTemplate::new(
            "test",
            kind,
            Utc.with_ymd_and_hms(2026, 10, 19, 4, 30, 0).unwrap(),
            FixedOffset::east_opt(8 * 3600).unwrap(),
        )
    }

    fn title(is_new: bool) -> ReportTitle {
        ReportTitle {
            title: "Rust <2> & more".to_string(),
            source_id: "weibo".to_string(),
            source_name: "Weibo".to_string(),
            ranks: vec![3, 1, 3],
            rank_threshold: 5,
            url: "https://example.com/a".to_string(),
            mobile_url: String::new(),
            is_new,
            count: 3,
            time_display: "[08:00 ~ 09:00]".to_string(),
        }
    }

    #[test]
    fn test_rank_display() {
        assert_eq!(format_rank_display(&[7], 5, ChannelKind::Wework), "[7]");
        assert_eq!(format_rank_display(&[2, 8, 4], 5, ChannelKind::Wework), "**[2 - 8]**");
        assert_eq!(format_rank_display(&[1], 5, ChannelKind::Telegram), "<b>[1]</b>");
        assert_eq!(
            format_rank_display(&[1], 5, ChannelKind::Feishu),
            "<font color='red'>**[1]**</font>"
        );
        assert_eq!(format_rank_display(&[], 5, ChannelKind::Wework), "");
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("a<b>&\"c'"), "a&lt;b&gt;&amp;&quot;c&#x27;");
    }

    #[test]
    fn test_wework_title_line() {
        let line = template(ChannelKind::Wework).title_line(&title(true), 1, true, false);
        assert_eq!(
            line,
            "  1. [Weibo] 🆕 [Rust <2> & more](https://example.com/a) **[1 - 3]** - [08:00 ~ 09:00] (3x)\n\n"
        );
    }

    #[test]
    fn test_telegram_title_line_escapes() {
        let line = template(ChannelKind::Telegram).title_line(&title(false), 2, false, true);
        assert_eq!(
            line,
            "  2. <a href=\"https://example.com/a\">Rust &lt;2&gt; &amp; more</a> <b>[1 - 3]</b> <code>- [08:00 ~ 09:00]</code> <code>(3x)</code>\n"
        );
    }

    #[test]
    fn test_telegram_link_escapes_url() {
        let mut title = title(false);
        title.url = "https://example.com/s?q=\"a\"&p=1".to_string();

        let line = template(ChannelKind::Telegram).title_line(&title, 1, false, true);

        assert!(line.contains("<a href=\"https://example.com/s?q=&quot;a&quot;&amp;p=1\">"));
    }

    #[test]
    fn test_group_heading_emoji_by_count() {
        let mut group = ReportGroup {
            word: "AI".to_string(),
            count: 12,
            percentage: 40.0,
            titles: Vec::new(),
        };
        let t = template(ChannelKind::Wework);
        assert_eq!(t.group_heading(&group, 1, 3), "🔥 [1/3] **AI** : **12** titles\n\n");

        group.count = 6;
        assert!(t.group_heading(&group, 2, 3).starts_with("📈 [2/3]"));

        group.count = 2;
        assert_eq!(t.group_heading(&group, 3, 3), "📌 [3/3] **AI** : 2 titles\n\n");
    }

    #[test]
    fn test_footer_uses_display_offset() {
        assert_eq!(
            template(ChannelKind::Telegram).footer(),
            "\n\nUpdated: 2026-10-19 12:30:00"
        );
    }
}
