//! Ordered fragment plan for one channel

use super::templates::ChannelTemplate;
use crate::report::ReportData;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentKind {
    /// Heading(s) together with the first line under them; never split
    Lead,
    /// One continuation line
    Item,
    /// Spacing between groups or sections; dropped when it does not fit
    Separator,
}

impl FragmentKind {
    pub fn is_optional(&self) -> bool {
        matches!(self, FragmentKind::Separator)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fragment {
    pub kind: FragmentKind,
    pub text: String,
}

impl Fragment {
    pub fn lead(text: impl Into<String>) -> Self {
        Self {
            kind: FragmentKind::Lead,
            text: text.into(),
        }
    }

    pub fn item(text: impl Into<String>) -> Self {
        Self {
            kind: FragmentKind::Item,
            text: text.into(),
        }
    }

    pub fn separator(text: impl Into<String>) -> Self {
        Self {
            kind: FragmentKind::Separator,
            text: text.into(),
        }
    }

    /// Encoded size in bytes
    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Fragments in emission order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FragmentPlan {
    fragments: Vec<Fragment>,
}

impl FragmentPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: Fragment) {
        self.fragments.push(fragment);
    }

    /// Lay out a report: stats groups, then new titles by source, then
    /// failed sources
    ///
    /// Section headings ride along in the lead fragment of their first group,
    /// source or failed line, so no batch can end on a bare heading.
    pub fn build(report: &ReportData, template: &dyn ChannelTemplate) -> Self {
        let mut plan = Self::new();

        let groups = report.stats.len();
        for (i, group) in report.stats.iter().enumerate() {
            if i > 0 {
                plan.push(Fragment::separator(template.group_separator()));
            }

            let mut lead = String::new();
            if i == 0 {
                lead.push_str(&template.stats_heading());
            }
            lead.push_str(&template.group_heading(group, i + 1, groups));

            let last = group.titles.len();
            let mut titles = group.titles.iter().enumerate();
            if let Some((_, first)) = titles.next() {
                lead.push_str(&template.title_line(first, 1, true, last == 1));
            }
            plan.push(Fragment::lead(lead));

            for (j, title) in titles {
                plan.push(Fragment::item(template.title_line(title, j + 1, true, j + 1 == last)));
            }
        }

        for (i, section) in report.new_titles.iter().enumerate() {
            if i == 0 && !plan.is_empty() {
                plan.push(Fragment::separator(template.section_separator()));
            } else if i > 0 {
                plan.push(Fragment::separator(template.source_separator()));
            }

            let mut lead = String::new();
            if i == 0 {
                lead.push_str(&template.new_section_heading(report.total_new_count));
            }
            lead.push_str(&template.source_heading(section));

            let last = section.titles.len();
            let mut titles = section.titles.iter().enumerate();
            if let Some((_, first)) = titles.next() {
                lead.push_str(&template.title_line(first, 1, false, last == 1));
            }
            plan.push(Fragment::lead(lead));

            for (j, title) in titles {
                plan.push(Fragment::item(template.title_line(title, j + 1, false, j + 1 == last)));
            }
        }

        let mut failed = report.failed_ids.iter();
        if let Some(first) = failed.next() {
            if !plan.is_empty() {
                plan.push(Fragment::separator(template.section_separator()));
            }
            plan.push(Fragment::lead(format!(
                "{}{}",
                template.failed_heading(),
                template.failed_line(first)
            )));
            for id in failed {
                plan.push(Fragment::item(template.failed_line(id)));
            }
        }

        plan
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fragment> {
        self.fragments.iter()
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Concatenation of every non-optional fragment
    pub fn required_text(&self) -> String {
        self.fragments
            .iter()
            .filter(|f| !f.kind.is_optional())
            .map(|f| f.text.as_str())
            .collect()
    }
}

impl FromIterator<Fragment> for FragmentPlan {
    fn from_iter<I: IntoIterator<Item = Fragment>>(iter: I) -> Self {
        Self {
            fragments: iter.into_iter().collect(),
        }
    }
}
