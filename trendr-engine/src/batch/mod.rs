//! Channel rendering and byte-budgeted batch splitting
//!
//! For each channel: build a [`FragmentPlan`] from the report through the
//! channel's [`ChannelTemplate`], then pack it with a [`BatchSplitter`].

pub mod plan;
pub mod splitter;
pub mod templates;

pub use plan::{Fragment, FragmentKind, FragmentPlan};
pub use splitter::{BatchSplitter, MessageBatch};
pub use templates::{format_rank_display, html_escape, ChannelTemplate, MarkupTemplate};

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::report::ReportData;

/// Render and split a report for one channel
///
/// Oversized batches are recorded as informational diagnostics.
pub fn render_batches(
    report: &ReportData,
    template: &dyn ChannelTemplate,
    max_bytes: usize,
    diagnostics: &mut Diagnostics,
) -> Vec<MessageBatch> {
    let plan = FragmentPlan::build(report, template);
    let splitter = BatchSplitter::for_channel(template, report, max_bytes);
    let batches = splitter.split(&plan);

    for (batch_index, batch) in batches.iter().enumerate() {
        if batch.oversized {
            diagnostics.push(Diagnostic::OversizedFragment {
                channel: template.name().to_string(),
                batch_index,
                bytes: batch.byte_len(),
                max_bytes,
            });
        }
    }
    batches
}
